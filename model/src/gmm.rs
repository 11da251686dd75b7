use std::f64::consts::PI;

use spkrec_data::FeatureVector;

use crate::model::{sample_dimension, AcousticModel, AdaptationParams, ModelKind, TrainingParams};
use crate::sealed::Sealed;
use crate::{Lbg, ModelError};

/// Lower bound for every variance component.
pub const VARIANCE_FLOOR: f64 = 1.0e-5;

/// One diagonal Gaussian of a mixture.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    mean: FeatureVector,
    variance: FeatureVector,
    weight: f64,
    // Derived from `variance`; refreshed by `update_cache`.
    inv_variance: Vec<f64>,
    log_norm: f64,
}

impl Component {
    fn new(mean: FeatureVector, variance: FeatureVector, weight: f64) -> Self {
        let mut c = Self {
            inv_variance: Vec::new(),
            log_norm: 0.0,
            mean,
            variance,
            weight,
        };
        c.update_cache();
        c
    }

    pub fn mean(&self) -> &FeatureVector {
        &self.mean
    }

    pub fn variance(&self) -> &FeatureVector {
        &self.variance
    }

    /// Mixing coefficient.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Floors the variance and recomputes the inverse variance and
    /// `-0.5 * (sum(ln var) + D * ln(2 pi))`.
    fn update_cache(&mut self) {
        for v in self.variance.iter_mut() {
            if !(*v >= VARIANCE_FLOOR) {
                *v = VARIANCE_FLOOR;
            }
        }
        self.inv_variance = self.variance.iter().map(|v| 1.0 / v).collect();
        let log_det: f64 = self.variance.iter().map(|v| v.ln()).sum();
        self.log_norm = -0.5 * (log_det + self.variance.len() as f64 * (2.0 * PI).ln());
    }

    /// `ln(weight * N(x; mean, diag(variance)))`.
    fn log_density(&self, x: &[f64]) -> f64 {
        let mahalanobis: f64 = x
            .iter()
            .zip(self.mean.iter())
            .zip(self.inv_variance.iter())
            .map(|((xd, md), inv)| {
                let d = xd - md;
                d * d * inv
            })
            .sum();
        self.log_norm - 0.5 * mahalanobis + self.weight.ln()
    }
}

/// Sufficient statistics gathered by one E-step.
struct Statistics {
    occupancy: Vec<f64>,
    first: Vec<Vec<f64>>,
    second: Vec<Vec<f64>>,
}

impl Statistics {
    fn new(order: usize, dim: usize, with_second: bool) -> Self {
        Self {
            occupancy: vec![0.0; order],
            first: vec![vec![0.0; dim]; order],
            second: if with_second {
                vec![vec![0.0; dim]; order]
            } else {
                Vec::new()
            },
        }
    }
}

/// Diagonal-covariance Gaussian mixture model.
///
/// Training clusters the samples with [`Lbg`] to seed the components, then
/// runs Expectation-Maximization until the total log-likelihood changes by
/// less than [`TrainingParams::threshold`] or the iteration cap is hit.
///
/// All per-sample mixture likelihoods are combined with log-sum-exp, so very
/// small densities never underflow to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Gmm {
    order: usize,
    components: Vec<Component>,
}

impl Gmm {
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Sum of the mixing coefficients; 1 after training or adaptation.
    pub fn weight_sum(&self) -> f64 {
        self.components.iter().map(|c| c.weight).sum()
    }

    /// Total log-likelihood of `samples` (sum over samples).
    pub fn total_log_likelihood(&self, samples: &[FeatureVector]) -> f64 {
        let mut logp = vec![0.0; self.components.len()];
        samples
            .iter()
            .map(|s| self.sample_log_likelihood(s, &mut logp))
            .sum()
    }

    /// Log-likelihood of one sample; leaves each component's joint log
    /// density in `logp`.
    fn sample_log_likelihood(&self, sample: &[f64], logp: &mut [f64]) -> f64 {
        for (lp, c) in logp.iter_mut().zip(&self.components) {
            *lp = c.log_density(sample);
        }
        log_sum_exp(logp)
    }

    /// E-step: accumulates responsibilities and weighted moments, returns the
    /// total log-likelihood under the current parameters.
    fn expectation(&self, samples: &[FeatureVector], stats: &mut Statistics) -> f64 {
        let mut logp = vec![0.0; self.components.len()];
        let mut total = 0.0;

        for sample in samples {
            let lse = self.sample_log_likelihood(sample, &mut logp);
            if !lse.is_finite() {
                continue;
            }
            total += lse;

            for (k, lp) in logp.iter().enumerate() {
                let r = (lp - lse).exp();
                if r == 0.0 {
                    continue;
                }
                stats.occupancy[k] += r;
                for (d, x) in sample.iter().enumerate() {
                    stats.first[k][d] += r * x;
                }
                if let Some(second) = stats.second.get_mut(k) {
                    for (d, x) in sample.iter().enumerate() {
                        second[d] += r * x * x;
                    }
                }
            }
        }

        total
    }

    /// M-step: re-estimates means, variances and mixing coefficients.
    fn maximization(&mut self, stats: &Statistics, n: usize) {
        for (k, c) in self.components.iter_mut().enumerate() {
            let occ = stats.occupancy[k];
            if occ <= f64::MIN_POSITIVE {
                // Dead component: keep its shape, drop its weight.
                c.weight = 0.0;
                continue;
            }
            let inv = 1.0 / occ;
            for d in 0..c.mean.dim() {
                let mean = stats.first[k][d] * inv;
                c.mean[d] = mean;
                c.variance[d] = stats.second[k][d] * inv - mean * mean;
            }
            c.weight = occ / n as f64;
            c.update_cache();
        }
        self.normalize_weights();
    }

    fn normalize_weights(&mut self) {
        let total = self.weight_sum();
        if total > 0.0 {
            for c in &mut self.components {
                c.weight /= total;
            }
        }
    }

    /// One EM iteration. Returns the log-likelihood computed by its E-step.
    pub(crate) fn em_step(&mut self, samples: &[FeatureVector]) -> f64 {
        let dim = self.dimension_count();
        let mut stats = Statistics::new(self.components.len(), dim, true);
        let ll = self.expectation(samples, &mut stats);
        self.maximization(&stats, samples.len());
        ll
    }

    /// Seeds the components from an LBG codebook: centroid means, occupancy
    /// weights and per-dimension spread of all samples around each mean.
    fn initialize(&mut self, samples: &[FeatureVector], params: &TrainingParams) -> Result<(), ModelError> {
        let codebook = Lbg::new(self.order)
            .with_max_iterations(params.max_iterations)
            .cluster(samples)?;

        let n = samples.len() as f64;
        let total: usize = codebook.sizes.iter().sum();

        self.components = codebook
            .centroids
            .into_iter()
            .zip(codebook.sizes)
            .map(|(mean, size)| {
                let mut variance = FeatureVector::zeros(mean.dim());
                for sample in samples {
                    for (d, v) in variance.iter_mut().enumerate() {
                        let diff = mean[d] - sample[d];
                        *v += diff * diff / n;
                    }
                }
                Component::new(mean, variance, size as f64 / total as f64)
            })
            .collect();
        Ok(())
    }
}

impl Sealed for Gmm {}

impl AcousticModel for Gmm {
    const KIND: ModelKind = ModelKind::Gmm;

    fn with_order(order: usize) -> Self {
        Self {
            order,
            components: Vec::new(),
        }
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    fn train(&mut self, samples: &[FeatureVector], params: &TrainingParams) -> Result<(), ModelError> {
        if self.order == 0 {
            return Err(ModelError::ZeroOrder);
        }
        sample_dimension(samples)?;
        self.initialize(samples, params)?;

        let mut previous: Option<f64> = None;
        for iteration in 0..params.max_iterations {
            let ll = self.em_step(samples);
            if previous.is_some_and(|p| (ll - p).abs() < params.threshold) {
                tracing::debug!(iteration, log_likelihood = ll, "em converged");
                return Ok(());
            }
            previous = Some(ll);
        }
        tracing::debug!(
            iterations = params.max_iterations,
            log_likelihood = previous.unwrap_or(f64::NAN),
            "em reached iteration cap"
        );
        Ok(())
    }

    /// MAP mean adaptation. Each pass computes component occupancies `n`
    /// under the current means and sets
    /// `mean = a * data_mean + (1 - a) * prior_mean` with `a = n / (n + r)`.
    /// Variances and weights stay those of the background.
    fn adapt(
        background: &Self,
        samples: &[FeatureVector],
        params: &AdaptationParams,
    ) -> Result<Self, ModelError> {
        if !background.is_trained() {
            return Err(ModelError::UntrainedBackground);
        }
        let dim = sample_dimension(samples)?;
        if dim != background.dimension_count() {
            return Err(ModelError::DimensionMismatch {
                expected: background.dimension_count(),
                got: dim,
            });
        }

        let mut model = background.clone();
        let mut previous: Option<f64> = None;

        for iteration in 0..params.iterations {
            let mut stats = Statistics::new(model.components.len(), dim, false);
            let ll = model.expectation(samples, &mut stats);

            for (k, (c, prior)) in model
                .components
                .iter_mut()
                .zip(&background.components)
                .enumerate()
            {
                let occ = stats.occupancy[k];
                if occ <= 0.0 {
                    c.mean = prior.mean.clone();
                } else {
                    let alpha = occ / (occ + params.relevance_factor);
                    for d in 0..dim {
                        c.mean[d] = alpha * (stats.first[k][d] / occ) + (1.0 - alpha) * prior.mean[d];
                    }
                }
                c.update_cache();
            }

            if previous.is_some_and(|p| (ll - p).abs() < params.threshold) {
                tracing::debug!(iteration, log_likelihood = ll, "map adaptation converged");
                break;
            }
            previous = Some(ll);
        }

        Ok(model)
    }

    fn score(&self, samples: &[FeatureVector]) -> f64 {
        self.log_score(samples).exp()
    }

    /// Mean per-sample log-likelihood; 0 for no samples.
    fn log_score(&self, samples: &[FeatureVector]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        self.total_log_likelihood(samples) / samples.len() as f64
    }

    fn dimension_count(&self) -> usize {
        self.components.first().map_or(0, |c| c.mean.dim())
    }
}

/// `ln(sum(exp(values)))` computed around the maximum.
fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fv(values: &[f64]) -> FeatureVector {
        FeatureVector::from(values.to_vec())
    }

    /// Deterministic 1-D data from two clusters around `a` and `b`.
    fn two_cluster_data(a: f64, b: f64, n: usize) -> Vec<FeatureVector> {
        (0..n)
            .flat_map(|i| {
                let t = (i as f64 * 0.61).sin() * 0.5;
                [fv(&[a + t]), fv(&[b - t * 0.8])]
            })
            .collect()
    }

    fn trained(order: usize, samples: &[FeatureVector]) -> Gmm {
        let mut gmm = Gmm::with_order(order);
        gmm.train(samples, &TrainingParams::default()).unwrap();
        gmm
    }

    #[test]
    fn zero_mean_data_trains_distinct_components() {
        // Mirrored samples, so the pooled mean is exactly zero.
        let samples: Vec<FeatureVector> = (0..20)
            .flat_map(|i| {
                let t = (i as f64 * 0.61).sin() * 0.5;
                [fv(&[-5.0 - t]), fv(&[5.0 + t])]
            })
            .collect();
        let gmm = trained(2, &samples);

        let mut means: Vec<f64> = gmm.components().iter().map(|c| c.mean()[0]).collect();
        means.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!((means[0] + 5.0).abs() < 0.5, "means {means:?}");
        assert!((means[1] - 5.0).abs() < 0.5, "means {means:?}");
        for c in gmm.components() {
            assert!((c.weight() - 0.5).abs() < 1e-6, "weight {}", c.weight());
        }
    }

    #[test]
    fn log_sum_exp_is_stable() {
        let v = [-1000.0, -1000.0];
        let lse = log_sum_exp(&v);
        assert!((lse - (-1000.0 + 2f64.ln())).abs() < 1e-9, "got {lse}");
        assert_eq!(log_sum_exp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }

    #[test]
    fn weights_sum_to_one_after_training() {
        let samples = two_cluster_data(0.0, 10.0, 40);
        let gmm = trained(2, &samples);
        assert!((gmm.weight_sum() - 1.0).abs() < 1e-9, "weights sum {}", gmm.weight_sum());
        assert_eq!(gmm.components().len(), 2);
        assert_eq!(gmm.dimension_count(), 1);
    }

    #[test]
    fn weights_sum_to_one_after_every_m_step() {
        let samples = two_cluster_data(-3.0, 4.0, 30);
        let mut gmm = Gmm::with_order(4);
        gmm.initialize(&samples, &TrainingParams::default()).unwrap();
        for _ in 0..10 {
            gmm.em_step(&samples);
            assert!((gmm.weight_sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn recovers_cluster_means() {
        let samples = two_cluster_data(0.0, 10.0, 50);
        let gmm = trained(2, &samples);
        let mut means: Vec<f64> = gmm.components().iter().map(|c| c.mean()[0]).collect();
        means.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert!(means[0].abs() < 0.5, "low mean {}", means[0]);
        assert!((means[1] - 10.0).abs() < 0.5, "high mean {}", means[1]);
    }

    #[test]
    fn variance_never_below_floor() {
        // Two exactly repeated points: the fitted variance collapses.
        let samples: Vec<FeatureVector> = (0..20).map(|i| fv(&[(i % 2) as f64 * 5.0])).collect();
        let gmm = trained(2, &samples);
        for c in gmm.components() {
            for &v in c.variance().iter() {
                assert!(v >= VARIANCE_FLOOR, "variance {v} below floor");
            }
        }
        assert!(gmm.log_score(&samples).is_finite());
    }

    #[test]
    fn scores_prefer_own_data() {
        let a = two_cluster_data(0.0, 2.0, 30);
        let b = two_cluster_data(20.0, 22.0, 30);
        let gmm = trained(2, &a);
        assert!(gmm.log_score(&a) > gmm.log_score(&b));
        assert!(gmm.score(&a) > gmm.score(&b));
        assert!((gmm.score(&a) - gmm.log_score(&a).exp()).abs() < 1e-12);
    }

    #[test]
    fn far_samples_do_not_underflow() {
        let samples = two_cluster_data(0.0, 1.0, 20);
        let gmm = trained(2, &samples);
        let far = vec![fv(&[1.0e3])];
        let ls = gmm.log_score(&far);
        assert!(ls.is_finite(), "log score should stay finite, got {ls}");
    }

    #[test]
    fn empty_samples_log_score_is_zero() {
        let gmm = trained(1, &two_cluster_data(0.0, 1.0, 5));
        assert_eq!(gmm.log_score(&[]), 0.0);
    }

    #[test]
    fn train_rejects_bad_input() {
        assert!(matches!(Gmm::with_order(0).train(&[fv(&[1.0])], &TrainingParams::default()), Err(ModelError::ZeroOrder)));
        assert!(matches!(Gmm::with_order(2).train(&[], &TrainingParams::default()), Err(ModelError::NoSamples)));
    }

    #[test]
    fn adaptation_moves_occupied_means_only() {
        let background_data = two_cluster_data(0.0, 10.0, 50);
        let ubm = trained(2, &background_data);

        // Speaker data only near the high cluster, shifted up by one.
        let speaker: Vec<FeatureVector> = (0..40).map(|i| fv(&[11.0 + (i as f64 * 0.3).sin() * 0.2])).collect();
        let adapted = Gmm::adapt(&ubm, &speaker, &AdaptationParams::default()).unwrap();

        let (low_idx, high_idx) = if ubm.components()[0].mean()[0] < ubm.components()[1].mean()[0] {
            (0, 1)
        } else {
            (1, 0)
        };

        let low_shift = (adapted.components()[low_idx].mean()[0] - ubm.components()[low_idx].mean()[0]).abs();
        let high_shift = adapted.components()[high_idx].mean()[0] - ubm.components()[high_idx].mean()[0];
        assert!(low_shift < 1e-6, "unoccupied component moved by {low_shift}");
        assert!(high_shift > 0.5, "occupied component moved only {high_shift}");

        // Variances and weights come from the background.
        for (a, u) in adapted.components().iter().zip(ubm.components()) {
            assert_eq!(a.variance(), u.variance());
            assert_eq!(a.weight(), u.weight());
        }
        assert!(adapted.log_score(&speaker) > ubm.log_score(&speaker));
    }

    #[test]
    fn relevance_factor_controls_pull() {
        let ubm = trained(1, &two_cluster_data(0.0, 0.5, 30));
        let speaker: Vec<FeatureVector> = (0..8).map(|_| fv(&[5.0])).collect();
        let one_pass = |r: f64| {
            let params = AdaptationParams { iterations: 1, relevance_factor: r, threshold: 0.0 };
            Gmm::adapt(&ubm, &speaker, &params).unwrap().components()[0].mean()[0]
        };
        let prior = ubm.components()[0].mean()[0];
        let expected = |r: f64| {
            let a = 8.0 / (8.0 + r);
            a * 5.0 + (1.0 - a) * prior
        };
        assert!((one_pass(8.0) - expected(8.0)).abs() < 1e-9);
        assert!((one_pass(0.0) - 5.0).abs() < 1e-9);
        assert!(one_pass(100.0) < one_pass(1.0));
    }

    #[test]
    fn adapt_checks_background() {
        let untrained = Gmm::with_order(2);
        assert!(matches!(
            Gmm::adapt(&untrained, &[fv(&[1.0])], &AdaptationParams::default()),
            Err(ModelError::UntrainedBackground)
        ));

        let ubm = trained(1, &two_cluster_data(0.0, 1.0, 5));
        assert!(matches!(
            Gmm::adapt(&ubm, &[fv(&[1.0, 2.0])], &AdaptationParams::default()),
            Err(ModelError::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn property_em_log_likelihood_non_decreasing(
            a in -20.0f64..0.0,
            gap in 3.0f64..30.0,
            n in 10usize..40,
        ) {
            let samples = two_cluster_data(a, a + gap, n);
            let mut gmm = Gmm::with_order(2);
            gmm.initialize(&samples, &TrainingParams::default()).unwrap();

            let mut previous = f64::NEG_INFINITY;
            for _ in 0..25 {
                let ll = gmm.em_step(&samples);
                let tolerance = 1e-6 * ll.abs().max(1.0);
                prop_assert!(ll >= previous - tolerance, "log-likelihood dropped: {} -> {}", previous, ll);
                previous = ll;
            }
        }
    }
}
