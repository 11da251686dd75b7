use spkrec_data::FeatureVector;

use crate::model::{nearest, sample_dimension, AcousticModel, AdaptationParams, ModelKind, TrainingParams};
use crate::sealed::Sealed;
use crate::{Lbg, ModelError};

/// Distances are floored here before being inverted.
pub const MIN_DISTANCE: f64 = 1.0e-10;

/// Vector quantization speaker model: an LBG codebook with per-centroid
/// occupancy and discriminative weight.
///
/// The score of a sample set is the average of `weight[c] / distance(x, c)`
/// over its samples, `c` being the nearest non-empty centroid of each sample.
/// Higher is more similar.
#[derive(Debug, Clone, PartialEq)]
pub struct VqModel {
    order: usize,
    centroids: Vec<FeatureVector>,
    sizes: Vec<usize>,
    weights: Vec<f64>,
}

impl VqModel {
    pub fn centroids(&self) -> &[FeatureVector] {
        &self.centroids
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Resets every discriminative weight to 1.
    pub fn reset_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 1.0);
    }

    fn nearest_active(&self, sample: &FeatureVector) -> Option<(usize, f64)> {
        nearest(sample, &self.centroids, |c| self.sizes[c] > 0)
    }

    /// Sum of squared distances from each sample to its nearest non-empty
    /// centroid.
    pub fn distortion(&self, samples: &[FeatureVector]) -> f64 {
        samples
            .iter()
            .filter_map(|s| self.nearest_active(s))
            .map(|(_, d)| d)
            .sum()
    }

    /// Speaker-discriminative weights against `others`.
    ///
    /// For each non-empty centroid `i`, `sum` accumulates `1 / dmin` over
    /// every other model, `dmin` being the distance from centroid `i` to that
    /// model's nearest non-empty centroid; the weight becomes `1 / sum`.
    /// Centroids far from all other codebooks therefore weigh more.
    fn discriminative_weights(&self, others: &[&VqModel]) -> Vec<f64> {
        let mut weights = self.weights.clone();
        for (i, centroid) in self.centroids.iter().enumerate() {
            if self.sizes[i] == 0 {
                continue;
            }
            let sum: f64 = others
                .iter()
                .filter_map(|other| other.nearest_active(centroid))
                .map(|(_, dmin)| 1.0 / dmin.max(MIN_DISTANCE))
                .sum();
            if sum > 0.0 {
                weights[i] = 1.0 / sum;
            }
        }
        weights
    }
}

impl Sealed for VqModel {}

impl AcousticModel for VqModel {
    const KIND: ModelKind = ModelKind::Vq;

    fn with_order(order: usize) -> Self {
        Self {
            order,
            centroids: Vec::new(),
            sizes: Vec::new(),
            weights: Vec::new(),
        }
    }

    fn order(&self) -> usize {
        self.order
    }

    fn set_order(&mut self, order: usize) {
        self.order = order;
    }

    fn train(&mut self, samples: &[FeatureVector], params: &TrainingParams) -> Result<(), ModelError> {
        let codebook = Lbg::new(self.order)
            .with_max_iterations(params.max_iterations)
            .cluster(samples)?;
        self.centroids = codebook.centroids;
        self.sizes = codebook.sizes;
        self.weights = vec![1.0; self.order];
        Ok(())
    }

    /// MAP centroid adaptation with hard (nearest-centroid) occupancy:
    /// `centroid = w * data_mean + (1 - w) * prior` with
    /// `w = size / (size + r)`. Sizes are those of the last pass, so
    /// centroids the speaker never reached are left out of scoring.
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
        model.reset_weights();
        let k = model.centroids.len();
        let mut indices = vec![0usize; samples.len()];

        for _ in 0..params.iterations {
            for (s, sample) in samples.iter().enumerate() {
                if let Some((c, _)) = nearest(sample, &model.centroids, |_| true) {
                    indices[s] = c;
                }
            }

            let mut sums = vec![FeatureVector::zeros(dim); k];
            model.sizes.iter_mut().for_each(|s| *s = 0);
            for (s, sample) in samples.iter().enumerate() {
                sums[indices[s]] += sample;
                model.sizes[indices[s]] += 1;
            }

            for (c, mut sum) in sums.into_iter().enumerate() {
                let size = model.sizes[c] as f64;
                let prior = &background.centroids[c];
                if size == 0.0 {
                    model.centroids[c] = prior.clone();
                    continue;
                }
                let w = size / (size + params.relevance_factor);
                sum *= w / size;
                for (x, p) in sum.iter_mut().zip(prior.iter()) {
                    *x += (1.0 - w) * p;
                }
                model.centroids[c] = sum;
            }
        }

        Ok(model)
    }

    /// Weighted inverse-distance similarity; 0 when there is nothing to
    /// compare.
    fn score(&self, samples: &[FeatureVector]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let total: f64 = samples
            .iter()
            .filter_map(|s| self.nearest_active(s))
            .map(|(c, d)| self.weights[c] / d.max(MIN_DISTANCE))
            .sum();
        total / samples.len() as f64
    }

    fn log_score(&self, samples: &[FeatureVector]) -> f64 {
        self.score(samples).ln()
    }

    fn dimension_count(&self) -> usize {
        self.centroids.first().map_or(0, |c| c.dim())
    }

    fn reweighted(&self, others: &[&Self]) -> Option<Self> {
        let mut model = self.clone();
        model.weights = self.discriminative_weights(others);
        Some(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: &[f64]) -> FeatureVector {
        FeatureVector::from(values.to_vec())
    }

    fn blob(cx: f64, cy: f64, n: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                fv(&[cx + (t * 0.9).sin() * 0.5, cy + (t * 1.3).cos() * 0.5])
            })
            .collect()
    }

    fn trained(order: usize, samples: &[FeatureVector]) -> VqModel {
        let mut vq = VqModel::with_order(order);
        vq.train(samples, &TrainingParams::default()).unwrap();
        vq
    }

    #[test]
    fn train_initializes_unit_weights() {
        let vq = trained(4, &blob(0.0, 0.0, 32));
        assert_eq!(vq.centroids().len(), 4);
        assert_eq!(vq.weights(), &[1.0; 4]);
        assert_eq!(vq.sizes().iter().sum::<usize>(), 32);
        assert_eq!(vq.dimension_count(), 2);
    }

    #[test]
    fn zero_mean_data_uses_every_centroid() {
        let samples: Vec<FeatureVector> = (0..40)
            .map(|i| if i % 2 == 0 { fv(&[-5.0, 1.0]) } else { fv(&[5.0, -1.0]) })
            .collect();
        let vq = trained(2, &samples);
        assert_eq!(vq.sizes(), &[20, 20]);
    }

    #[test]
    fn score_prefers_own_data() {
        let a = trained(4, &blob(0.0, 0.0, 32));
        let near = blob(0.1, -0.1, 8);
        let far = blob(10.0, 10.0, 8);
        assert!(a.score(&near) > a.score(&far));
        assert!(a.log_score(&near) > a.log_score(&far));
    }

    #[test]
    fn score_is_average_weighted_inverse_distance() {
        let vq = trained(1, &[fv(&[0.0]), fv(&[2.0])]);
        // Single centroid at 1.0.
        let samples = [fv(&[3.0]), fv(&[1.5])];
        let expected = (1.0 / 4.0 + 1.0 / 0.25) / 2.0;
        assert!((vq.score(&samples) - expected).abs() < 1e-12);
    }

    #[test]
    fn exact_hit_is_finite() {
        let vq = trained(1, &[fv(&[1.0]), fv(&[1.0])]);
        let s = vq.score(&[fv(&[1.0])]);
        assert!(s.is_finite() && s > 0.0);
    }

    #[test]
    fn empty_samples_score_zero() {
        let vq = trained(2, &blob(0.0, 0.0, 8));
        assert_eq!(vq.score(&[]), 0.0);
    }

    #[test]
    fn weighting_favors_distinctive_centroids() {
        // Speaker A has one centroid near B's data and one far away.
        let mut a_data = blob(0.0, 0.0, 16);
        a_data.extend(blob(8.0, 8.0, 16));
        let a = trained(2, &a_data);
        let b = trained(2, &blob(9.0, 9.0, 32));

        let weighted = a.reweighted(&[&b]).unwrap();
        let near_origin = if a.centroids()[0][0] < 4.0 { 0 } else { 1 };
        let near_b = 1 - near_origin;
        assert!(
            weighted.weights()[near_origin] > weighted.weights()[near_b],
            "distinctive centroid should weigh more: {:?}",
            weighted.weights()
        );
        // Codebook itself is untouched.
        assert_eq!(weighted.centroids(), a.centroids());
    }

    #[test]
    fn weighting_without_others_keeps_weights() {
        let a = trained(2, &blob(0.0, 0.0, 16));
        let weighted = a.reweighted(&[]).unwrap();
        assert_eq!(weighted.weights(), a.weights());
    }

    #[test]
    fn adaptation_blends_with_prior() {
        let ubm = trained(1, &blob(0.0, 0.0, 32));
        let prior = ubm.centroids()[0].clone();
        let speaker: Vec<FeatureVector> = (0..16).map(|_| fv(&[4.0, 4.0])).collect();

        let params = AdaptationParams { iterations: 1, relevance_factor: 16.0, threshold: 0.0 };
        let adapted = VqModel::adapt(&ubm, &speaker, &params).unwrap();
        let w = 16.0 / 32.0;
        for d in 0..2 {
            let expected = w * 4.0 + (1.0 - w) * prior[d];
            assert!((adapted.centroids()[0][d] - expected).abs() < 1e-9);
        }
        assert_eq!(adapted.sizes(), &[16]);
        assert_eq!(adapted.order(), 1);
    }

    #[test]
    fn adaptation_leaves_unreached_centroids_at_prior() {
        let mut data = blob(0.0, 0.0, 16);
        data.extend(blob(20.0, 20.0, 16));
        let ubm = trained(2, &data);
        let speaker = blob(20.5, 20.5, 8);

        let adapted = VqModel::adapt(&ubm, &speaker, &AdaptationParams::default()).unwrap();
        let unreached = adapted.sizes().iter().position(|&s| s == 0).unwrap();
        assert_eq!(adapted.centroids()[unreached], ubm.centroids()[unreached]);
    }

    #[test]
    fn adapt_rejects_untrained_background() {
        assert!(matches!(
            VqModel::adapt(&VqModel::with_order(2), &[fv(&[0.0])], &AdaptationParams::default()),
            Err(ModelError::UntrainedBackground)
        ));
    }

    #[test]
    fn distortion_sums_nearest_distances() {
        let vq = trained(1, &[fv(&[0.0]), fv(&[2.0])]);
        assert!((vq.distortion(&[fv(&[0.0]), fv(&[3.0])]) - 5.0).abs() < 1e-12);
    }
}
