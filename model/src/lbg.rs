use spkrec_data::FeatureVector;

use crate::model::{nearest, sample_dimension};
use crate::ModelError;

/// Default split perturbation and refinement convergence ratio.
pub const DEFAULT_ETA: f64 = 0.01;

/// Output of [`Lbg::cluster`].
#[derive(Debug, Clone, PartialEq)]
pub struct Codebook {
    /// Exactly `cluster_count` centroids.
    pub centroids: Vec<FeatureVector>,
    /// Number of samples assigned to each centroid.
    pub sizes: Vec<usize>,
    /// Centroid index of each input sample.
    pub indices: Vec<usize>,
}

impl Codebook {
    /// Number of centroids with at least one assigned sample.
    pub fn active_count(&self) -> usize {
        self.sizes.iter().filter(|&&s| s > 0).count()
    }
}

/// Linde-Buzo-Gray binary-split vector quantizer.
///
/// # Algorithm
///
/// Start from the dataset mean. Each round splits centroids `c` into
/// `c * (1 + eta)` and `c * (1 - eta)`, then runs Lloyd refinement
/// (nearest-centroid assignment by squared distance, centroid = mean of its
/// samples) until the relative drop of the average distortion falls to `eta`
/// or below. Rounds continue until `cluster_count` centroids exist.
///
/// Components within `eta` of zero are split additively into `c + eta` and
/// `c - eta` instead, so zero-mean data still separates.
///
/// When `cluster_count` is not a power of two, the last round splits only as
/// many centroids as needed, taking the most occupied ones first. Centroids
/// that lose all their samples keep their previous position and report size 0.
#[derive(Debug, Clone)]
pub struct Lbg {
    cluster_count: usize,
    eta: f64,
    max_iterations: usize,
}

impl Lbg {
    pub fn new(cluster_count: usize) -> Self {
        Self {
            cluster_count,
            eta: DEFAULT_ETA,
            max_iterations: 100,
        }
    }

    /// Caps the number of refinement passes after each split.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Quantizes `samples` into `cluster_count` centroids.
    pub fn cluster(&self, samples: &[FeatureVector]) -> Result<Codebook, ModelError> {
        if self.cluster_count == 0 {
            return Err(ModelError::ZeroOrder);
        }
        let dim = sample_dimension(samples)?;
        let k = self.cluster_count;

        let mut centroids = vec![FeatureVector::zeros(dim); k];
        let mut sizes = vec![0usize; k];
        let mut indices = vec![0usize; samples.len()];

        // Non-empty after sample_dimension, so the mean exists.
        if let Some(mean) = FeatureVector::mean(samples) {
            centroids[0] = mean;
        }
        sizes[0] = samples.len();

        let mut avg = average_distortion(samples, &centroids, &indices, dim);
        let mut active = 1usize;

        while active < k {
            let split = active.min(k - active);

            let mut by_size: Vec<usize> = (0..active).collect();
            by_size.sort_by(|&a, &b| sizes[b].cmp(&sizes[a]).then(a.cmp(&b)));

            for (i, &c) in by_size.iter().take(split).enumerate() {
                let (grown, shrunk) = self.split(&centroids[c]);
                centroids[c] = grown;
                centroids[active + i] = shrunk;
            }
            active += split;

            avg = self.refine(
                samples,
                &mut centroids[..active],
                &mut sizes[..active],
                &mut indices,
                avg,
            );

            tracing::debug!(active, distortion = avg, "lbg split round done");
        }

        Ok(Codebook {
            centroids,
            sizes,
            indices,
        })
    }

    fn split(&self, centroid: &FeatureVector) -> (FeatureVector, FeatureVector) {
        let mut grown = centroid.clone();
        let mut shrunk = centroid.clone();
        for ((g, s), &c) in grown.iter_mut().zip(shrunk.iter_mut()).zip(centroid.iter()) {
            let step = if c.abs() > self.eta { c * self.eta } else { self.eta };
            *g = c + step;
            *s = c - step;
        }
        (grown, shrunk)
    }

    /// Lloyd refinement over the active centroids. Returns the final average
    /// distortion.
    fn refine(
        &self,
        samples: &[FeatureVector],
        centroids: &mut [FeatureVector],
        sizes: &mut [usize],
        indices: &mut [usize],
        mut avg: f64,
    ) -> f64 {
        let dim = centroids.first().map_or(0, |c| c.dim());

        for pass in 0..self.max_iterations {
            for (s, sample) in samples.iter().enumerate() {
                if let Some((c, _)) = nearest(sample, centroids, |_| true) {
                    indices[s] = c;
                }
            }

            let mut sums = vec![FeatureVector::zeros(dim); centroids.len()];
            sizes.iter_mut().for_each(|s| *s = 0);
            for (s, sample) in samples.iter().enumerate() {
                sums[indices[s]] += sample;
                sizes[indices[s]] += 1;
            }
            for ((centroid, mut sum), &size) in centroids.iter_mut().zip(sums).zip(sizes.iter()) {
                if size > 0 {
                    sum *= 1.0 / size as f64;
                    *centroid = sum;
                }
            }

            let new_avg = average_distortion(samples, centroids, indices, dim);
            let improving = avg > 0.0 && (avg - new_avg) / avg > self.eta;
            avg = new_avg;
            if !improving {
                tracing::trace!(passes = pass + 1, "lbg refinement converged");
                break;
            }
        }

        avg
    }
}

fn average_distortion(
    samples: &[FeatureVector],
    centroids: &[FeatureVector],
    indices: &[usize],
    dim: usize,
) -> f64 {
    let norm = (samples.len() * dim) as f64;
    if norm == 0.0 {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .zip(indices)
        .map(|(s, &c)| s.distance(&centroids[c]))
        .sum();
    total / norm
}
