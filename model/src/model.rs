use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use spkrec_data::FeatureVector;

use crate::sealed::Sealed;
use crate::ModelError;

/// The closed set of model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Gaussian mixture model.
    Gmm,
    /// Vector quantization codebook.
    Vq,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gmm => write!(f, "gmm"),
            Self::Vq => write!(f, "vq"),
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmm" => Ok(Self::Gmm),
            "vq" => Ok(Self::Vq),
            other => Err(format!("unknown model kind: {other}")),
        }
    }
}

/// Iteration cap and convergence threshold for training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    /// Maximum EM iterations, and maximum LBG refinement passes per split.
    pub max_iterations: usize,
    /// EM stops once the total log-likelihood changes by less than this.
    pub threshold: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            threshold: 0.001,
        }
    }
}

/// MAP adaptation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptationParams {
    /// Number of adaptation passes over the samples.
    pub iterations: usize,
    /// Occupancy needed to pull a parameter halfway from its prior.
    pub relevance_factor: f64,
    /// GMM adaptation stops early once the log-likelihood settles.
    pub threshold: f64,
}

impl Default for AdaptationParams {
    fn default() -> Self {
        Self {
            iterations: 2,
            relevance_factor: 16.0,
            threshold: 0.001,
        }
    }
}

/// Capability shared by every trainable acoustic model.
///
/// The trait is sealed: [`Gmm`](crate::Gmm) and [`VqModel`](crate::VqModel)
/// are its only implementations.
pub trait AcousticModel: Sealed + Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: ModelKind;

    /// Creates an untrained model with `order` clusters.
    fn with_order(order: usize) -> Self;

    /// Cluster or component count.
    fn order(&self) -> usize;

    /// Sets the order used by the next [`AcousticModel::train`].
    fn set_order(&mut self, order: usize);

    /// Fits the model to `samples`, replacing any previous parameters.
    fn train(&mut self, samples: &[FeatureVector], params: &TrainingParams) -> Result<(), ModelError>;

    /// Derives a speaker model from `background` by MAP adaptation towards
    /// `samples`. The result has the background's order.
    fn adapt(
        background: &Self,
        samples: &[FeatureVector],
        params: &AdaptationParams,
    ) -> Result<Self, ModelError>;

    /// Average similarity of `samples` to the model (linear domain).
    fn score(&self, samples: &[FeatureVector]) -> f64;

    /// Average similarity of `samples` to the model (log domain).
    fn log_score(&self, samples: &[FeatureVector]) -> f64;

    /// Feature dimension, 0 while untrained.
    fn dimension_count(&self) -> usize;

    fn is_trained(&self) -> bool {
        self.dimension_count() > 0
    }

    /// Returns a copy post-processed against the other models of the active
    /// set, or `None` when the family has no such step.
    fn reweighted(&self, _others: &[&Self]) -> Option<Self> {
        None
    }
}

/// Checks that `samples` is non-empty and of uniform dimension, returning it.
pub(crate) fn sample_dimension(samples: &[FeatureVector]) -> Result<usize, ModelError> {
    let first = samples.first().ok_or(ModelError::NoSamples)?;
    let dim = first.dim();
    if let Some(bad) = samples.iter().find(|s| s.dim() != dim) {
        return Err(ModelError::DimensionMismatch {
            expected: dim,
            got: bad.dim(),
        });
    }
    Ok(dim)
}

/// Index of the centroid nearest to `sample`, considering only centroids for
/// which `eligible` holds. Returns `None` when nothing is eligible.
pub(crate) fn nearest(
    sample: &FeatureVector,
    centroids: &[FeatureVector],
    eligible: impl Fn(usize) -> bool,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (c, centroid) in centroids.iter().enumerate() {
        if !eligible(c) {
            continue;
        }
        let dist = sample.distance(centroid);
        if best.is_none_or(|(_, d)| dist < d) {
            best = Some((c, dist));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_display_and_parse() {
        assert_eq!(ModelKind::Gmm.to_string(), "gmm");
        assert_eq!(ModelKind::Vq.to_string(), "vq");
        assert_eq!("GMM".parse::<ModelKind>().unwrap(), ModelKind::Gmm);
        assert!("ann".parse::<ModelKind>().is_err());
    }

    #[test]
    fn sample_dimension_checks() {
        assert!(matches!(sample_dimension(&[]), Err(ModelError::NoSamples)));
        let mixed = [
            FeatureVector::from(vec![1.0]),
            FeatureVector::from(vec![1.0, 2.0]),
        ];
        assert!(matches!(
            sample_dimension(&mixed),
            Err(ModelError::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn nearest_respects_eligibility() {
        let centroids = [
            FeatureVector::from(vec![0.0]),
            FeatureVector::from(vec![10.0]),
        ];
        let x = FeatureVector::from(vec![1.0]);
        assert_eq!(nearest(&x, &centroids, |_| true).map(|(c, _)| c), Some(0));
        assert_eq!(nearest(&x, &centroids, |c| c == 1).map(|(c, _)| c), Some(1));
        assert!(nearest(&x, &centroids, |_| false).is_none());
    }
}
