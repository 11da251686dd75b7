use serde::{Deserialize, Serialize};

use crate::ScoreNormalization;

/// Acceptance thresholds used by batch recognition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    /// Minimum best-model score when no background model is active.
    pub score: f64,
    /// Minimum best-model score when a background model is active.
    pub background_score: f64,
    /// The best model's log score must exceed the background's by more than
    /// this.
    pub background_log_ratio: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            score: 0.135,
            background_score: 0.08,
            background_log_ratio: 0.3,
        }
    }
}

/// Every tunable knob of a [`Recognizer`](crate::Recognizer).
///
/// Missing fields fall back to their defaults when deserializing:
///
/// ```
/// use spkrec_recognizer::{RecognizerConfig, ScoreNormalization};
///
/// let cfg: RecognizerConfig = serde_json::from_str(r#"{"order": 16, "normalization": "zero_test"}"#).unwrap();
/// assert_eq!(cfg.order, 16);
/// assert_eq!(cfg.normalization, ScoreNormalization::ZeroTest);
/// assert_eq!(cfg.relevance_factor, 16.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Cluster or mixture component count.
    pub order: usize,
    /// Derive speaker models from the background model by MAP adaptation.
    pub adaptation_enabled: bool,
    pub adaptation_iterations: usize,
    pub relevance_factor: f64,
    /// Score as a likelihood ratio against the background model.
    pub background_model_enabled: bool,
    pub normalization: ScoreNormalization,
    /// Iteration cap for EM and LBG refinement.
    pub training_iterations: usize,
    /// EM convergence threshold on the total log-likelihood.
    pub training_threshold: f64,
    /// Speaker-discriminative centroid weighting (VQ only).
    pub weighting: bool,
    pub thresholds: DecisionThresholds,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            order: 128,
            adaptation_enabled: false,
            adaptation_iterations: 2,
            relevance_factor: 16.0,
            background_model_enabled: false,
            normalization: ScoreNormalization::None,
            training_iterations: 200,
            training_threshold: 0.001,
            weighting: true,
            thresholds: DecisionThresholds::default(),
        }
    }
}
