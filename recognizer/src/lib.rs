//! Speaker recognition and verification engine.
//!
//! A [`Recognizer`] owns the enrollment data, trains one acoustic model per
//! speaker (directly, or by MAP adaptation from a background model), keeps
//! them in a cache that survives re-selection, and answers queries over the
//! selected speaker and impostor sets:
//!
//! - [`Recognizer::is_recognized`]: closed-set identification.
//! - [`Recognizer::verification_score`]: likelihood ratio against the
//!   background model, optionally Z/T normalized over the impostor cohort.
//! - [`Recognizer::test`]: batch identification with acceptance thresholds.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use spkrec_data::{FeatureVector, SpeakerKey, SpeechData};
//! use spkrec_recognizer::{RecognizerConfig, VqRecognizer};
//!
//! let cluster = |x: f64, y: f64| -> Vec<FeatureVector> {
//!     (0..16)
//!         .map(|i| FeatureVector::from(vec![x + (i % 4) as f64 * 0.1, y + (i / 4) as f64 * 0.1]))
//!         .collect()
//! };
//! let a = SpeakerKey::new("aaa_01").unwrap();
//! let b = SpeakerKey::new("bbb_01").unwrap();
//! let data = SpeechData::from_samples([(a.clone(), cluster(0.0, 0.0)), (b.clone(), cluster(10.0, 10.0))]).unwrap();
//!
//! let mut recognizer = VqRecognizer::with_config(RecognizerConfig { order: 4, ..Default::default() });
//! recognizer.set_speaker_data(Arc::new(data));
//! recognizer.select_speaker_models(&[a.clone(), b]).unwrap();
//!
//! let probe = [FeatureVector::from(vec![0.1, 0.05])];
//! assert!(recognizer.is_recognized(&a, &probe).unwrap());
//! ```
//!
//! # State
//!
//! Setters never train. They join a [`Staleness`] into the current state and
//! drop the prepared [`Scorer`]; the next query retrains exactly what went
//! stale and prepares again.

mod config;
mod error;
mod normalization;
mod recognizer;
mod result;
mod scorer;
mod state;

pub use config::{DecisionThresholds, RecognizerConfig};
pub use error::RecognizerError;
pub use normalization::{Distribution, ScoreNormalization};
pub use recognizer::{GmmRecognizer, Recognizer, VqRecognizer};
pub use result::{Outcome, RecognitionResult};
pub use scorer::{ModelSet, Scorer};
pub use state::{Staleness, TrainingStats};
