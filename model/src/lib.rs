//! Acoustic speaker models.
//!
//! Two model families implement the [`AcousticModel`] capability:
//!
//! - [`Gmm`]: diagonal-covariance Gaussian mixture trained with
//!   Expectation-Maximization, initialized from an LBG codebook, with MAP
//!   mean adaptation from a background mixture.
//! - [`VqModel`]: LBG codebook scored by weighted inverse distance, with MAP
//!   centroid adaptation and optional speaker-discriminative weighting.
//!
//! Both are built on the [`Lbg`] binary-split vector quantizer.
//!
//! # Adaptation
//!
//! [`AcousticModel::adapt`] takes a background model of the same concrete
//! type, so adapting a GMM from a VQ codebook does not type-check.
//!
//! ```
//! use spkrec_data::FeatureVector;
//! use spkrec_model::{AcousticModel, AdaptationParams, Gmm, TrainingParams};
//!
//! let samples: Vec<FeatureVector> = (0..64)
//!     .map(|i| FeatureVector::from(vec![(i % 8) as f64, (i / 8) as f64]))
//!     .collect();
//!
//! let mut ubm = Gmm::with_order(4);
//! ubm.train(&samples, &TrainingParams::default()).unwrap();
//!
//! let speaker = Gmm::adapt(&ubm, &samples[..16], &AdaptationParams::default()).unwrap();
//! assert_eq!(speaker.order(), 4);
//! ```

mod error;
mod gmm;
mod lbg;
mod model;
mod vq;

pub use error::ModelError;
pub use gmm::{Component, Gmm, VARIANCE_FLOOR};
pub use lbg::{Codebook, Lbg, DEFAULT_ETA};
pub use model::{AcousticModel, AdaptationParams, ModelKind, TrainingParams};
pub use vq::{VqModel, MIN_DISTANCE};

mod sealed {
    pub trait Sealed {}
}
