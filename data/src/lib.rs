//! Input data for speaker recognition.
//!
//! A [`SpeechData`] maps each [`SpeakerKey`] to the ordered feature vectors
//! extracted from that speaker's utterances. Every vector in one dataset must
//! have the same dimension; [`SpeechData::validate`] checks this and freezes
//! the dimension count.
//!
//! # Usage
//!
//! ```
//! use spkrec_data::{FeatureVector, SpeakerKey, SpeechData};
//!
//! let mut data = SpeechData::new();
//! data.insert(
//!     SpeakerKey::new("225_01").unwrap(),
//!     vec![FeatureVector::from(vec![0.1, 0.2]), FeatureVector::from(vec![0.3, 0.1])],
//! );
//! assert_eq!(data.validate().unwrap(), 2);
//! ```
//!
//! # Speaker families
//!
//! Raw ids encode `speakerId + sampleId` (e.g. `"225_07"`), so two keys with
//! the same three-character prefix belong to the same speaker. See
//! [`SpeakerKey::is_same_speaker`].

mod dataset;
mod error;
mod key;
mod vector;

pub use dataset::{SpeechData, Validation};
pub use error::DataError;
pub use key::{SpeakerKey, FAMILY_LEN};
pub use vector::FeatureVector;
