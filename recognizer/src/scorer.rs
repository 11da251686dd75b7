use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use spkrec_data::{FeatureVector, SpeakerKey, SpeechData};
use spkrec_model::AcousticModel;

use crate::{DecisionThresholds, Distribution, RecognitionResult, RecognizerError, ScoreNormalization};

/// Keyed set of shared models.
pub type ModelSet<M> = BTreeMap<SpeakerKey, Arc<M>>;

/// Immutable snapshot of a trained and prepared recognizer.
///
/// Obtained from [`Recognizer::scorer`](crate::Recognizer::scorer). Every
/// operation takes `&self`, and the snapshot is `Send + Sync`, so it can be
/// shared across threads while the recognizer itself is reconfigured.
#[derive(Debug, Clone)]
pub struct Scorer<M: AcousticModel> {
    pub(crate) speakers: Arc<ModelSet<M>>,
    pub(crate) impostors: Arc<ModelSet<M>>,
    pub(crate) background: Option<Arc<M>>,
    pub(crate) background_enabled: bool,
    pub(crate) zero_norm: Arc<BTreeMap<SpeakerKey, Distribution>>,
    pub(crate) normalization: ScoreNormalization,
    pub(crate) thresholds: DecisionThresholds,
}

impl<M: AcousticModel> Scorer<M> {
    pub fn speaker_models(&self) -> &ModelSet<M> {
        &self.speakers
    }

    pub fn impostor_models(&self) -> &ModelSet<M> {
        &self.impostors
    }

    /// The background model, when enabled and trained.
    pub fn background_model(&self) -> Option<&M> {
        self.background.as_deref()
    }

    /// Z statistics of a speaker, if enough impostors were available.
    pub fn zero_distribution(&self, speaker: &SpeakerKey) -> Option<&Distribution> {
        self.zero_norm.get(speaker)
    }

    pub fn normalization(&self) -> ScoreNormalization {
        self.normalization
    }

    /// Unnormalized verification signal: the log-likelihood ratio against
    /// the background model when one is active, otherwise the raw score.
    pub fn ratio(&self, model: &M, samples: &[FeatureVector]) -> f64 {
        match &self.background {
            Some(background) => model.log_score(samples) - background.log_score(samples),
            None => model.score(samples),
        }
    }

    /// Whether the best-scoring selected speaker model is `speaker`.
    pub fn is_recognized(&self, speaker: &SpeakerKey, samples: &[FeatureVector]) -> Result<bool, RecognizerError> {
        if self.speakers.is_empty() {
            return Err(RecognizerError::NoSpeakerModels);
        }
        Ok(self
            .best_match(samples)
            .is_some_and(|(best, _)| best == speaker))
    }

    /// Normalized verification score of `samples` against the claimed
    /// `speaker`.
    pub fn verification_score(
        &self,
        speaker: &SpeakerKey,
        samples: &[FeatureVector],
    ) -> Result<f64, RecognizerError> {
        let model = self
            .speakers
            .get(speaker)
            .ok_or_else(|| RecognizerError::UnknownSpeaker(speaker.clone()))?;

        let score = self.ratio(model, samples);
        if self.normalization == ScoreNormalization::None {
            return Ok(score);
        }

        let zero = if self.normalization.uses_zero() {
            self.zero_norm.get(speaker)
        } else {
            None
        };
        let test = if self.normalization.uses_test() {
            self.test_distribution(speaker, samples)
        } else {
            None
        };

        Ok(self.normalization.apply(score, zero, test.as_ref()))
    }

    /// T statistics: the utterance scored by every impostor model other than
    /// the claimed speaker's.
    fn test_distribution(&self, speaker: &SpeakerKey, samples: &[FeatureVector]) -> Option<Distribution> {
        let scores: Vec<f64> = self
            .impostors
            .iter()
            .filter(|(key, _)| *key != speaker)
            .map(|(_, model)| self.ratio(model, samples))
            .collect();
        let distribution = Distribution::from_scores(&scores);
        if distribution.is_none() {
            tracing::warn!(
                speaker = %speaker,
                impostors = scores.len(),
                "not enough impostors for T-normalization"
            );
        }
        distribution
    }

    /// Verification scores of every utterance in `data`, in key order.
    pub fn verify(&self, speaker: &SpeakerKey, data: &SpeechData) -> Result<Vec<f64>, RecognizerError> {
        self.check_test_data(data)?;
        if !self.speakers.contains_key(speaker) {
            return Err(RecognizerError::UnknownSpeaker(speaker.clone()));
        }
        data.iter()
            .map(|(_, samples)| self.verification_score(speaker, samples))
            .collect()
    }

    /// Batch recognition of every identity in `data`.
    pub fn test(&self, data: &SpeechData) -> Result<BTreeMap<SpeakerKey, RecognitionResult>, RecognizerError> {
        self.check_test_data(data)?;
        let results: Vec<(SpeakerKey, RecognitionResult)> = data
            .samples()
            .par_iter()
            .map(|(identity, samples)| (identity.clone(), self.decide(identity, samples)))
            .collect();
        Ok(results.into_iter().collect())
    }

    fn decide(&self, identity: &SpeakerKey, samples: &[FeatureVector]) -> RecognitionResult {
        let known = self.speakers.keys().any(|k| identity.is_same_speaker(k));

        let Some((best, best_score)) = self.best_match(samples) else {
            return RecognitionResult::rejected(known);
        };
        tracing::debug!(identity = %identity, best = %best, score = best_score, "most probable speaker");

        let accepted = match &self.background {
            Some(background) => {
                let log_ratio = self.speakers[best].log_score(samples) - background.log_score(samples);
                log_ratio > self.thresholds.background_log_ratio
                    && best_score >= self.thresholds.background_score
            }
            None => best_score >= self.thresholds.score,
        };

        if accepted {
            RecognitionResult::accepted(known, best.clone())
        } else {
            RecognitionResult::rejected(known)
        }
    }

    /// Arg-max of the raw score over the selected speakers; ties keep the
    /// first key.
    fn best_match(&self, samples: &[FeatureVector]) -> Option<(&SpeakerKey, f64)> {
        let mut best: Option<(&SpeakerKey, f64)> = None;
        for (key, model) in self.speakers.iter() {
            let score = model.score(samples);
            if score > best.map_or(f64::NEG_INFINITY, |(_, s)| s) {
                best = Some((key, score));
            }
        }
        best
    }

    fn check_test_data(&self, data: &SpeechData) -> Result<(), RecognizerError> {
        if !data.is_consistent() {
            return Err(RecognizerError::InconsistentTestData);
        }
        let expected = self.dimension_count()?;
        if expected != data.dimension_count() {
            return Err(RecognizerError::IncompatibleDimensions {
                expected,
                got: data.dimension_count(),
            });
        }
        Ok(())
    }

    /// Feature dimension of the selected speaker models, 0 when none is
    /// selected. Fails when it disagrees with an enabled background model.
    pub fn dimension_count(&self) -> Result<usize, RecognizerError> {
        let Some(first) = self.speakers.values().next() else {
            return Ok(0);
        };
        let speaker = first.dimension_count();
        if self.background_enabled {
            let background = self
                .background
                .as_ref()
                .ok_or(RecognizerError::BackgroundUnavailable)?
                .dimension_count();
            if background != speaker {
                tracing::warn!(speaker, background, "mismatching speaker and background model dimensions");
                return Err(RecognizerError::DimensionMismatch { speaker, background });
            }
        }
        Ok(speaker)
    }
}
