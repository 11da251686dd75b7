use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use spkrec_data::{FeatureVector, SpeakerKey, SpeechData};
use spkrec_model::{AcousticModel, AdaptationParams, Gmm, ModelKind, TrainingParams, VqModel};

use crate::scorer::ModelSet;
use crate::{
    DecisionThresholds, Distribution, RecognitionResult, RecognizerConfig, RecognizerError, ScoreNormalization,
    Scorer, Staleness, TrainingStats,
};

/// Recognizer over Gaussian mixture models.
pub type GmmRecognizer = Recognizer<Gmm>;

/// Recognizer over vector quantization codebooks.
pub type VqRecognizer = Recognizer<VqModel>;

/// Model lifecycle engine: trains and caches one model per enrolled speaker,
/// an optional background model, and answers recognition and verification
/// queries over the selected speaker and impostor sets.
///
/// Configuration setters only record which models went stale; the work
/// happens lazily in [`Recognizer::train`] and [`Recognizer::prepare`], both
/// of which are no-ops when nothing changed. Every query trains and prepares
/// first, so scores always reflect the current configuration.
///
/// All mutating operations take `&mut self`. For concurrent read-only scoring
/// take a [`Scorer`] snapshot with [`Recognizer::scorer`].
#[derive(Debug)]
pub struct Recognizer<M: AcousticModel> {
    config: RecognizerConfig,
    speaker_data: Option<Arc<SpeechData>>,
    background_data: Option<Arc<SpeechData>>,

    // Every trained speaker model, surviving re-selection.
    model_cache: ModelSet<M>,
    speaker_models: ModelSet<M>,
    impostor_models: ModelSet<M>,
    selected_speakers: Vec<SpeakerKey>,
    selected_impostors: Vec<SpeakerKey>,
    background: Option<Arc<M>>,

    staleness: Staleness,
    // `Some` while prepared.
    prepared: Option<Scorer<M>>,
    stats: TrainingStats,
}

impl<M: AcousticModel> Default for Recognizer<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: AcousticModel> Recognizer<M> {
    pub fn new() -> Self {
        Self::with_config(RecognizerConfig::default())
    }

    pub fn with_config(config: RecognizerConfig) -> Self {
        Self {
            config,
            speaker_data: None,
            background_data: None,
            model_cache: BTreeMap::new(),
            speaker_models: BTreeMap::new(),
            impostor_models: BTreeMap::new(),
            selected_speakers: Vec::new(),
            selected_impostors: Vec::new(),
            background: None,
            staleness: Staleness::AllStale,
            prepared: None,
            stats: TrainingStats::default(),
        }
    }

    // ---------------------------------------------------------------------
    // State transitions
    // ---------------------------------------------------------------------

    fn invalidate(&mut self, stale: Staleness) {
        self.staleness = self.staleness.join(stale);
        self.prepared = None;
    }

    fn unprepare(&mut self) {
        self.prepared = None;
    }

    /// Speaker models are derived from the background model.
    fn adapting(&self) -> bool {
        self.config.adaptation_enabled && self.config.background_model_enabled
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    pub fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    pub fn order(&self) -> usize {
        self.config.order
    }

    /// Changing the order retrains every model.
    pub fn set_order(&mut self, order: usize) {
        if order != self.config.order {
            self.config.order = order;
            self.invalidate(Staleness::AllStale);
        }
    }

    pub fn training_iterations(&self) -> usize {
        self.config.training_iterations
    }

    pub fn set_training_iterations(&mut self, iterations: usize) {
        if iterations != self.config.training_iterations {
            self.config.training_iterations = iterations;
            self.invalidate(Staleness::AllStale);
        }
    }

    pub fn training_threshold(&self) -> f64 {
        self.config.training_threshold
    }

    pub fn set_training_threshold(&mut self, threshold: f64) {
        if threshold != self.config.training_threshold {
            self.config.training_threshold = threshold;
            self.invalidate(Staleness::AllStale);
        }
    }

    pub fn is_adaptation_enabled(&self) -> bool {
        self.config.adaptation_enabled
    }

    pub fn set_adaptation_enabled(&mut self, enabled: bool) {
        if enabled != self.config.adaptation_enabled {
            self.config.adaptation_enabled = enabled;
            self.invalidate(Staleness::SpeakersStale);
        }
    }

    pub fn adaptation_iterations(&self) -> usize {
        self.config.adaptation_iterations
    }

    /// Retrains speaker models only, and only while adaptation is enabled.
    pub fn set_adaptation_iterations(&mut self, iterations: usize) {
        if iterations != self.config.adaptation_iterations {
            self.config.adaptation_iterations = iterations;
            if self.config.adaptation_enabled {
                self.invalidate(Staleness::SpeakersStale);
            }
        }
    }

    pub fn relevance_factor(&self) -> f64 {
        self.config.relevance_factor
    }

    /// Retrains speaker models only, and only while adaptation is enabled.
    pub fn set_relevance_factor(&mut self, factor: f64) {
        if factor != self.config.relevance_factor {
            self.config.relevance_factor = factor;
            if self.config.adaptation_enabled {
                self.invalidate(Staleness::SpeakersStale);
            }
        }
    }

    pub fn is_background_model_enabled(&self) -> bool {
        self.config.background_model_enabled
    }

    pub fn set_background_model_enabled(&mut self, enabled: bool) {
        if enabled != self.config.background_model_enabled {
            self.config.background_model_enabled = enabled;
            if self.config.adaptation_enabled {
                self.invalidate(Staleness::SpeakersStale);
            } else {
                self.unprepare();
            }
        }
    }

    pub fn normalization(&self) -> ScoreNormalization {
        self.config.normalization
    }

    pub fn set_normalization(&mut self, normalization: ScoreNormalization) {
        if normalization != self.config.normalization {
            self.config.normalization = normalization;
            self.unprepare();
        }
    }

    pub fn is_weighting_enabled(&self) -> bool {
        self.config.weighting
    }

    /// Speaker-discriminative weighting; has no effect on GMM recognizers.
    pub fn set_weighting_enabled(&mut self, enabled: bool) {
        if enabled != self.config.weighting {
            self.config.weighting = enabled;
            self.unprepare();
        }
    }

    pub fn thresholds(&self) -> DecisionThresholds {
        self.config.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: DecisionThresholds) {
        if thresholds != self.config.thresholds {
            self.config.thresholds = thresholds;
            self.unprepare();
        }
    }

    /// Enrollment data, one model per key. Replacing it with a different
    /// dataset retrains the speaker models.
    pub fn set_speaker_data(&mut self, data: Arc<SpeechData>) {
        let same = self.speaker_data.as_ref().is_some_and(|d| Arc::ptr_eq(d, &data));
        if !same {
            self.speaker_data = Some(data);
            self.invalidate(Staleness::SpeakersStale);
        }
    }

    pub fn speaker_data(&self) -> Option<&Arc<SpeechData>> {
        self.speaker_data.as_ref()
    }

    /// Background training data, pooled over all its keys.
    pub fn set_background_data(&mut self, data: Arc<SpeechData>) {
        let same = self.background_data.as_ref().is_some_and(|d| Arc::ptr_eq(d, &data));
        if !same {
            self.background_data = Some(data);
            // Adapted speaker models follow in `train`.
            self.invalidate(Staleness::BackgroundStale);
        }
    }

    pub fn background_data(&self) -> Option<&Arc<SpeechData>> {
        self.background_data.as_ref()
    }

    // ---------------------------------------------------------------------
    // Model access
    // ---------------------------------------------------------------------

    pub fn staleness(&self) -> Staleness {
        self.staleness
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared.is_some()
    }

    pub fn stats(&self) -> TrainingStats {
        self.stats
    }

    pub fn model_cache(&self) -> &ModelSet<M> {
        &self.model_cache
    }

    pub fn speaker_models(&self) -> &ModelSet<M> {
        &self.speaker_models
    }

    pub fn impostor_models(&self) -> &ModelSet<M> {
        &self.impostor_models
    }

    pub fn background_model(&self) -> Option<&Arc<M>> {
        self.background.as_ref()
    }

    /// Short label of the recognizer setup, e.g. `vq_o64_weighted_ubm`.
    pub fn identifier(&self) -> String {
        let mut id = format!("{}_o{}", M::KIND, self.config.order);
        if M::KIND == ModelKind::Vq && self.config.weighting {
            id.push_str("_weighted");
        }
        if self.config.background_model_enabled {
            id.push_str("_ubm");
        }
        id
    }

    /// Drops every trained model and statistic; the next query retrains
    /// from scratch.
    pub fn clear_trained_data(&mut self) {
        self.drop_models();
        self.invalidate(Staleness::AllStale);
    }

    fn drop_models(&mut self) {
        self.model_cache.clear();
        self.speaker_models.clear();
        self.impostor_models.clear();
        self.background = None;
    }

    // ---------------------------------------------------------------------
    // Training
    // ---------------------------------------------------------------------

    fn training_params(&self) -> TrainingParams {
        TrainingParams {
            max_iterations: self.config.training_iterations,
            threshold: self.config.training_threshold,
        }
    }

    fn adaptation_params(&self) -> AdaptationParams {
        AdaptationParams {
            iterations: self.config.adaptation_iterations,
            relevance_factor: self.config.relevance_factor,
            threshold: self.config.training_threshold,
        }
    }

    fn checked_speaker_data(&self) -> Result<Arc<SpeechData>, RecognizerError> {
        let data = self
            .speaker_data
            .clone()
            .ok_or(RecognizerError::MissingSpeakerData)?;
        if data.is_empty() {
            return Err(RecognizerError::MissingSpeakerData);
        }
        if !data.is_consistent() {
            return Err(RecognizerError::InconsistentSpeakerData);
        }
        Ok(data)
    }

    fn checked_background_data(&self, speakers: &SpeechData) -> Result<Option<Arc<SpeechData>>, RecognizerError> {
        let Some(data) = self.background_data.clone() else {
            return Ok(None);
        };
        if !data.is_consistent() {
            return Err(RecognizerError::InconsistentBackgroundData);
        }
        if data.is_empty() {
            return Ok(None);
        }
        if data.dimension_count() != speakers.dimension_count() {
            return Err(RecognizerError::IncompatibleDimensions {
                expected: speakers.dimension_count(),
                got: data.dimension_count(),
            });
        }
        Ok(Some(data))
    }

    /// Brings every stale model up to date. No-op when nothing is stale.
    ///
    /// The background model is trained first; speaker models are then
    /// trained (or adapted from it) in parallel. The selected speaker and
    /// impostor sets are re-resolved against the new models.
    pub fn train(&mut self) -> Result<(), RecognizerError> {
        let speaker_data = self.checked_speaker_data()?;
        let background_data = self.checked_background_data(&speaker_data)?;

        let mut stale = self.staleness;
        if stale.is_clean() {
            return Ok(());
        }
        if stale.background_stale() && self.adapting() {
            stale = stale.join(Staleness::SpeakersStale);
        }

        if stale == Staleness::AllStale {
            self.drop_models();
        }

        if stale.background_stale() {
            self.background = match background_data {
                Some(data) => Some(Arc::new(self.train_background(&data)?)),
                None => None,
            };
        }

        if stale.speakers_stale() {
            self.model_cache = self.train_speakers(&speaker_data)?;
        }

        self.speaker_models = resolve(&self.model_cache, &self.selected_speakers, "speaker");
        self.impostor_models = resolve(&self.model_cache, &self.selected_impostors, "impostor");
        self.staleness = Staleness::Clean;
        self.prepared = None;
        Ok(())
    }

    fn train_background(&mut self, data: &SpeechData) -> Result<M, RecognizerError> {
        let samples = data.pooled();
        tracing::info!(
            speakers = data.speaker_count(),
            samples = samples.len(),
            order = self.config.order,
            "training background model"
        );
        let mut model = M::with_order(self.config.order);
        model.train(&samples, &self.training_params())?;
        self.stats.background_trainings += 1;
        Ok(model)
    }

    fn train_speakers(&mut self, data: &SpeechData) -> Result<ModelSet<M>, RecognizerError> {
        if self.config.background_model_enabled && self.background.is_none() {
            tracing::warn!("enabled background model not found, training speaker models directly");
        }
        let background = if self.adapting() { self.background.clone() } else { None };
        let order = self.config.order;
        let training = self.training_params();
        let adaptation = self.adaptation_params();

        tracing::info!(
            speakers = data.speaker_count(),
            adapt = background.is_some(),
            "training speaker models"
        );

        let trained: Vec<(SpeakerKey, Arc<M>)> = data
            .samples()
            .par_iter()
            .map(|(key, samples)| -> Result<(SpeakerKey, Arc<M>), RecognizerError> {
                let model = match &background {
                    Some(ubm) => {
                        tracing::debug!(speaker = %key, "training model (MAP)");
                        M::adapt(ubm, samples, &adaptation)?
                    }
                    None => {
                        tracing::debug!(speaker = %key, "training model");
                        let mut model = M::with_order(order);
                        model.train(samples, &training)?;
                        model
                    }
                };
                Ok((key.clone(), Arc::new(model)))
            })
            .collect::<Result<_, RecognizerError>>()?;

        self.stats.speaker_passes += 1;
        self.stats.models_trained += trained.len();
        Ok(trained.into_iter().collect())
    }

    // ---------------------------------------------------------------------
    // Selection
    // ---------------------------------------------------------------------

    /// Trains if needed, then makes the cached models of `keys` the speaker
    /// set. Keys without a model are skipped with a warning.
    pub fn select_speaker_models(&mut self, keys: &[SpeakerKey]) -> Result<(), RecognizerError> {
        self.train()?;
        self.selected_speakers = keys.to_vec();
        self.speaker_models = resolve(&self.model_cache, keys, "speaker");
        self.unprepare();
        Ok(())
    }

    /// Trains if needed, then makes the cached models of `keys` the impostor
    /// cohort used by Z/T normalization.
    pub fn select_impostor_models(&mut self, keys: &[SpeakerKey]) -> Result<(), RecognizerError> {
        self.train()?;
        self.selected_impostors = keys.to_vec();
        self.impostor_models = resolve(&self.model_cache, keys, "impostor");
        self.unprepare();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Preparation
    // ---------------------------------------------------------------------

    /// Post-processes the selected models and computes per-speaker Z
    /// statistics. No-op while prepared.
    pub fn prepare(&mut self) {
        if self.prepared.is_some() {
            return;
        }

        // A trained background joins the weighting pool even when disabled.
        let (speakers, impostors, background) = if self.config.weighting {
            reweight(&self.speaker_models, &self.impostor_models, self.background.clone())
        } else {
            (self.speaker_models.clone(), self.impostor_models.clone(), self.background.clone())
        };
        let background = background.filter(|_| self.config.background_model_enabled);

        let mut scorer = Scorer {
            speakers: Arc::new(speakers),
            impostors: Arc::new(impostors),
            background,
            background_enabled: self.config.background_model_enabled,
            zero_norm: Arc::new(BTreeMap::new()),
            normalization: self.config.normalization,
            thresholds: self.config.thresholds,
        };

        if self.config.normalization.uses_zero() {
            let zero_norm = self.zero_statistics(&scorer);
            scorer.zero_norm = Arc::new(zero_norm);
        }

        self.prepared = Some(scorer);
    }

    /// Scores each speaker model against the enrollment samples of every
    /// other impostor.
    fn zero_statistics(&self, scorer: &Scorer<M>) -> BTreeMap<SpeakerKey, Distribution> {
        let Some(data) = self.speaker_data.as_deref() else {
            return BTreeMap::new();
        };
        tracing::info!(speakers = scorer.speakers.len(), "calculating Z-norm statistics");

        let cohort: Vec<(&SpeakerKey, &[FeatureVector])> = scorer
            .impostors
            .keys()
            .filter_map(|key| match data.get(key) {
                Some(samples) => Some((key, samples)),
                None => {
                    tracing::warn!(impostor = %key, "impostor speaker data not found");
                    None
                }
            })
            .collect();

        scorer
            .speakers
            .par_iter()
            .filter_map(|(speaker, model)| {
                let scores: Vec<f64> = cohort
                    .iter()
                    .filter(|(key, _)| *key != speaker)
                    .map(|(_, samples)| scorer.ratio(model, samples))
                    .collect();
                let distribution = Distribution::from_scores(&scores);
                if distribution.is_none() {
                    tracing::warn!(
                        speaker = %speaker,
                        impostors = scores.len(),
                        "not enough impostors for Z-normalization"
                    );
                }
                distribution.map(|d| (speaker.clone(), d))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    /// Trains, prepares and returns a snapshot for read-only scoring.
    pub fn scorer(&mut self) -> Result<Scorer<M>, RecognizerError> {
        self.train()?;
        self.prepare();
        match &self.prepared {
            Some(scorer) => Ok(scorer.clone()),
            None => Err(RecognizerError::NoSpeakerModels),
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// See [`Scorer::ratio`].
    pub fn ratio(&mut self, model: &M, samples: &[FeatureVector]) -> Result<f64, RecognizerError> {
        Ok(self.scorer()?.ratio(model, samples))
    }

    /// See [`Scorer::is_recognized`].
    pub fn is_recognized(&mut self, speaker: &SpeakerKey, samples: &[FeatureVector]) -> Result<bool, RecognizerError> {
        self.scorer()?.is_recognized(speaker, samples)
    }

    /// See [`Scorer::verification_score`].
    pub fn verification_score(
        &mut self,
        speaker: &SpeakerKey,
        samples: &[FeatureVector],
    ) -> Result<f64, RecognizerError> {
        self.scorer()?.verification_score(speaker, samples)
    }

    /// See [`Scorer::verify`].
    pub fn verify(&mut self, speaker: &SpeakerKey, data: &SpeechData) -> Result<Vec<f64>, RecognizerError> {
        self.scorer()?.verify(speaker, data)
    }

    /// See [`Scorer::test`].
    pub fn test(&mut self, data: &SpeechData) -> Result<BTreeMap<SpeakerKey, RecognitionResult>, RecognizerError> {
        self.scorer()?.test(data)
    }

    /// See [`Scorer::dimension_count`].
    pub fn dimension_count(&mut self) -> Result<usize, RecognizerError> {
        self.scorer()?.dimension_count()
    }
}

fn resolve<M>(cache: &ModelSet<M>, keys: &[SpeakerKey], role: &str) -> ModelSet<M> {
    let mut set = BTreeMap::new();
    for key in keys {
        match cache.get(key) {
            Some(model) => {
                set.insert(key.clone(), Arc::clone(model));
            }
            None => tracing::warn!(speaker = %key, role, "model could not be selected"),
        }
    }
    set
}

/// Reweights every distinct model of the background, speaker and impostor
/// sets against all the others. Models without a reweighting step are kept
/// as they are.
fn reweight<M: AcousticModel>(
    speakers: &ModelSet<M>,
    impostors: &ModelSet<M>,
    background: Option<Arc<M>>,
) -> (ModelSet<M>, ModelSet<M>, Option<Arc<M>>) {
    let mut pool: BTreeMap<Option<&SpeakerKey>, &Arc<M>> = BTreeMap::new();
    if let Some(ubm) = &background {
        pool.insert(None, ubm);
    }
    for (key, model) in speakers.iter().chain(impostors.iter()) {
        pool.insert(Some(key), model);
    }

    let weighted: BTreeMap<Option<&SpeakerKey>, Arc<M>> = pool
        .par_iter()
        .map(|(key, model)| {
            let others: Vec<&M> = pool
                .iter()
                .filter(|(other, _)| *other != key)
                .map(|(_, m)| Arc::as_ref(m))
                .collect();
            let model = match model.reweighted(&others) {
                Some(m) => Arc::new(m),
                None => Arc::clone(model),
            };
            (*key, model)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let pick = |set: &ModelSet<M>| -> ModelSet<M> {
        set.iter()
            .map(|(key, model)| {
                let m = weighted.get(&Some(key)).unwrap_or(model);
                (key.clone(), Arc::clone(m))
            })
            .collect()
    };
    let speakers = pick(speakers);
    let impostors = pick(impostors);
    let background = background
        .as_ref()
        .map(|ubm| Arc::clone(weighted.get(&None).unwrap_or(ubm)));
    (speakers, impostors, background)
}
