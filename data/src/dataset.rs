use std::collections::BTreeMap;

use crate::{DataError, FeatureVector, SpeakerKey};

/// Validation state of a [`SpeechData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Samples were inserted since the last [`SpeechData::validate`].
    #[default]
    Pending,
    /// Every vector has `dimension` components.
    Consistent { dimension: usize, total: usize },
    /// At least one vector disagrees with the others.
    Inconsistent,
}

/// Per-speaker feature vectors, keyed and ordered by [`SpeakerKey`].
///
/// Consumers must only rely on the dimension count after a successful
/// [`SpeechData::validate`]; inserting invalidates it again.
#[derive(Debug, Clone, Default)]
pub struct SpeechData {
    samples: BTreeMap<SpeakerKey, Vec<FeatureVector>>,
    validation: Validation,
}

impl SpeechData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and validates a dataset in one step.
    pub fn from_samples<I>(entries: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = (SpeakerKey, Vec<FeatureVector>)>,
    {
        let mut data = Self::new();
        for (key, samples) in entries {
            data.insert(key, samples);
        }
        data.validate()?;
        Ok(data)
    }

    /// Parses a JSON object of the form `{"<key>": [[f64, ...], ...], ...}`
    /// and validates it.
    pub fn from_json(json_data: &[u8]) -> Result<Self, DataError> {
        let raw: BTreeMap<SpeakerKey, Vec<FeatureVector>> = serde_json::from_slice(json_data)?;
        Self::from_samples(raw)
    }

    /// Appends `samples` to the sequence stored under `key`.
    ///
    /// Zero-length vectors are dropped. A key that ends up with no vectors is
    /// not stored.
    pub fn insert(&mut self, key: SpeakerKey, samples: Vec<FeatureVector>) {
        let samples: Vec<FeatureVector> = samples.into_iter().filter(|s| s.dim() > 0).collect();
        if samples.is_empty() {
            tracing::warn!(speaker = %key, "missing sample data, speaker skipped");
            return;
        }
        self.samples.entry(key).or_default().extend(samples);
        self.validation = Validation::Pending;
    }

    /// Checks that every vector shares the dimension of the first one and
    /// freezes that dimension. Returns the dimension count.
    ///
    /// An empty dataset is consistent with dimension 0.
    pub fn validate(&mut self) -> Result<usize, DataError> {
        let expected = self
            .samples
            .values()
            .next()
            .and_then(|seq| seq.first())
            .map_or(0, |v| v.dim());

        let mut total = 0usize;
        for (key, seq) in &self.samples {
            for sample in seq {
                if sample.dim() != expected {
                    self.validation = Validation::Inconsistent;
                    return Err(DataError::DimensionMismatch {
                        speaker: key.to_string(),
                        expected,
                        got: sample.dim(),
                    });
                }
                total += 1;
            }
        }

        tracing::debug!(
            speakers = self.samples.len(),
            samples = total,
            dimension = expected,
            "dataset consistent"
        );
        self.validation = Validation::Consistent {
            dimension: expected,
            total,
        };
        Ok(expected)
    }

    pub fn validation(&self) -> Validation {
        self.validation
    }

    /// True only after a successful [`SpeechData::validate`] with no later insert.
    pub fn is_consistent(&self) -> bool {
        matches!(self.validation, Validation::Consistent { .. })
    }

    /// Both datasets are consistent and share the dimension count.
    pub fn is_compatible(&self, other: &SpeechData) -> bool {
        self.is_consistent()
            && other.is_consistent()
            && self.dimension_count() == other.dimension_count()
    }

    /// Frozen dimension count, 0 unless consistent.
    pub fn dimension_count(&self) -> usize {
        match self.validation {
            Validation::Consistent { dimension, .. } => dimension,
            _ => 0,
        }
    }

    pub fn speaker_count(&self) -> usize {
        self.samples.len()
    }

    /// Total vector count, 0 unless consistent.
    pub fn total_sample_count(&self) -> usize {
        match self.validation {
            Validation::Consistent { total, .. } => total,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &BTreeMap<SpeakerKey, Vec<FeatureVector>> {
        &self.samples
    }

    pub fn get(&self, key: &SpeakerKey) -> Option<&[FeatureVector]> {
        self.samples.get(key).map(|v| v.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &SpeakerKey> {
        self.samples.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SpeakerKey, &[FeatureVector])> {
        self.samples.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Every vector of every speaker, in key order.
    pub fn pooled(&self) -> Vec<FeatureVector> {
        self.samples.values().flatten().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.validation = Validation::Pending;
    }
}
