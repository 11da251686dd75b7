use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Score normalization applied to verification scores.
///
/// Z statistics come from a speaker model scored against impostor enrollment
/// data and are computed once per preparation. T statistics come from the
/// test utterance scored against impostor models and are computed per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreNormalization {
    #[default]
    None,
    /// `(s - z.mean) / z.deviation`
    Zero,
    /// `(s - t.mean) / t.deviation`
    Test,
    /// Z then T.
    ZeroTest,
    /// T then Z.
    TestZero,
}

impl ScoreNormalization {
    /// Needs per-speaker Z statistics.
    pub fn uses_zero(self) -> bool {
        matches!(self, Self::Zero | Self::ZeroTest | Self::TestZero)
    }

    /// Needs per-query T statistics.
    pub fn uses_test(self) -> bool {
        matches!(self, Self::Test | Self::ZeroTest | Self::TestZero)
    }

    /// Normalizes `score`. A missing distribution skips its step.
    pub fn apply(self, score: f64, zero: Option<&Distribution>, test: Option<&Distribution>) -> f64 {
        let step = |s: f64, d: Option<&Distribution>| d.map_or(s, |d| d.normalize(s));
        match self {
            Self::None => score,
            Self::Zero => step(score, zero),
            Self::Test => step(score, test),
            Self::ZeroTest => step(step(score, zero), test),
            Self::TestZero => step(step(score, test), zero),
        }
    }
}

impl fmt::Display for ScoreNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Zero => "zero",
            Self::Test => "test",
            Self::ZeroTest => "zero_test",
            Self::TestZero => "test_zero",
        };
        f.write_str(s)
    }
}

impl FromStr for ScoreNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "zero" | "z" => Ok(Self::Zero),
            "test" | "t" => Ok(Self::Test),
            "zero_test" | "zt" => Ok(Self::ZeroTest),
            "test_zero" | "tz" => Ok(Self::TestZero),
            other => Err(format!("unknown score normalization: {other}")),
        }
    }
}

/// Mean and population standard deviation of a cohort score set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    pub mean: f64,
    pub deviation: f64,
}

impl Distribution {
    /// Returns `None` for fewer than two scores or a degenerate spread, in
    /// which case the normalization step is skipped.
    pub fn from_scores(scores: &[f64]) -> Option<Self> {
        if scores.len() < 2 {
            return None;
        }
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean) * (s - mean)).sum::<f64>() / n;
        let deviation = variance.sqrt();
        if !(deviation > 0.0 && deviation.is_finite() && mean.is_finite()) {
            return None;
        }
        Some(Self { mean, deviation })
    }

    pub fn normalize(&self, score: f64) -> f64 {
        (score - self.mean) / self.deviation
    }
}
