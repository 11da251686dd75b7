//! Utility functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use spkrec_data::{SpeakerKey, SpeechData};
use spkrec_model::{AcousticModel, ModelKind};
use spkrec_recognizer::{Recognizer, RecognizerConfig};

use crate::Cli;

/// Run configuration shared by every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model family.
    pub model: ModelKind,

    /// Enrollment dataset (JSON).
    pub speaker_data: String,

    /// Background model dataset (JSON).
    #[serde(default)]
    pub background_data: Option<String>,

    #[serde(default)]
    pub recognizer: RecognizerConfig,
}

/// Loads the run configuration named by `--config`.
pub fn get_config(cli: &Cli) -> anyhow::Result<RunConfig> {
    load_request(&cli.config).with_context(|| format!("load config {}", cli.config))
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml");

    let result = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    Ok(result)
}

/// Loads and validates a JSON feature dataset.
pub fn load_dataset(path: &str) -> anyhow::Result<Arc<SpeechData>> {
    let content = std::fs::read(path).with_context(|| format!("read dataset {path}"))?;
    let data = SpeechData::from_json(&content).with_context(|| format!("load dataset {path}"))?;
    tracing::debug!(
        path,
        speakers = data.speaker_count(),
        samples = data.total_sample_count(),
        dimension = data.dimension_count(),
        "dataset loaded"
    );
    Ok(Arc::new(data))
}

/// Builds a recognizer with its datasets attached. Nothing is trained yet.
pub fn build_recognizer<M: AcousticModel>(cfg: &RunConfig) -> anyhow::Result<Recognizer<M>> {
    let mut recognizer = Recognizer::with_config(cfg.recognizer.clone());
    recognizer.set_speaker_data(load_dataset(&cfg.speaker_data)?);
    if let Some(path) = &cfg.background_data {
        recognizer.set_background_data(load_dataset(path)?);
    }
    Ok(recognizer)
}

/// Parses speaker keys, falling back to every enrolled speaker when empty.
pub fn parse_keys(raw: &[String], enrolled: &SpeechData) -> anyhow::Result<Vec<SpeakerKey>> {
    if raw.is_empty() {
        return Ok(enrolled.keys().cloned().collect());
    }
    raw.iter()
        .map(|s| SpeakerKey::new(s.trim()).with_context(|| format!("invalid speaker key '{s}'")))
        .collect()
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)?
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keys_defaults_to_enrolled() {
        let enrolled =
            SpeechData::from_json(br#"{"225_01": [[0.0]], "240_01": [[1.0]]}"#).unwrap();
        let all = parse_keys(&[], &enrolled).unwrap();
        assert_eq!(all.len(), 2);

        let picked = parse_keys(&["240_01".to_string(), " 225_01".to_string()], &enrolled).unwrap();
        assert_eq!(picked[0].as_str(), "240_01");
        assert_eq!(picked[1].as_str(), "225_01");

        assert!(parse_keys(&[String::new()], &enrolled).is_err());
    }

    #[test]
    fn run_config_from_yaml() {
        let yaml = "
model: gmm
speaker_data: enroll.json
recognizer:
  order: 16
  normalization: zero_test
";
        let cfg: RunConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.model, ModelKind::Gmm);
        assert!(cfg.background_data.is_none());
        assert_eq!(cfg.recognizer.order, 16);
        assert_eq!(cfg.recognizer.adaptation_iterations, 2);
    }
}
