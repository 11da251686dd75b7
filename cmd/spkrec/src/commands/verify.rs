//! Speaker verification command.

use std::collections::BTreeMap;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use spkrec_data::SpeakerKey;
use spkrec_model::{AcousticModel, Gmm, ModelKind, VqModel};
use spkrec_recognizer::ScoreNormalization;

use super::{build_recognizer, get_config, load_dataset, output_result, parse_keys, print_info, RunConfig};
use crate::Cli;

/// Score every utterance of a test dataset against one claimed speaker.
#[derive(Args)]
pub struct VerifyCommand {
    /// Claimed speaker key
    #[arg(long)]
    claim: String,

    /// Test dataset (JSON)
    #[arg(long)]
    test: String,

    /// Impostor cohort, comma separated (default: all enrolled)
    #[arg(long, value_delimiter = ',')]
    impostors: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    recognizer: String,
    claim: SpeakerKey,
    normalization: ScoreNormalization,
    impostors: usize,
    scores: BTreeMap<SpeakerKey, f64>,
}

impl VerifyCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let report = match cfg.model {
            ModelKind::Gmm => self.verify::<Gmm>(&cfg)?,
            ModelKind::Vq => self.verify::<VqModel>(&cfg)?,
        };
        output_result(&report, cli.output.as_deref(), cli.json)
    }

    fn verify<M: AcousticModel>(&self, cfg: &RunConfig) -> anyhow::Result<VerifyReport> {
        let claim = SpeakerKey::new(self.claim.trim()).context("invalid claimed speaker key")?;
        let mut recognizer = build_recognizer::<M>(cfg)?;
        let test = load_dataset(&self.test)?;

        let enrolled = recognizer.speaker_data().cloned().context("missing speaker data")?;
        let impostors = parse_keys(&self.impostors, &enrolled)?;
        print_info(&format!(
            "verifying {} against {} impostors with {}",
            claim,
            impostors.len(),
            recognizer.identifier()
        ));

        recognizer.select_speaker_models(std::slice::from_ref(&claim))?;
        recognizer.select_impostor_models(&impostors)?;
        let scores = recognizer
            .verify(&claim, &test)
            .with_context(|| format!("verify speaker {claim}"))?;

        Ok(VerifyReport {
            recognizer: recognizer.identifier(),
            normalization: recognizer.normalization(),
            impostors: recognizer.impostor_models().len(),
            scores: test.keys().cloned().zip(scores).collect(),
            claim,
        })
    }
}
