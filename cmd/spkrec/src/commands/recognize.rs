//! Batch recognition command.

use std::collections::BTreeMap;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use spkrec_data::SpeakerKey;
use spkrec_model::{AcousticModel, Gmm, ModelKind, VqModel};
use spkrec_recognizer::{Outcome, RecognitionResult};

use super::{
    build_recognizer, get_config, load_dataset, output_result, parse_keys, print_info, print_success,
    print_warning, RunConfig,
};
use crate::Cli;

/// Identify the speaker of every utterance in a test dataset.
#[derive(Args)]
pub struct RecognizeCommand {
    /// Test dataset (JSON)
    #[arg(long)]
    test: String,

    /// Speakers to select, comma separated (default: all enrolled)
    #[arg(long, value_delimiter = ',')]
    speakers: Vec<String>,
}

/// One line of the report.
#[derive(Debug, Serialize)]
struct Decision {
    outcome: Outcome,
    #[serde(flatten)]
    result: RecognitionResult,
}

#[derive(Debug, Serialize)]
struct RecognizeReport {
    recognizer: String,
    speakers: usize,
    decisions: BTreeMap<SpeakerKey, Decision>,
    /// Utterances of selected speakers identified as their own speaker.
    correct: usize,
    incorrect: usize,
    accuracy: Option<f64>,
    /// Accepted decisions naming the utterance's own speaker.
    accepted_correct: usize,
}

impl RecognizeCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let cfg = get_config(cli)?;
        let report = match cfg.model {
            ModelKind::Gmm => self.recognize::<Gmm>(&cfg)?,
            ModelKind::Vq => self.recognize::<VqModel>(&cfg)?,
        };

        if let Some(accuracy) = report.accuracy {
            print_success(&format!(
                "{}: {} correct, {} incorrect ({:.1}%), {} accepted correctly",
                report.recognizer,
                report.correct,
                report.incorrect,
                accuracy * 100.0,
                report.accepted_correct
            ));
        } else {
            print_warning("no test utterance belongs to a selected speaker");
        }

        output_result(&report, cli.output.as_deref(), cli.json)
    }

    fn recognize<M: AcousticModel>(&self, cfg: &RunConfig) -> anyhow::Result<RecognizeReport> {
        let mut recognizer = build_recognizer::<M>(cfg)?;
        let test = load_dataset(&self.test)?;

        let enrolled = recognizer.speaker_data().cloned().context("missing speaker data")?;
        let keys = parse_keys(&self.speakers, &enrolled)?;
        print_info(&format!("training {} with {} speakers", recognizer.identifier(), keys.len()));
        recognizer.select_speaker_models(&keys)?;

        let scorer = recognizer.scorer()?;
        let results = scorer.test(&test)?;

        let mut correct = 0usize;
        let mut incorrect = 0usize;
        for (identity, samples) in test.iter() {
            let Some(claimed) = scorer.speaker_models().keys().find(|k| k.is_same_speaker(identity)) else {
                continue;
            };
            if scorer.is_recognized(claimed, samples)? {
                correct += 1;
            } else {
                incorrect += 1;
            }
        }
        let total = correct + incorrect;
        let accepted_correct = results
            .iter()
            .filter(|(identity, result)| result.is_correct_for(identity))
            .count();

        let decisions = results
            .into_iter()
            .map(|(identity, result)| {
                let decision = Decision {
                    outcome: result.outcome(),
                    result,
                };
                (identity, decision)
            })
            .collect();

        Ok(RecognizeReport {
            recognizer: recognizer.identifier(),
            speakers: scorer.speaker_models().len(),
            decisions,
            correct,
            incorrect,
            accuracy: (total > 0).then(|| correct as f64 / total as f64),
            accepted_correct,
        })
    }
}
