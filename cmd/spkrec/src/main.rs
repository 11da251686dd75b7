//! spkrec - batch speaker recognition and verification.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{RecognizeCommand, VerifyCommand};

/// spkrec - train speaker models from JSON feature datasets and score test
/// utterances against them.
///
/// The run configuration (YAML or JSON) names the model family, the
/// enrollment and background datasets, and the recognizer settings:
///
///   model: vq
///   speaker_data: enroll.json
///   background_data: ubm.json
///   recognizer:
///     order: 64
///     background_model_enabled: true
///     normalization: zero
#[derive(Parser)]
#[command(name = "spkrec")]
#[command(about = "Speaker recognition and verification CLI tool")]
#[command(version)]
pub struct Cli {
    /// Run configuration file (YAML or JSON)
    #[arg(long, global = true, default_value = "spkrec.yaml")]
    pub config: String,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Identify the speaker of every test utterance
    Recognize(RecognizeCommand),
    /// Score test utterances against a claimed speaker
    Verify(VerifyCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Recognize(cmd) => cmd.run(&cli),
        Commands::Verify(cmd) => cmd.run(&cli),
    }
}
