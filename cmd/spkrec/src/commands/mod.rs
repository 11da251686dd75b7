//! CLI commands module.

mod recognize;
mod util;
mod verify;

pub use recognize::RecognizeCommand;
pub use verify::VerifyCommand;

pub(crate) use util::*;
