//! CLI support for vidlang
//!
//! Provides programmatic access to the `run` and `parse` subcommands so they
//! can be driven without spawning the binary.

mod parse;
mod run;

pub use parse::{ParseOptions, execute_parse};
pub use run::{RunOptions, RunReport, execute_run};

use std::io;

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Scan or syntax error in the script
    #[error("{0}")]
    Parse(#[from] crate::ParseError),

    /// Evaluation error
    #[error("{0}")]
    Eval(#[from] crate::EvalError),

    /// JSON serialization error
    #[error("cannot serialize statements: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The media extension list does not compile
    #[error("invalid media extension list: {0}")]
    Config(#[from] regex::Error),

    /// No script provided
    #[error("No script provided. Pass a script path or pipe a script to stdin.")]
    NoInput,
}
