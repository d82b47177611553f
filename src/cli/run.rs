//! Evaluate vidlang scripts

use tracing::info;

use super::CliError;
use crate::{
    Config, Context, Interpreter,
    backend::{
        MediaBackend,
        graph::{DryRunner, FilterGraph, Invocation, ProcessRunner},
    },
};

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Script source
    pub script: String,
    pub config: Config,
    /// Log every dispatched command
    pub debug: bool,
    /// Stream a live copy of every export to the preview sink
    pub preview: bool,
    /// Record the ffmpeg command lines instead of running them
    pub dry_run: bool,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// ffmpeg command lines that were recorded (dry runs only)
    pub invocations: Vec<Invocation>,
}

/// Evaluate a script, stopping at the first error
pub fn execute_run(options: &RunOptions) -> Result<RunReport, CliError> {
    let ctx = Context::new(options.config.clone())?
        .with_debug(options.debug)
        .with_preview(options.preview);

    if options.dry_run {
        let backend = FilterGraph::new(&options.config, DryRunner::default());
        let backend = evaluate(&options.script, ctx, backend)?;
        return Ok(RunReport {
            invocations: backend.runner().invocations().to_vec(),
        });
    }

    let backend = FilterGraph::new(&options.config, ProcessRunner);
    evaluate(&options.script, ctx, backend)?;
    Ok(RunReport::default())
}

fn evaluate<B: MediaBackend>(script: &str, ctx: Context, backend: B) -> Result<B, CliError> {
    let mut interpreter = Interpreter::new(ctx, backend);
    interpreter.run(script)?;
    info!("script evaluated");
    Ok(interpreter.into_parts().1)
}
