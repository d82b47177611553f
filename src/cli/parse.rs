//! Dump the statement tree of a script

use super::CliError;
use crate::{parse, printer};

/// Options for the parse command
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Script source
    pub script: String,
    /// Emit JSON instead of the indented tree
    pub json: bool,
}

/// Parse a script and render its statements, stopping at the first error
pub fn execute_parse(options: &ParseOptions) -> Result<String, CliError> {
    let statements = parse(&options.script).collect::<Result<Vec<_>, _>>()?;

    if options.json {
        let dump: Vec<_> = statements.iter().map(printer::to_json).collect();
        return Ok(serde_json::to_string_pretty(&dump)?);
    }

    Ok(statements
        .iter()
        .map(printer::tree)
        .collect::<Vec<_>>()
        .join("\n"))
}
