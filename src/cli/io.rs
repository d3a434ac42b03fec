//! JSON output for the CLI
//!
//! Every command prints a single JSON object on stdout; logs go to stderr.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

/// Wrap command output in the success envelope
pub fn render_response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, &render_response(data))?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
