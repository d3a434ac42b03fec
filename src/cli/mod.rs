//! Command-line interface for parcelqc
//!
//! - run: scan a folder and run the selected validators
//! - list: show validator ids and report files
//! - decode-ward: show what ward a file name decodes to

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, DuplicateKeyArg, RunArgs};
pub use commands::{build_settings, decode, list, run, run_command, run_validations, summarize};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{render_response, write_response};
