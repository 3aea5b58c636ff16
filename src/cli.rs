//! Clap adapter for the `confpatch` binary.
//!
//! Tool options come first, then the configuration file, then any number of
//! `--flag=value` field updates. Everything after the file is captured raw and
//! tokenized by [`parse_flag_args`], so field flags never collide with clap's
//! own options. [`Cli::into_request`] is the only bridge to the core.

use std::path::PathBuf;

use clap::Parser;

use crate::error::ConfpatchError;
use crate::flags::{BUILTIN_HELP, FlagTable, parse_flag_args};
use crate::ops::PatchRequest;
use crate::types::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "confpatch",
    version,
    about = "Update keys in a PHP array configuration file",
    after_help = BUILTIN_HELP
)]
pub struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. "info", "confpatch=debug").
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Read tool settings from this file in addition to confpatch.toml.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print the rewritten file instead of writing it.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the outcome as JSON.
    #[arg(long)]
    pub json: bool,

    /// PHP configuration file to patch.
    #[arg(value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Field updates as --flag=value.
    #[arg(
        value_name = "UPDATES",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub updates: Vec<String>,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    /// Build a [`PatchRequest`], resolving update flags through `table`.
    pub fn into_request(self, table: &FlagTable) -> Result<PatchRequest, ConfpatchError> {
        let path = self.config_file.ok_or(ConfpatchError::MissingArgument)?;
        let options = parse_flag_args(self.updates.as_slice());
        Ok(PatchRequest {
            path,
            updates: table.updates(&options),
            dry_run: self.dry_run,
        })
    }
}
