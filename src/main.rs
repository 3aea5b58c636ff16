use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use confpatch::cli::Cli;
use confpatch::error::ConfpatchError;
use confpatch::ops::{PatchOutcome, patch_file};
use confpatch::settings::SettingsLoader;
use confpatch::types::OutputFormat;

fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<PatchOutcome, ConfpatchError> {
    let settings = SettingsLoader::new()
        .settings_file(cli.settings.clone())
        .cli_override("log_level", cli.log_level.clone())
        .load()?;
    init_tracing(&settings.log_level);
    debug!(log_level = %settings.log_level, extra_flags = settings.flags.len(), "settings loaded");

    let request = cli.into_request(&settings.flag_table())?;
    patch_file(&request)
}

fn print_outcome(outcome: &PatchOutcome, format: OutputFormat) {
    match (format, outcome) {
        (OutputFormat::Json, _) => match serde_json::to_string(outcome) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e}"),
        },
        (OutputFormat::Text, PatchOutcome::Preview { content, .. }) => print!("{content}"),
        (OutputFormat::Text, PatchOutcome::Written { .. }) => println!("{outcome}"),
    }
}

#[cfg(feature = "rich-errors")]
fn report(err: ConfpatchError) {
    eprintln!("Error: {:?}", miette::Report::new(err));
}

#[cfg(not(feature = "rich-errors"))]
fn report(err: ConfpatchError) {
    eprintln!("Error: {err}");
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here, on stdout.
            let code = if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = e.print();
            return code;
        }
    };

    let format = cli.output_format();
    match run(cli) {
        Ok(outcome) => {
            print_outcome(&outcome, format);
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(err);
            ExitCode::FAILURE
        }
    }
}
