use std::ffi::OsString;
use std::process::ExitCode;

use clap::{Arg, ArgAction, Command};

use crate::commands;
use crate::error::CliError;

const NAME: &str = "stratus";

pub fn run() -> ExitCode {
    init_tracing();
    match run_cli(std::env::args()) {
        Ok(code) => code,
        Err(err) => {
            err.print();
            err.exit_code()
        }
    }
}

/// Parses CLI arguments and dispatches to the requested command, returning
/// a POSIX `sysexits`-compatible `ExitCode` so automation can react
/// deterministically.
pub fn run_cli<I, S>(args: I) -> Result<ExitCode, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    let matches = build_cli().try_get_matches_from(args)?;
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("validate", sub_matches)) => commands::validate(sub_matches, json),
        _ => Err(CliError::Usage(
            "a subcommand must be provided, see --help for the available commands".into(),
        )),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn build_cli() -> Command {
    Command::new(NAME)
        .about("Stratus blueprint validation CLI")
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Emit the validation report as JSON instead of human-readable text."),
        )
        .subcommand(
            Command::new("validate")
                .about(
                    "Validate a parsed blueprint schema-tree document against an optional \
                     provider catalog.",
                )
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_name("FILE")
                        .help("Path to the blueprint schema-tree document (JSON or YAML)."),
                )
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .value_name("PATH")
                        .help(
                            "Provider catalog document supplying the function, resource type, \
                             and data source registries. Defaults to empty registries.",
                        ),
                ),
        )
}
