use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Clap(#[from] clap::Error),
    #[error("failed to read {path}: {source}")]
    ReadInput {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    ParseInput { path: String, message: String },
    #[error("unsupported document format for \"{0}\", expected .json, .yaml or .yml")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Validate(#[from] stratus::ValidateError),
    #[error("failed to serialise output: {0}")]
    Output(String),
}

impl CliError {
    pub fn print(&self) {
        match self {
            // clap renders its own help/usage output.
            CliError::Clap(err) => {
                let _ = err.print();
            }
            other => eprintln!("error: {other}"),
        }
    }

    /// POSIX `sysexits` mapping: usage errors, missing input, bad data, and
    /// internal failures are distinguishable to calling automation.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Usage(_) | CliError::Clap(_) => ExitCode::from(64),
            CliError::ReadInput { .. } => ExitCode::from(66),
            CliError::ParseInput { .. } | CliError::UnsupportedFormat(_) => ExitCode::from(65),
            CliError::Validate(_) | CliError::Output(_) => ExitCode::from(70),
        }
    }
}
