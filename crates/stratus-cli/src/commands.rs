use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::ArgMatches;
use serde::de::DeserializeOwned;
use stratus::schema::Blueprint;
use stratus::{CancelToken, ValidateParams, ValidationStatus, validate_blueprint};
use tracing::debug;

use crate::catalog::ProviderCatalog;
use crate::error::CliError;
use crate::formatter;

pub fn validate(matches: &ArgMatches, json: bool) -> Result<ExitCode, CliError> {
    let file = matches
        .get_one::<String>("file")
        .cloned()
        .unwrap_or_default();

    let catalog = match matches.get_one::<String>("catalog") {
        Some(path) => {
            let catalog: ProviderCatalog = load_document(path)?;
            debug!(path = %path, "loaded provider catalog");
            catalog
        }
        None => ProviderCatalog::default(),
    };

    let blueprint: Blueprint = load_document(&file)?;
    debug!(file = %file, "loaded blueprint schema tree");

    let params = ValidateParams {
        functions: &catalog.functions,
        resources: &catalog.resources,
        data_sources: &catalog.data_sources,
        child_exports: None,
        cancel: CancelToken::new(),
    };
    let report = validate_blueprint(&blueprint, &params)?;
    formatter::emit_report(&file, &report, json)?;

    Ok(match report.status {
        ValidationStatus::Pass => ExitCode::SUCCESS,
        ValidationStatus::Fail => ExitCode::from(65),
    })
}

/// Loads a JSON or YAML document by file extension.
fn load_document<T: DeserializeOwned>(path: &str) -> Result<T, CliError> {
    let content = fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_string(),
        source,
    })?;
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|err| CliError::ParseInput {
            path: path.to_string(),
            message: err.to_string(),
        }),
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&content).map_err(|err| CliError::ParseInput {
                path: path.to_string(),
                message: err.to_string(),
            })
        }
        other => Err(CliError::UnsupportedFormat(
            other.unwrap_or(path).to_string(),
        )),
    }
}
