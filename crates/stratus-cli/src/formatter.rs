use stratus::{Diagnostic, ValidationReport, ValidationStatus, load_error_diagnostics};

use crate::error::CliError;

/// Renders a validation report either as human-readable lines
/// (`file:line:column [level] message`) or as a single JSON document.
pub fn emit_report(file: &str, report: &ValidationReport, json: bool) -> Result<(), CliError> {
    if json {
        let rendered =
            serde_json::to_string_pretty(report).map_err(|err| CliError::Output(err.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }

    for diagnostic in &report.diagnostics {
        println!("{}", format_diagnostic(file, diagnostic));
    }
    if let Some(error) = &report.error {
        for diagnostic in load_error_diagnostics(error) {
            println!("{}", format_diagnostic(file, &diagnostic));
        }
    }
    match report.status {
        ValidationStatus::Pass => println!("{file}: validation passed"),
        ValidationStatus::Fail => println!("{file}: validation failed"),
    }
    Ok(())
}

fn format_diagnostic(file: &str, diagnostic: &Diagnostic) -> String {
    match &diagnostic.range {
        Some(range) => format!(
            "{file}:{}:{} [{}] {}",
            range.start.line, range.start.column, diagnostic.level, diagnostic.message
        ),
        None => format!("{file} [{}] {}", diagnostic.level, diagnostic.message),
    }
}
