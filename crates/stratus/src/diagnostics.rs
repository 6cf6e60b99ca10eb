//! Severity-tagged, range-anchored messages surfaced to the user alongside
//! (or instead of) load errors. Warnings and info diagnostics never fail
//! validation.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorReasonCode, LoadError};
use crate::source::DiagnosticRange;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Error => write!(f, "error"),
            DiagnosticLevel::Warning => write!(f, "warning"),
            DiagnosticLevel::Info => write!(f, "info"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DiagnosticRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ErrorReasonCode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_actions: Vec<SuggestedAction>,
}

impl Diagnostic {
    pub fn new(
        level: DiagnosticLevel,
        message: impl Into<String>,
        range: Option<DiagnosticRange>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            range,
            reason_code: None,
            metadata: BTreeMap::new(),
            suggested_actions: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>, range: Option<DiagnosticRange>) -> Self {
        Self::new(DiagnosticLevel::Error, message, range)
    }

    pub fn warning(message: impl Into<String>, range: Option<DiagnosticRange>) -> Self {
        Self::new(DiagnosticLevel::Warning, message, range)
    }

    pub fn info(message: impl Into<String>, range: Option<DiagnosticRange>) -> Self {
        Self::new(DiagnosticLevel::Info, message, range)
    }

    pub fn with_reason_code(mut self, reason_code: ErrorReasonCode) -> Self {
        self.reason_code = Some(reason_code);
        self
    }

    pub fn with_action(mut self, action: SuggestedAction) -> Self {
        self.suggested_actions.push(action);
        self
    }
}

/// A remediation hint a front-end can offer next to a diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedAction {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Flattens a load-error tree into error-level diagnostics, one per leaf,
/// for callers that render a flat list instead of the error tree.
pub fn load_error_diagnostics(error: &LoadError) -> Vec<Diagnostic> {
    error
        .leaf_errors()
        .into_iter()
        .map(|leaf| {
            Diagnostic::error(leaf.message.clone(), leaf.range).with_reason_code(leaf.reason_code)
        })
        .collect()
}
