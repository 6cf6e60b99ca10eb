//! Load errors and the fatal error channel.
//!
//! Anything attributable to user input becomes a [`LoadError`] (or a
//! diagnostic); the only fatal conditions are cancellation and registry
//! lookup failures, which propagate immediately as [`ValidateError`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::DiagnosticRange;

/// The closed set of reason codes a load error may carry.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReasonCode {
    MissingVersion,
    InvalidVersion,
    InvalidResource,
    InvalidVariable,
    InvalidValue,
    InvalidValueType,
    InvalidExport,
    InvalidReference,
    InvalidSubstitution,
    InvalidInclude,
    InvalidDataSource,
    InvalidDataSourceFilterOperator,
    UnsupportedDataSourceFilterOperator,
    InvalidDataSourceFieldType,
    DataSourceFilterConflict,
    InvalidMapKey,
    MultipleValidationErrors,
    ReferenceCycle,
    InvalidMappingNode,
    MissingResourceDependency,
    ComputedFieldInBlueprint,
    EachResourceDependency,
    EachChildDependency,
    SubFuncLinkArgResourceNotFound,
    MissingResources,
}

impl ErrorReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorReasonCode::MissingVersion => "missing_version",
            ErrorReasonCode::InvalidVersion => "invalid_version",
            ErrorReasonCode::InvalidResource => "invalid_resource",
            ErrorReasonCode::InvalidVariable => "invalid_variable",
            ErrorReasonCode::InvalidValue => "invalid_value",
            ErrorReasonCode::InvalidValueType => "invalid_value_type",
            ErrorReasonCode::InvalidExport => "invalid_export",
            ErrorReasonCode::InvalidReference => "invalid_reference",
            ErrorReasonCode::InvalidSubstitution => "invalid_substitution",
            ErrorReasonCode::InvalidInclude => "invalid_include",
            ErrorReasonCode::InvalidDataSource => "invalid_data_source",
            ErrorReasonCode::InvalidDataSourceFilterOperator => {
                "invalid_data_source_filter_operator"
            }
            ErrorReasonCode::UnsupportedDataSourceFilterOperator => {
                "unsupported_data_source_filter_operator"
            }
            ErrorReasonCode::InvalidDataSourceFieldType => "invalid_data_source_field_type",
            ErrorReasonCode::DataSourceFilterConflict => "data_source_filter_conflict",
            ErrorReasonCode::InvalidMapKey => "invalid_map_key",
            ErrorReasonCode::MultipleValidationErrors => "multiple_validation_errors",
            ErrorReasonCode::ReferenceCycle => "reference_cycle",
            ErrorReasonCode::InvalidMappingNode => "invalid_mapping_node",
            ErrorReasonCode::MissingResourceDependency => "missing_resource_dependency",
            ErrorReasonCode::ComputedFieldInBlueprint => "computed_field_in_blueprint",
            ErrorReasonCode::EachResourceDependency => "each_resource_dependency",
            ErrorReasonCode::EachChildDependency => "each_child_dependency",
            ErrorReasonCode::SubFuncLinkArgResourceNotFound => {
                "sub_func_link_arg_resource_not_found"
            }
            ErrorReasonCode::MissingResources => "missing_resources",
        }
    }
}

impl fmt::Display for ErrorReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A structured, reason-coded validation failure. Child errors let a single
/// load error carry every problem found in one pass.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadError {
    pub reason_code: ErrorReasonCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DiagnosticRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_errors: Vec<LoadError>,
}

impl LoadError {
    pub fn new(reason_code: ErrorReasonCode, message: impl Into<String>) -> Self {
        Self {
            reason_code,
            message: message.into(),
            range: None,
            child_errors: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: Option<DiagnosticRange>) -> Self {
        self.range = range;
        self
    }

    pub fn with_children(mut self, child_errors: Vec<LoadError>) -> Self {
        self.child_errors = child_errors;
        self
    }

    /// Depth-first flattening of the error tree into its leaves, in the
    /// order the failures were recorded.
    pub fn leaf_errors(&self) -> Vec<&LoadError> {
        let mut leaves = Vec::new();
        collect_leaves(self, &mut leaves);
        leaves
    }

    /// Total number of errors in this tree, counting the root when it is a
    /// leaf.
    pub fn error_count(&self) -> usize {
        self.leaf_errors().len()
    }
}

fn collect_leaves<'a>(error: &'a LoadError, out: &mut Vec<&'a LoadError>) {
    if error.child_errors.is_empty() {
        out.push(error);
        return;
    }
    for child in &error.child_errors {
        collect_leaves(child, out);
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for child in &self.child_errors {
            write_child(f, child, 1)?;
        }
        Ok(())
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, error: &LoadError, depth: usize) -> fmt::Result {
    write!(f, "\n{}- {}", "  ".repeat(depth), error.message)?;
    for child in &error.child_errors {
        write_child(f, child, depth + 1)?;
    }
    Ok(())
}

impl std::error::Error for LoadError {}

/// Collapses a local error list: empty stays empty, a single error passes
/// through unchanged, and two or more wrap in a multi-error parent so the
/// caller sees every failure at once.
pub fn fold_errors(mut errors: Vec<LoadError>) -> Option<LoadError> {
    match errors.len() {
        0 => None,
        1 => errors.pop(),
        _ => Some(
            LoadError::new(
                ErrorReasonCode::MultipleValidationErrors,
                "validation failed due to multiple errors being encountered, \
                 see child errors for details",
            )
            .with_children(errors),
        ),
    }
}

/// Failure raised by a provider registry lookup. These are infrastructure
/// failures, not user errors, and abort the validation run.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry lookup failed: {0}")]
    Lookup(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal outcome of a validation run. Everything attributable to the
/// blueprint itself is reported through diagnostics and [`LoadError`]
/// instead.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("validation was cancelled")]
    Cancelled,
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
