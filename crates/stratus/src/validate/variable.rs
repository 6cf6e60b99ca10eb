//! Variable validation: declared types, defaults, allowed values, and
//! provider-defined custom variable types.

use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::schema::{ScalarKind, ScalarValue, Variable, VariableType};
use crate::source::{DiagnosticRange, SourceMeta, optional_range};
use crate::validate::{ElementScope, validate_element_name};

pub(crate) fn validate_variable(
    name: &str,
    variable: &Variable,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    validate_element_name(name, "variable", ErrorReasonCode::InvalidVariable, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    match variable.var_type.custom_type() {
        Some(custom_type) => {
            validate_custom_variable(name, variable, custom_type, element_range, scope, errors)?;
        }
        None => validate_core_variable(name, variable, element_range, errors),
    }
    Ok(())
}

fn validate_core_variable(
    name: &str,
    variable: &Variable,
    element_range: Option<DiagnosticRange>,
    errors: &mut Vec<LoadError>,
) {
    // Core variable types always have a scalar kind.
    let Some(expected) = variable.var_type.scalar_kind() else {
        return;
    };

    if let Some(allowed) = &variable.allowed_values {
        if variable.var_type == VariableType::Boolean {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVariable,
                    format!(
                        "validation failed due to an allowed values list being provided for \
                         boolean variable \"{name}\", allowed values are not supported for \
                         booleans"
                    ),
                )
                .with_range(element_range),
            );
        } else if allowed.is_empty() {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVariable,
                    format!(
                        "validation failed due to an empty allowed values list being provided \
                         for variable \"{name}\""
                    ),
                )
                .with_range(element_range),
            );
        } else {
            for entry in allowed {
                if entry.kind() != expected {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidVariable,
                            format!(
                                "validation failed due to an invalid allowed value being \
                                 provided for variable \"{name}\", expected \"{expected}\" \
                                 but found \"{}\"",
                                entry.kind()
                            ),
                        )
                        .with_range(optional_range(&entry.source_meta).or(element_range)),
                    );
                }
            }
        }
    }

    if let Some(default) = &variable.default {
        let default_range = optional_range(&default.source_meta).or(element_range);
        if default.kind() != expected {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVariable,
                    format!(
                        "validation failed due to an invalid default value being provided for \
                         variable \"{name}\", expected \"{expected}\" but found \"{}\"",
                        default.kind()
                    ),
                )
                .with_range(default_range),
            );
        } else if let Some(allowed) = &variable.allowed_values {
            if !allowed.is_empty() && !contains_scalar(allowed, default) {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidVariable,
                        format!(
                            "validation failed due to the default value \"{}\" for variable \
                             \"{name}\" not being in the allowed values list",
                            default.value
                        ),
                    )
                    .with_range(default_range),
                );
            }
        }
    }
}

/// Custom variable types are backed by provider options: the options must
/// be homogeneous scalars, and any allowed values or default must be drawn
/// from them.
fn validate_custom_variable(
    name: &str,
    variable: &Variable,
    custom_type: &str,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let options = scope
        .params
        .resources
        .custom_variable_type_options(&scope.params.cancel, custom_type)?;
    let Some(options) = options else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidVariable,
                format!(
                    "validation failed due to the custom variable type \"{custom_type}\" used \
                     by variable \"{name}\" not being provided by any of the loaded providers"
                ),
            )
            .with_range(element_range),
        );
        return Ok(());
    };

    let mut kinds: Vec<ScalarKind> = Vec::new();
    for option in options.values() {
        if !kinds.contains(&option.kind()) {
            kinds.push(option.kind());
        }
    }
    if kinds.len() > 1 {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidVariable,
                format!(
                    "validation failed due to the options of custom variable type \
                     \"{custom_type}\" not all being of the same scalar type"
                ),
            )
            .with_range(element_range),
        );
        return Ok(());
    }

    let option_values: Vec<&ScalarValue> = options.values().collect();

    if let Some(allowed) = &variable.allowed_values {
        if allowed.is_empty() {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVariable,
                    format!(
                        "validation failed due to an empty allowed values list being provided \
                         for variable \"{name}\""
                    ),
                )
                .with_range(element_range),
            );
        }
        for entry in allowed {
            if !option_values.iter().any(|option| option.value == entry.value) {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidVariable,
                        format!(
                            "validation failed due to the allowed value \"{}\" for variable \
                             \"{name}\" not being an option of custom type \"{custom_type}\"",
                            entry.value
                        ),
                    )
                    .with_range(optional_range(&entry.source_meta).or(element_range)),
                );
            }
        }
    }

    if let Some(default) = &variable.default {
        let default_range = optional_range(&default.source_meta).or(element_range);
        if !option_values.iter().any(|option| option.value == default.value) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVariable,
                    format!(
                        "validation failed due to the default value \"{}\" for variable \
                         \"{name}\" not being an option of custom type \"{custom_type}\"",
                        default.value
                    ),
                )
                .with_range(default_range),
            );
        } else if let Some(allowed) = &variable.allowed_values {
            if !allowed.is_empty() && !contains_scalar(allowed, default) {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidVariable,
                        format!(
                            "validation failed due to the default value \"{}\" for variable \
                             \"{name}\" not being in the allowed values list",
                            default.value
                        ),
                    )
                    .with_range(default_range),
                );
            }
        }
    }

    Ok(())
}

fn contains_scalar(list: &[ScalarValue], candidate: &ScalarValue) -> bool {
    list.iter().any(|entry| entry.value == candidate.value)
}
