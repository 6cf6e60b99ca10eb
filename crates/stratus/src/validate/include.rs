//! Include validation: non-empty path, primitive path substitutions, and
//! free-form walks over the child blueprint's variables and metadata.

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::ReferenceChainCollector;
use crate::schema::Include;
use crate::source::{SourceMeta, optional_range};
use crate::validate::mapping::validate_free_form;
use crate::validate::substitutions::{SubUsage, validate_string_field};
use crate::validate::{ElementScope, validate_element_name};

pub(crate) fn validate_include(
    name: &str,
    include: &Include,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    // Include name failures carry the resource reason code.
    validate_element_name(name, "include", ErrorReasonCode::InvalidResource, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    match &include.path {
        None => errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidInclude,
                format!("validation failed due to an empty path being provided for include \"{name}\""),
            )
            .with_range(element_range),
        ),
        Some(path) => {
            let empty_literal = path.literal_text().is_some_and(|text| text.trim().is_empty());
            if path.is_empty() || empty_literal {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidInclude,
                        format!(
                            "validation failed due to an empty path being provided for \
                             include \"{name}\""
                        ),
                    )
                    .with_range(optional_range(&path.source_meta).or(element_range)),
                );
            } else {
                validate_string_field(
                    path,
                    SubUsage::IncludePath,
                    "path",
                    scope,
                    collector,
                    diagnostics,
                    errors,
                )?;
            }
        }
    }

    if let Some(variables) = &include.variables {
        validate_free_form(variables, "variables", 0, scope, collector, diagnostics, errors)?;
    }
    if let Some(metadata) = &include.metadata {
        validate_free_form(metadata, "metadata", 0, scope, collector, diagnostics, errors)?;
    }
    if let Some(description) = &include.description {
        validate_string_field(
            description,
            SubUsage::Description,
            "description",
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    Ok(())
}
