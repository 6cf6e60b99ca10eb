//! Export validation: declared type, field path parsing, and resolving the
//! field through the substitution validator.

use std::sync::OnceLock;

use regex::Regex;

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::ReferenceChainCollector;
use crate::registry::ResolvedType;
use crate::schema::{
    ChildReference, DataSourceReference, Export, ExportType, PathSegment, ResourceReference,
    Substitution, ValueReference, VariableReference,
};
use crate::source::{SourceMeta, optional_range};
use crate::validate::substitutions::{SubUsage, validate_string_field, validate_substitution};
use crate::validate::{ElementScope, validate_element_name};

pub(crate) fn validate_export(
    name: &str,
    export: &Export,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    validate_element_name(name, "export", ErrorReasonCode::InvalidExport, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    let declared = match &export.export_type {
        None => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidExport,
                    format!(
                        "validation failed due to a missing type for export \"{name}\", a \
                         type must be provided"
                    ),
                )
                .with_range(element_range),
            );
            None
        }
        Some(scalar) => match scalar.as_str() {
            None => {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidExport,
                        format!(
                            "validation failed due to a type that is not a string being \
                             provided for export \"{name}\""
                        ),
                    )
                    .with_range(optional_range(&scalar.source_meta).or(element_range)),
                );
                None
            }
            Some(raw) => match ExportType::parse(raw) {
                Some(export_type) => Some(export_type),
                None => {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidExport,
                            format!(
                                "validation failed due to an unsupported export type \
                                 \"{raw}\" being provided for export \"{name}\", the \
                                 following export types are supported: {}",
                                ExportType::supported_list()
                            ),
                        )
                        .with_range(optional_range(&scalar.source_meta).or(element_range)),
                    );
                    None
                }
            },
        },
    };

    if let Some(description) = &export.description {
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

    let empty_field_error = |errors: &mut Vec<LoadError>| {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidExport,
                format!(
                    "validation failed due to an empty field string being provided for \
                     export \"{name}\""
                ),
            )
            .with_range(element_range),
        );
    };

    let Some(field) = &export.field else {
        empty_field_error(errors);
        return Ok(());
    };
    let field_range = optional_range(&field.source_meta).or(element_range);
    let Some(raw_field) = field.as_str() else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidExport,
                format!(
                    "validation failed due to a field that is not a string being provided \
                     for export \"{name}\""
                ),
            )
            .with_range(field_range),
        );
        return Ok(());
    };
    if raw_field.trim().is_empty() {
        empty_field_error(errors);
        return Ok(());
    }

    let reference = match parse_export_field(raw_field) {
        Ok(reference) => reference,
        Err(reason) => {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidReference,
                    format!(
                        "validation failed due to an invalid field \"{raw_field}\" being \
                         provided for export \"{name}\", {reason}"
                    ),
                )
                .with_range(field_range),
            );
            return Ok(());
        }
    };

    let resolved = validate_substitution(&reference, "", scope, collector, diagnostics, errors)?;
    if let (Some(resolved), Some(declared)) = (resolved, declared) {
        let expected: ResolvedType = declared.into();
        if resolved != expected && resolved != ResolvedType::Any {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidExport,
                    format!(
                        "validation failed due to the field of export \"{name}\" resolving \
                         to type \"{resolved}\" which does not match the declared type \
                         \"{declared}\""
                    ),
                )
                .with_range(field_range),
            );
        }
    }

    Ok(())
}

/// Parses an export field path such as `resources.orderApi.spec.endpoints[0]`
/// into the reference it stands for. This is a structural dotted path, not
/// the `${..}` substitution language.
fn parse_export_field(raw: &str) -> Result<Substitution, String> {
    let segments = parse_field_segments(raw)?;

    let mut iter = segments.into_iter();
    let Some(PathSegment::Field(kind)) = iter.next() else {
        return Err("the field must start with an element type".into());
    };

    let take_name = |segment: Option<PathSegment>| -> Result<String, String> {
        match segment {
            Some(PathSegment::Field(name)) => Ok(name),
            _ => Err("an element name must follow the element type".into()),
        }
    };

    match kind.as_str() {
        "resources" => {
            let name = take_name(iter.next())?;
            Ok(Substitution::Resource(ResourceReference {
                name,
                template_index: None,
                path: iter.collect(),
                source_meta: None,
            }))
        }
        "variables" => {
            let name = take_name(iter.next())?;
            if iter.next().is_some() {
                return Err("variable references can not have nested paths".into());
            }
            Ok(Substitution::Variable(VariableReference {
                name,
                source_meta: None,
            }))
        }
        "values" => {
            let name = take_name(iter.next())?;
            Ok(Substitution::Value(ValueReference {
                name,
                path: iter.collect(),
                source_meta: None,
            }))
        }
        "datasources" => {
            let name = take_name(iter.next())?;
            let field = take_name(iter.next())
                .map_err(|_| String::from("a data source reference must name an exported field"))?;
            let element_index = match iter.next() {
                None => None,
                Some(PathSegment::Index(index)) => Some(index),
                Some(PathSegment::Field(_)) => {
                    return Err(
                        "data source references must be of the form \
                         datasources.<name>.<field>"
                            .into(),
                    );
                }
            };
            if iter.next().is_some() {
                return Err(
                    "data source references must be of the form datasources.<name>.<field>"
                        .into(),
                );
            }
            Ok(Substitution::DataSource(DataSourceReference {
                name,
                field,
                element_index,
                source_meta: None,
            }))
        }
        "children" => {
            let name = take_name(iter.next())?;
            let export = take_name(iter.next())
                .map_err(|_| String::from("a child reference must name an export"))?;
            if iter.next().is_some() {
                return Err("child references can not have nested paths".into());
            }
            Ok(Substitution::Child(ChildReference {
                name,
                export,
                source_meta: None,
            }))
        }
        other => Err(format!("\"{other}\" is not a referenceable element type")),
    }
}

fn parse_field_segments(raw: &str) -> Result<Vec<PathSegment>, String> {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    let re = SEGMENT
        .get_or_init(|| Regex::new(r"^([A-Za-z0-9_-]+)((?:\[\d+\])*)$").expect("invalid regex"));

    let mut segments = Vec::new();
    for part in raw.split('.') {
        if part.is_empty() {
            return Err("the field contains an empty path segment".into());
        }
        let Some(captures) = re.captures(part) else {
            return Err(format!("\"{part}\" is not a valid path segment"));
        };
        segments.push(PathSegment::Field(captures[1].to_string()));
        let indices = &captures[2];
        if !indices.is_empty() {
            for index in indices
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split("][")
            {
                let parsed: i64 = index
                    .parse()
                    .map_err(|_| format!("\"{part}\" contains an invalid index"))?;
                segments.push(PathSegment::Index(parsed));
            }
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resource_field_with_indices() {
        let parsed = parse_export_field("resources.orderApi.spec.endpoints[0].host").unwrap();
        match parsed {
            Substitution::Resource(reference) => {
                assert_eq!(reference.name, "orderApi");
                assert_eq!(
                    reference.path,
                    vec![
                        PathSegment::Field("spec".into()),
                        PathSegment::Field("endpoints".into()),
                        PathSegment::Index(0),
                        PathSegment::Field("host".into()),
                    ]
                );
            }
            other => panic!("expected resource reference, got {other:?}"),
        }
    }

    #[test]
    fn parses_data_source_field_with_element_index() {
        let parsed = parse_export_field("datasources.network.subnets[2]").unwrap();
        match parsed {
            Substitution::DataSource(reference) => {
                assert_eq!(reference.name, "network");
                assert_eq!(reference.field, "subnets");
                assert_eq!(reference.element_index, Some(2));
            }
            other => panic!("expected data source reference, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_element_types_and_bad_segments() {
        assert!(parse_export_field("exports.other").is_err());
        assert!(parse_export_field("resources..spec").is_err());
        assert!(parse_export_field("variables.region.nested").is_err());
        assert!(parse_export_field("resources.a.spec.${x}").is_err());
    }
}
