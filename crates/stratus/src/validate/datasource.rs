//! Data source validation: type lookup, filters and operators, pairwise
//! filter conflicts, and exported field agreement with provider fields.

use std::collections::BTreeMap;

use crate::diagnostics::Diagnostic;
use crate::errors::{ErrorReasonCode, LoadError, ValidateError};
use crate::refgraph::ReferenceChainCollector;
use crate::registry::{DataSourceFieldDefinition, FilterOperator};
use crate::schema::{DataSource, DataSourceFieldType, DataSourceFilter};
use crate::source::{DiagnosticRange, SourceMeta, optional_range};
use crate::validate::mapping::validate_free_form;
use crate::validate::substitutions::{SubUsage, validate_string_field};
use crate::validate::{ElementScope, has_substitution_token, validate_element_name};

pub(crate) fn validate_data_source(
    name: &str,
    data_source: &DataSource,
    meta: Option<&SourceMeta>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    validate_element_name(name, "data source", ErrorReasonCode::InvalidDataSource, meta, errors);
    let element_range = meta.map(SourceMeta::range);

    let data_source_type =
        validate_data_source_type(name, data_source, element_range, scope, errors)?;

    // Field definitions drive the provider-dependent checks; when the type
    // is unknown only the structural rules run.
    let field_definitions = match &data_source_type {
        Some(type_name) => Some(
            scope
                .params
                .data_sources
                .field_definitions(&scope.params.cancel, type_name)?,
        ),
        None => None,
    };

    if let Some(description) = &data_source.description {
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

    validate_metadata(data_source, scope, collector, diagnostics, errors)?;
    validate_filters(
        name,
        data_source,
        data_source_type.as_deref(),
        field_definitions.as_ref(),
        element_range,
        scope,
        collector,
        diagnostics,
        errors,
    )?;
    validate_exports(
        name,
        data_source,
        data_source_type.as_deref(),
        field_definitions.as_ref(),
        element_range,
        scope,
        collector,
        diagnostics,
        errors,
    )?;

    if let Some(type_name) = &data_source_type {
        check_filter_conflicts(name, data_source, type_name, element_range, scope, errors)?;
    }

    Ok(())
}

fn validate_data_source_type(
    name: &str,
    data_source: &DataSource,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Result<Option<String>, ValidateError> {
    let Some(type_scalar) = &data_source.data_source_type else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to a missing type for data source \"{name}\", a \
                     type must be provided"
                ),
            )
            .with_range(element_range),
        );
        return Ok(None);
    };
    let type_range = optional_range(&type_scalar.source_meta).or(element_range);
    let Some(type_name) = type_scalar.as_str() else {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to a type that is not a string being provided for \
                     data source \"{name}\""
                ),
            )
            .with_range(type_range),
        );
        return Ok(None);
    };

    if !scope
        .params
        .data_sources
        .has_data_source_type(&scope.params.cancel, type_name)?
    {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to the data source type \"{type_name}\" not being \
                     supported by any of the loaded providers"
                ),
            )
            .with_range(type_range),
        );
        return Ok(None);
    }

    Ok(Some(type_name.to_string()))
}

fn validate_metadata(
    data_source: &DataSource,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let Some(metadata) = &data_source.metadata else {
        return Ok(());
    };
    if let Some(display_name) = &metadata.display_name {
        validate_string_field(
            display_name,
            SubUsage::DisplayName,
            "metadata.displayName",
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }
    for (key, value) in metadata.annotations.iter() {
        validate_string_field(
            value,
            SubUsage::Annotation,
            &format!("metadata.annotations.{key}"),
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }
    if let Some(custom) = &metadata.custom {
        validate_free_form(custom, "metadata.custom", 0, scope, collector, diagnostics, errors)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_filters(
    name: &str,
    data_source: &DataSource,
    data_source_type: Option<&str>,
    field_definitions: Option<&BTreeMap<String, DataSourceFieldDefinition>>,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let filters = data_source
        .filter
        .as_ref()
        .map(|filter| filter.filters.as_slice())
        .unwrap_or_default();
    if filters.is_empty() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to a missing filter in data source \"{name}\", at \
                     least one filter must be provided"
                ),
            )
            .with_range(element_range),
        );
        return Ok(());
    }

    for (index, filter) in filters.iter().enumerate() {
        validate_filter(
            name,
            filter,
            index,
            data_source_type,
            field_definitions,
            element_range,
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_filter(
    name: &str,
    filter: &DataSourceFilter,
    index: usize,
    data_source_type: Option<&str>,
    field_definitions: Option<&BTreeMap<String, DataSourceFieldDefinition>>,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let filter_range = optional_range(&filter.source_meta).or(element_range);

    let field_name = filter.field.as_ref().and_then(|field| field.as_str());
    match field_name {
        None => errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to a missing field in a filter of data source \
                     \"{name}\", every filter must name a field"
                ),
            )
            .with_range(filter_range),
        ),
        Some(field) => {
            if let (Some(definitions), Some(type_name)) = (field_definitions, data_source_type) {
                if !definitions.contains_key(field) {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidDataSource,
                            format!(
                                "validation failed due to filter field \"{field}\" not being \
                                 a filterable field of data source type \"{type_name}\""
                            ),
                        )
                        .with_range(filter_range),
                    );
                }
            }
        }
    }

    if let Some(operator_scalar) = &filter.operator {
        let operator_range = optional_range(&operator_scalar.source_meta).or(filter_range);
        match operator_scalar.as_str().and_then(FilterOperator::parse) {
            None => errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidDataSourceFilterOperator,
                    format!(
                        "validation failed due to an invalid filter operator \"{}\" being \
                         provided in data source \"{name}\", the following operators are \
                         supported: {}",
                        operator_scalar.value,
                        FilterOperator::supported_list()
                    ),
                )
                .with_range(operator_range),
            ),
            Some(operator) => {
                let field_definition = field_name
                    .and_then(|field| field_definitions.and_then(|defs| defs.get(field)));
                if let (Some(definition), Some(type_name)) = (field_definition, data_source_type) {
                    if !definition.supported_operators.contains(&operator) {
                        errors.push(
                            LoadError::new(
                                ErrorReasonCode::UnsupportedDataSourceFilterOperator,
                                format!(
                                    "validation failed due to the filter operator \
                                     \"{operator}\" not being supported for field \"{}\" of \
                                     data source type \"{type_name}\"",
                                    field_name.unwrap_or_default()
                                ),
                            )
                            .with_range(operator_range),
                        );
                    }
                }
            }
        }
    }

    let search_values = filter
        .search
        .as_ref()
        .map(|search| search.values.as_slice())
        .unwrap_or_default();
    if search_values.is_empty() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to a filter of data source \"{name}\" not \
                     providing any search values, at least one search value must be provided"
                ),
            )
            .with_range(filter_range),
        );
    }
    for (value_index, value) in search_values.iter().enumerate() {
        validate_string_field(
            value,
            SubUsage::General,
            &format!("filter[{index}].search[{value_index}]"),
            scope,
            collector,
            diagnostics,
            errors,
        )?;
    }

    Ok(())
}

fn check_filter_conflicts(
    name: &str,
    data_source: &DataSource,
    data_source_type: &str,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    let conflicts = scope
        .params
        .data_sources
        .filter_field_conflicts(&scope.params.cancel, data_source_type)?;
    if conflicts.is_empty() {
        return Ok(());
    }

    let filter_fields: Vec<&str> = data_source
        .filter
        .iter()
        .flat_map(|filter| filter.filters.iter())
        .filter_map(|filter| filter.field.as_ref().and_then(|field| field.as_str()))
        .collect();

    for conflict in conflicts {
        if filter_fields.contains(&conflict.field_a.as_str())
            && filter_fields.contains(&conflict.field_b.as_str())
        {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::DataSourceFilterConflict,
                    format!(
                        "validation failed due to the conflicting filter fields \"{}\" and \
                         \"{}\" being used together in data source \"{name}\"",
                        conflict.field_a, conflict.field_b
                    ),
                )
                .with_range(element_range),
            );
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn validate_exports(
    name: &str,
    data_source: &DataSource,
    data_source_type: Option<&str>,
    field_definitions: Option<&BTreeMap<String, DataSourceFieldDefinition>>,
    element_range: Option<DiagnosticRange>,
    scope: &ElementScope<'_>,
    collector: &mut ReferenceChainCollector,
    diagnostics: &mut Vec<Diagnostic>,
    errors: &mut Vec<LoadError>,
) -> Result<(), ValidateError> {
    if data_source.exports.is_empty() {
        errors.push(
            LoadError::new(
                ErrorReasonCode::InvalidDataSource,
                format!(
                    "validation failed due to data source \"{name}\" not exporting any \
                     fields, at least one field must be exported"
                ),
            )
            .with_range(element_range),
        );
        return Ok(());
    }

    for (alias, export) in data_source.exports.iter() {
        let export_range = data_source
            .exports
            .meta(alias)
            .map(SourceMeta::range)
            .or(element_range);

        if has_substitution_token(alias) {
            errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidDataSource,
                    format!(
                        "validation failed due to a substitution being used in the exported \
                         field name \"{alias}\" of data source \"{name}\""
                    ),
                )
                .with_range(export_range),
            );
            continue;
        }

        let declared = match &export.export_type {
            None => {
                errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidDataSourceFieldType,
                        format!(
                            "validation failed due to a missing type for exported field \
                             \"{alias}\" of data source \"{name}\""
                        ),
                    )
                    .with_range(export_range),
                );
                None
            }
            Some(scalar) => {
                let parsed = scalar.as_str().and_then(DataSourceFieldType::parse);
                if parsed.is_none() {
                    errors.push(
                        LoadError::new(
                            ErrorReasonCode::InvalidDataSourceFieldType,
                            format!(
                                "validation failed due to an invalid type \"{}\" being \
                                 provided for exported field \"{alias}\" of data source \
                                 \"{name}\", the following types are supported: string, \
                                 integer, float, boolean, array",
                                scalar.value
                            ),
                        )
                        .with_range(optional_range(&scalar.source_meta).or(export_range)),
                    );
                }
                parsed
            }
        };

        let source_field = export.source_field(alias);
        if let (Some(definitions), Some(type_name)) = (field_definitions, data_source_type) {
            match definitions.get(source_field) {
                None => errors.push(
                    LoadError::new(
                        ErrorReasonCode::InvalidDataSource,
                        format!(
                            "validation failed due to exported field \"{alias}\" referencing \
                             \"{source_field}\" which is not a field of data source type \
                             \"{type_name}\""
                        ),
                    )
                    .with_range(export_range),
                ),
                Some(definition) => {
                    if let Some(declared) = declared {
                        if definition.field_type != declared {
                            errors.push(
                                LoadError::new(
                                    ErrorReasonCode::InvalidDataSourceFieldType,
                                    format!(
                                        "validation failed due to exported field \"{alias}\" \
                                         being declared as \"{declared}\" but field \
                                         \"{source_field}\" of data source type \
                                         \"{type_name}\" is of type \"{}\"",
                                        definition.field_type
                                    ),
                                )
                                .with_range(export_range),
                            );
                        }
                    }
                }
            }
        }

        if let Some(description) = &export.description {
            validate_string_field(
                description,
                SubUsage::Description,
                &format!("exports.{alias}.description"),
                scope,
                collector,
                diagnostics,
                errors,
            )?;
        }
    }

    Ok(())
}
