//! The blueprint validator: element validation, substitution type-checking,
//! mapping-node walks, and the reference-graph post-pass.

pub(crate) mod datasource;
pub(crate) mod export;
pub(crate) mod include;
pub(crate) mod mapping;
pub(crate) mod postpass;
pub(crate) mod resource;
pub(crate) mod substitutions;
pub(crate) mod value;
pub(crate) mod variable;

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::context::CancelToken;
use crate::diagnostics::{Diagnostic, DiagnosticLevel, SuggestedAction};
use crate::errors::{ErrorReasonCode, LoadError, ValidateError, fold_errors};
use crate::refgraph::ReferenceChainCollector;
use crate::registry::{ChildExportResolver, DataSourceRegistry, FunctionRegistry, ResourceRegistry};
use crate::schema::Blueprint;
use crate::source::{SourceMeta, optional_range};

/// Blueprint versions this validator understands.
pub const SUPPORTED_VERSIONS: [&str; 2] = ["2023-04-20", "2025-05-12"];

/// The mapping-node walkers refuse to descend past this depth; deeper
/// content is skipped with an info diagnostic rather than failing.
pub const MAX_TRAVERSE_DEPTH: usize = 20;

/// Registries and the cancellation handle for a validation run. Registries
/// are read-only and may be shared across runs.
pub struct ValidateParams<'a> {
    pub functions: &'a dyn FunctionRegistry,
    pub resources: &'a dyn ResourceRegistry,
    pub data_sources: &'a dyn DataSourceRegistry,
    /// Optional capability to resolve exports of child blueprints.
    pub child_exports: Option<&'a dyn ChildExportResolver>,
    pub cancel: CancelToken,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub enum ValidationStatus {
    Pass,
    Fail,
}

/// Outcome of a validation run: the full diagnostic list plus the folded
/// error tree, and the reference-chain graph for callers that want to
/// inspect recorded edges.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<LoadError>,
    #[serde(skip)]
    pub reference_chains: ReferenceChainCollector,
}

/// Identity of the element currently being validated, used for
/// self-reference checks and reference-graph edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementRef<'a> {
    Resource(&'a str),
    DataSource(&'a str),
    Variable(&'a str),
    Value(&'a str),
    Child(&'a str),
    Export(&'a str),
}

impl ElementRef<'_> {
    /// Composite id used in the reference graph, e.g. `resources.orderApi`.
    pub(crate) fn element_id(&self) -> String {
        match self {
            ElementRef::Resource(name) => format!("resources.{name}"),
            ElementRef::DataSource(name) => format!("datasources.{name}"),
            ElementRef::Variable(name) => format!("variables.{name}"),
            ElementRef::Value(name) => format!("values.{name}"),
            ElementRef::Child(name) => format!("children.{name}"),
            ElementRef::Export(name) => format!("exports.{name}"),
        }
    }
}

impl fmt::Display for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_id())
    }
}

/// Everything sub-validators need to resolve references: the blueprint, the
/// registries, and the element being validated.
pub(crate) struct ElementScope<'a> {
    pub blueprint: &'a Blueprint,
    pub params: &'a ValidateParams<'a>,
    pub element: ElementRef<'a>,
}

/// Validates a parsed blueprint against the supplied registries, producing
/// a report with every diagnostic and failure found in one pass.
///
/// Only cancellation and registry failures abort the run; anything
/// attributable to the blueprint accumulates into the report.
pub fn validate_blueprint(
    blueprint: &Blueprint,
    params: &ValidateParams<'_>,
) -> Result<ValidationReport, ValidateError> {
    let cancel = &params.cancel;
    let mut diagnostics = Vec::new();
    let mut errors: Vec<LoadError> = Vec::new();
    let mut collector = ReferenceChainCollector::new();

    cancel.check()?;
    validate_version(blueprint, &mut errors);
    validate_transforms(blueprint, &mut diagnostics);

    if blueprint.resources.is_empty() && blueprint.includes.is_empty() {
        errors.push(LoadError::new(
            ErrorReasonCode::MissingResources,
            "validation failed due to an empty blueprint, at least one resource or include \
             must be declared",
        ));
    }

    for (name, var) in blueprint.variables.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::Variable(name),
        };
        let mut element_errors = Vec::new();
        variable::validate_variable(
            name,
            var,
            blueprint.variables.meta(name),
            &scope,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    for (name, val) in blueprint.values.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::Value(name),
        };
        let mut element_errors = Vec::new();
        value::validate_value(
            name,
            val,
            blueprint.values.meta(name),
            &scope,
            &mut collector,
            &mut diagnostics,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    for (name, inc) in blueprint.includes.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::Child(name),
        };
        let mut element_errors = Vec::new();
        include::validate_include(
            name,
            inc,
            blueprint.includes.meta(name),
            &scope,
            &mut collector,
            &mut diagnostics,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    for (name, exp) in blueprint.exports.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::Export(name),
        };
        let mut element_errors = Vec::new();
        export::validate_export(
            name,
            exp,
            blueprint.exports.meta(name),
            &scope,
            &mut collector,
            &mut diagnostics,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    for (name, ds) in blueprint.data_sources.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::DataSource(name),
        };
        let mut element_errors = Vec::new();
        datasource::validate_data_source(
            name,
            ds,
            blueprint.data_sources.meta(name),
            &scope,
            &mut collector,
            &mut diagnostics,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    for (name, res) in blueprint.resources.iter() {
        cancel.check()?;
        let scope = ElementScope {
            blueprint,
            params,
            element: ElementRef::Resource(name),
        };
        let mut element_errors = Vec::new();
        resource::validate_resource(
            name,
            res,
            blueprint.resources.meta(name),
            &scope,
            &mut collector,
            &mut diagnostics,
            &mut element_errors,
        )?;
        if let Some(folded) = fold_errors(element_errors) {
            errors.push(folded);
        }
    }

    cancel.check()?;
    postpass::check_cycles(&collector, &mut errors);
    postpass::check_each_dependencies(blueprint, &collector, &mut errors);

    let error = fold_errors(errors);
    let failed = error.is_some()
        || diagnostics
            .iter()
            .any(|diagnostic| diagnostic.level == DiagnosticLevel::Error);

    Ok(ValidationReport {
        status: if failed {
            ValidationStatus::Fail
        } else {
            ValidationStatus::Pass
        },
        diagnostics,
        error,
        reference_chains: collector,
    })
}

fn validate_version(blueprint: &Blueprint, errors: &mut Vec<LoadError>) {
    match &blueprint.version {
        None => errors.push(LoadError::new(
            ErrorReasonCode::MissingVersion,
            "validation failed due to a missing version, a version must be provided \
             in the blueprint",
        )),
        Some(scalar) => match scalar.as_str() {
            None => errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVersion,
                    "validation failed due to a version that is not a string being provided",
                )
                .with_range(optional_range(&scalar.source_meta)),
            ),
            Some(version) if !SUPPORTED_VERSIONS.contains(&version) => errors.push(
                LoadError::new(
                    ErrorReasonCode::InvalidVersion,
                    format!(
                        "validation failed due to an unsupported version \"{version}\" being \
                         provided, the following versions are supported: {}",
                        SUPPORTED_VERSIONS.join(", ")
                    ),
                )
                .with_range(optional_range(&scalar.source_meta)),
            ),
            Some(_) => {}
        },
    }
}

fn validate_transforms(blueprint: &Blueprint, diagnostics: &mut Vec<Diagnostic>) {
    let Some(transform) = &blueprint.transform else {
        return;
    };
    for (index, value) in transform.values.iter().enumerate() {
        if has_substitution_token(value) {
            diagnostics.push(
                Diagnostic::error(
                    "${..} substitutions can not be used in a transform.",
                    transform.meta(index).map(SourceMeta::range),
                )
                .with_action(SuggestedAction {
                    title: "Use a static transform name".into(),
                    description: Some(
                        "Transforms are resolved before substitutions, so the transform \
                         list must contain fixed names."
                            .into(),
                    ),
                }),
            );
        }
    }
}

/// True when `value` contains a `${..}` substitution token.
pub(crate) fn has_substitution_token(value: &str) -> bool {
    static SUB_TOKEN: OnceLock<Regex> = OnceLock::new();
    let re = SUB_TOKEN.get_or_init(|| Regex::new(r"\$\{[^}]*\}").expect("invalid regex"));
    re.is_match(value)
}

/// Shared element-name rule: names come from the document author and must
/// not contain substitution tokens. The reason code varies per element kind
/// (includes reuse the resource code).
pub(crate) fn validate_element_name(
    name: &str,
    kind_label: &str,
    reason_code: ErrorReasonCode,
    meta: Option<&SourceMeta>,
    errors: &mut Vec<LoadError>,
) {
    if has_substitution_token(name) {
        errors.push(
            LoadError::new(
                reason_code,
                format!(
                    "validation failed due to an invalid name \"{name}\" being used for a \
                     {kind_label}, element names can not contain substitutions"
                ),
            )
            .with_range(meta.map(SourceMeta::range)),
        );
    }
}
