//! Semantic validation for Stratus deployment blueprints.
//!
//! A blueprint arrives as a parsed schema tree ([`schema::Blueprint`]) with
//! source positions attached by the surface-syntax front-end. The validator
//! checks every element against the provider registries, type-infers every
//! `${..}` substitution expression, walks free-form mapping nodes against
//! provider schemas, and records a reference-chain graph that a post-pass
//! checks for cycles and illegal `each` dependencies. Everything wrong with
//! a blueprint is reported in one pass through diagnostics and a reason-
//! coded error tree.

pub mod context;
pub mod diagnostics;
pub mod errors;
pub mod refgraph;
pub mod registry;
pub mod schema;
pub mod source;
pub mod validate;

pub use context::CancelToken;
pub use diagnostics::{Diagnostic, DiagnosticLevel, SuggestedAction, load_error_diagnostics};
pub use errors::{ErrorReasonCode, LoadError, RegistryError, ValidateError, fold_errors};
pub use refgraph::{ElementKind, ReferenceChainCollector, ReferenceChainNode};
pub use registry::{
    ChildExportError, ChildExportInfo, ChildExportResolver, DataSourceFieldDefinition,
    DataSourceRegistry, DataSourceTypeDefinition, FieldSchema, FilterFieldConflict,
    FilterOperator, FunctionDefinition, FunctionParameter, FunctionRegistry,
    InMemoryDataSourceRegistry, InMemoryFunctionRegistry, InMemoryResourceRegistry,
    ResolvedType, ResourceRegistry, ResourceSpecDefinition, SUPPORTED_FILTER_OPERATORS,
};
pub use schema::Blueprint;
pub use source::{DiagnosticRange, SourceMeta, SourcePoint};
pub use validate::{
    MAX_TRAVERSE_DEPTH, SUPPORTED_VERSIONS, ValidateParams, ValidationReport, ValidationStatus,
    validate_blueprint,
};
