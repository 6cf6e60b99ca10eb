use serde::Deserialize;
use stratus::{InMemoryDataSourceRegistry, InMemoryFunctionRegistry, InMemoryResourceRegistry};

/// A provider catalog document: the serde form of the in-memory registries
/// the validator resolves type information against. Any section may be
/// omitted, leaving that registry empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderCatalog {
    pub functions: InMemoryFunctionRegistry,
    pub resources: InMemoryResourceRegistry,
    pub data_sources: InMemoryDataSourceRegistry,
}
