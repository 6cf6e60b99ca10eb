//! Mutable graph of named blueprint elements with tagged edges.
//!
//! One collector is created per validation run, mutated while element
//! validators record symbolic references, then consumed by the post-pass
//! cycle and `each` dependency checks. Nodes are owned by the collector and
//! edges address nodes by index, so back-references never form ownership
//! cycles.

use std::collections::HashMap;

/// Kind of element a chain node stands for, derived from the composite
/// element name prefix (`resources.x`, `datasources.y`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Resource,
    DataSource,
    Variable,
    Value,
    Child,
    Unknown,
}

impl ElementKind {
    pub fn from_element_name(name: &str) -> Self {
        match name.split_once('.').map(|(prefix, _)| prefix) {
            Some("resources") => ElementKind::Resource,
            Some("datasources") => ElementKind::DataSource,
            Some("variables") => ElementKind::Variable,
            Some("values") => ElementKind::Value,
            Some("children") => ElementKind::Child,
            _ => ElementKind::Unknown,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReferenceChainNode {
    /// Composite id, e.g. `resources.orderApi`.
    pub element_name: String,
    pub kind: ElementKind,
    /// Indices of nodes this element references.
    pub references: Vec<usize>,
    /// Indices of nodes that reference this element.
    pub referenced_by: Vec<usize>,
    /// Edge tags accumulated across collect calls, deduplicated.
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ReferenceChainCollector {
    nodes: Vec<ReferenceChainNode>,
    index: HashMap<String, usize>,
}

impl ReferenceChainCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotently registers `element_name` (creating a node on first
    /// sight) and, when `referenced_by` is present, the edge from the
    /// referencing element, creating a placeholder node for it if it has
    /// not been tracked yet. Tags are appended to the referenced node,
    /// deduplicated.
    pub fn collect(&mut self, element_name: &str, referenced_by: Option<&str>, tags: &[String]) {
        let target = self.ensure_node(element_name);

        for tag in tags {
            if !self.nodes[target].tags.iter().any(|existing| existing == tag) {
                self.nodes[target].tags.push(tag.clone());
            }
        }

        if let Some(user) = referenced_by {
            let source = self.ensure_node(user);
            if !self.nodes[source].references.contains(&target) {
                self.nodes[source].references.push(target);
            }
            if !self.nodes[target].referenced_by.contains(&source) {
                self.nodes[target].referenced_by.push(source);
            }
        }
    }

    fn ensure_node(&mut self, element_name: &str) -> usize {
        if let Some(&idx) = self.index.get(element_name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(ReferenceChainNode {
            element_name: element_name.to_string(),
            kind: ElementKind::from_element_name(element_name),
            references: Vec::new(),
            referenced_by: Vec::new(),
            tags: Vec::new(),
        });
        self.index.insert(element_name.to_string(), idx);
        idx
    }

    /// All nodes carrying `tag`, in insertion order.
    pub fn find_by_tag(&self, tag: &str) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.tags.iter().any(|existing| existing == tag))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Nodes with no predecessors, used as cycle-reporting seeds.
    pub fn roots(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.referenced_by.is_empty())
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn node(&self, idx: usize) -> &ReferenceChainNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[ReferenceChainNode] {
        &self.nodes
    }

    pub fn lookup(&self, element_name: &str) -> Option<usize> {
        self.index.get(element_name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Tag for a plain substitution reference from `user`: `subRef:<user>`.
pub fn sub_ref_tag(user: &str) -> String {
    format!("subRef:{user}")
}

/// Tag for a substitution reference recorded inside a named property of
/// `user`: `subRefProp:<user>:<property-path>`.
pub fn sub_ref_prop_tag(user: &str, property_path: &str) -> String {
    format!("subRefProp:{user}:{property_path}")
}

/// Tag for a `dependsOn` edge: `dependencyOf:<user>`.
pub fn dependency_tag(user: &str) -> String {
    format!("dependencyOf:{user}")
}

/// Tag for a link-selector edge: `link:<user>`.
pub fn link_tag(user: &str) -> String {
    format!("link:{user}")
}
