//! Post-pass checks over the reference graph: cycle detection and the
//! `each` dependency restriction.

use std::collections::{BTreeSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::errors::{ErrorReasonCode, LoadError};
use crate::refgraph::{ElementKind, ReferenceChainCollector, sub_ref_prop_tag};
use crate::schema::Blueprint;

/// Finds every strongly connected component with a cycle and reports it
/// once, seeded with the component's lexicographically smallest member.
pub(crate) fn check_cycles(collector: &ReferenceChainCollector, errors: &mut Vec<LoadError>) {
    if collector.is_empty() {
        return;
    }

    let mut graph = DiGraph::<usize, ()>::with_capacity(collector.len(), collector.len());
    let node_indices: Vec<_> = (0..collector.len()).map(|idx| graph.add_node(idx)).collect();
    for (idx, node) in collector.nodes().iter().enumerate() {
        for &target in &node.references {
            graph.add_edge(node_indices[idx], node_indices[target], ());
        }
    }

    let mut seeds: Vec<&str> = Vec::new();
    for component in tarjan_scc(&graph) {
        let cyclic = component.len() > 1
            || (component.len() == 1 && graph.contains_edge(component[0], component[0]));
        if !cyclic {
            continue;
        }
        let seed = component
            .iter()
            .map(|&ix| collector.node(graph[ix]).element_name.as_str())
            .min()
            .unwrap_or_default();
        seeds.push(seed);
    }

    seeds.sort_unstable();
    for seed in seeds {
        errors.push(LoadError::new(
            ErrorReasonCode::ReferenceCycle,
            format!(
                "validation failed due to a reference cycle involving \"{seed}\", references \
                 between elements must not form cycles"
            ),
        ));
    }
}

/// For every resource template, walks the transitive reference closure of
/// the elements its `each` expression references; resources and child
/// blueprints must not appear anywhere in that closure.
pub(crate) fn check_each_dependencies(
    blueprint: &Blueprint,
    collector: &ReferenceChainCollector,
    errors: &mut Vec<LoadError>,
) {
    for (name, resource) in blueprint.resources.iter() {
        if resource.each.is_none() {
            continue;
        }
        let user = format!("resources.{name}");
        let tag = sub_ref_prop_tag(&user, "each");

        let mut queue: VecDeque<usize> = collector.find_by_tag(&tag).into_iter().collect();
        let mut visited: BTreeSet<usize> = BTreeSet::new();

        while let Some(idx) = queue.pop_front() {
            if !visited.insert(idx) {
                continue;
            }
            let node = collector.node(idx);
            let bare_name = node
                .element_name
                .split_once('.')
                .map(|(_, rest)| rest)
                .unwrap_or(node.element_name.as_str());
            match node.kind {
                ElementKind::Resource => errors.push(LoadError::new(
                    ErrorReasonCode::EachResourceDependency,
                    format!(
                        "validation failed due to the \"each\" property of resource \
                         \"{name}\" having a dependency on resource \"{bare_name}\", \
                         resources can not be referenced from an \"each\" substitution"
                    ),
                )),
                ElementKind::Child => errors.push(LoadError::new(
                    ErrorReasonCode::EachChildDependency,
                    format!(
                        "validation failed due to the \"each\" property of resource \
                         \"{name}\" having a dependency on child blueprint \"{bare_name}\", \
                         child blueprints can not be referenced from an \"each\" substitution"
                    ),
                )),
                _ => {}
            }
            for &reference in &node.references {
                queue.push_back(reference);
            }
        }
    }
}
