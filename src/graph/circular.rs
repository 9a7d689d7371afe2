//! Circular Reference Detection
//!
//! Each schema component is checked on its own: a depth-first walk from the
//! component keeps the current path on a stack, and reaching a name that is
//! already on the stack records that name plus everything above it. A
//! component only keeps the recorded set when it is itself part of a cycle,
//! so a component that merely points into a cycle stays unmarked.
//!
//! This is the only pass that writes `metadata.circularReferences`.

use indexmap::IndexSet;
use std::collections::HashSet;
use tracing::debug;

use super::{DependencyGraph, SchemaName};
use crate::ir::{schema_name_of, schema_ref, Document, SchemaNode};

/// Cycle members reachable from `root`, or an empty set when `root` is not on
/// any cycle
pub fn cycle_members(graph: &DependencyGraph, root: &str) -> IndexSet<SchemaName> {
    let mut path_stack = IndexSet::new();
    let mut visited = HashSet::new();
    let mut found = IndexSet::new();
    walk(graph, root, &mut path_stack, &mut visited, &mut found);

    if found.contains(root) {
        found
    } else {
        IndexSet::new()
    }
}

fn walk(
    graph: &DependencyGraph,
    name: &str,
    path_stack: &mut IndexSet<SchemaName>,
    visited: &mut HashSet<SchemaName>,
    found: &mut IndexSet<SchemaName>,
) {
    if let Some(pos) = path_stack.get_index_of(name) {
        for member in path_stack.iter().skip(pos) {
            found.insert(member.clone());
        }
        return;
    }
    if !visited.insert(name.to_string()) {
        return;
    }

    path_stack.insert(name.to_string());
    for dep in graph.dependencies(name) {
        walk(graph, dep, path_stack, visited, found);
    }
    path_stack.pop();
}

/// Annotate every schema component and return the names of the circular
/// ones in declaration order. Earlier annotations are cleared first.
pub fn annotate(doc: &mut Document, graph: &DependencyGraph) -> Vec<SchemaName> {
    let mut circular = Vec::new();

    for (name, schema) in doc.schemas_mut() {
        clear(schema);

        let members = cycle_members(graph, name);
        if members.is_empty() {
            continue;
        }

        debug!(schema = %name, members = ?members, "Circular schema");
        schema.metadata.circular_references = members.iter().map(|m| schema_ref(m)).collect();
        mark_inner_references(schema, &members, true);
        circular.push(name.to_string());
    }

    circular
}

fn clear(node: &mut SchemaNode) {
    node.metadata.circular_references.clear();
    for child in node.children_mut() {
        clear(child);
    }
}

/// `$ref` nodes below the root whose target is a cycle member get `[target]`
fn mark_inner_references(node: &mut SchemaNode, members: &IndexSet<SchemaName>, is_root: bool) {
    if !is_root {
        if let Some(target) = &node.reference {
            if schema_name_of(target).is_some_and(|name| members.contains(&name)) {
                node.metadata.circular_references = vec![target.clone()];
            }
        }
    }
    for child in node.children_mut() {
        mark_inner_references(child, members, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn graph(entries: &[(&str, &[&str])]) -> DependencyGraph {
        let map: IndexMap<String, IndexSet<String>> = entries
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect();
        DependencyGraph::from_map(&map)
    }

    #[test]
    fn test_two_cycle_marks_both() {
        let g = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
        let a: Vec<_> = cycle_members(&g, "A").into_iter().collect();
        let b: Vec<_> = cycle_members(&g, "B").into_iter().collect();
        assert_eq!(a, vec!["A", "B"]);
        assert_eq!(b, vec!["B", "A"]);
    }

    #[test]
    fn test_neighbour_of_cycle_not_marked() {
        let g = graph(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
        assert!(cycle_members(&g, "C").is_empty());
    }

    #[test]
    fn test_self_reference() {
        let g = graph(&[("Tree", &["Tree"])]);
        let members: Vec<_> = cycle_members(&g, "Tree").into_iter().collect();
        assert_eq!(members, vec!["Tree"]);
    }

    #[test]
    fn test_acyclic_chain() {
        let g = graph(&[("A", &["B"]), ("B", &["C"]), ("C", &[])]);
        for name in ["A", "B", "C"] {
            assert!(cycle_members(&g, name).is_empty());
        }
    }
}
