//! Schema Dependency Graph
//!
//! petgraph-backed graph over the schema components of a Document. Edges
//! point from a component to the components its subtree references. The
//! graph drives three things:
//! - the topological order writers emit definitions in
//! - the circular reference annotation (see [`circular`])
//! - `referencedBy` on component roots
//!
//! Neighbours are always returned in declaration order so every result is
//! deterministic for a given source.

pub mod circular;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::ir::{
    schema_name_of, DependencyGraphSummary, Document, EnumDef, GraphNode, JsonType, SchemaNode,
};

/// Schema component name
pub type SchemaName = String;

/// Dependency graph over schema component names
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<SchemaName, ()>,
    node_indices: HashMap<SchemaName, NodeIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl DependencyGraph {
    /// Build from an ordered `name -> dependencies` map. Dependencies on names
    /// that are not keys of the map are dropped.
    pub fn from_map(map: &IndexMap<SchemaName, IndexSet<SchemaName>>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();

        for name in map.keys() {
            let idx = graph.add_node(name.clone());
            node_indices.insert(name.clone(), idx);
        }

        for (name, deps) in map {
            let from = node_indices[name];
            for dep in deps {
                if let Some(&to) = node_indices.get(dep) {
                    graph.add_edge(from, to, ());
                } else {
                    debug!(from = %name, to = %dep, "Dropping dependency on unknown schema");
                }
            }
        }

        Self {
            graph,
            node_indices,
        }
    }

    /// Build from the schema components of a Document
    pub fn from_document(doc: &Document) -> Self {
        Self::from_map(&dependency_map(doc))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node_indices.contains_key(name)
    }

    /// Names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|idx| self.graph[idx].as_str())
    }

    /// Direct dependencies of `name`, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };
        self.outgoing(idx)
            .into_iter()
            .map(|to| self.graph[to].as_str())
            .collect()
    }

    /// Components that depend directly on `name`, in declaration order
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return Vec::new();
        };
        let mut sources: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        sources.sort();
        sources.dedup();
        sources
            .into_iter()
            .map(|from| self.graph[from].as_str())
            .collect()
    }

    /// Depth-first post-order: every dependency precedes its dependents.
    ///
    /// Roots are visited in declaration order and so are each node's
    /// dependencies. An edge back to a node that is still in progress is
    /// skipped, which breaks the cycle at the first-encountered node.
    pub fn topological_order(&self) -> Vec<SchemaName> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut order = Vec::with_capacity(self.graph.node_count());

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }
            marks[start.index()] = Mark::InProgress;
            let mut stack = vec![(start, self.outgoing(start), 0usize)];

            loop {
                let Some(frame) = stack.last_mut() else {
                    break;
                };
                if frame.2 < frame.1.len() {
                    let next = frame.1[frame.2];
                    frame.2 += 1;
                    if marks[next.index()] == Mark::Unvisited {
                        marks[next.index()] = Mark::InProgress;
                        stack.push((next, self.outgoing(next), 0));
                    }
                } else {
                    let node = frame.0;
                    stack.pop();
                    marks[node.index()] = Mark::Done;
                    order.push(self.graph[node].clone());
                }
            }
        }

        order
    }

    /// Strongly connected groups that form a cycle: groups of two or more
    /// members plus single members with a self-loop
    pub fn cycle_groups(&self) -> Vec<Vec<SchemaName>> {
        let mut groups: Vec<Vec<SchemaName>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&idx| self.graph.contains_edge(idx, idx))
            })
            .map(|mut scc| {
                scc.sort();
                scc.into_iter().map(|idx| self.graph[idx].clone()).collect()
            })
            .collect();
        groups.sort_by_key(|group| {
            group
                .first()
                .and_then(|name| self.node_indices.get(name))
                .map(|idx| idx.index())
        });
        groups
    }

    /// Outgoing neighbours ordered by edge insertion
    fn outgoing(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, target)| target).collect()
    }
}

/// Topologically sort an ordered `name -> dependencies` map
pub fn topological_sort(map: &IndexMap<SchemaName, IndexSet<SchemaName>>) -> Vec<SchemaName> {
    DependencyGraph::from_map(map).topological_order()
}

/// Every `$ref` target in a node's subtree, first appearance first.
/// Vendor-extension refs are collected as leaves and never followed.
pub fn collect_references(node: &SchemaNode) -> IndexSet<String> {
    node.subtree_references().into_iter().collect()
}

/// Names of the schema components a node depends on
pub fn schema_dependencies(node: &SchemaNode) -> IndexSet<SchemaName> {
    collect_references(node)
        .iter()
        .filter_map(|reference| schema_name_of(reference))
        .collect()
}

/// `name -> dependencies` for every schema component, limited to names that
/// exist in the Document
pub fn dependency_map(doc: &Document) -> IndexMap<SchemaName, IndexSet<SchemaName>> {
    let known: IndexSet<&str> = doc.schemas().map(|(name, _)| name).collect();
    doc.schemas()
        .map(|(name, schema)| {
            let deps = schema_dependencies(schema)
                .into_iter()
                .filter(|dep| known.contains(dep.as_str()))
                .collect();
            (name.to_string(), deps)
        })
        .collect()
}

// =============================================================================
// Document Analysis
// =============================================================================

/// Fill the document-level dependency summary and run the circular detector.
///
/// Running this twice on the same Document yields the same result.
pub fn analyze(doc: &mut Document) -> DependencyGraph {
    let deps = dependency_map(doc);
    let graph = DependencyGraph::from_map(&deps);

    doc.schema_names = deps.keys().cloned().collect();

    let nodes = deps
        .iter()
        .map(|(name, deps)| {
            (
                name.clone(),
                GraphNode {
                    dependencies: deps.iter().cloned().collect(),
                },
            )
        })
        .collect();

    for (name, schema) in doc.schemas_mut() {
        schema.metadata.dependency_graph.referenced_by = graph
            .dependents(name)
            .into_iter()
            .map(str::to_string)
            .collect();
    }

    let circular = circular::annotate(doc, &graph);

    doc.dependency_graph = DependencyGraphSummary {
        nodes,
        topological_order: graph.topological_order(),
        circular_references: circular,
    };
    doc.enums = collect_enums(doc);

    info!(
        schemas = doc.schema_names.len(),
        edges = graph.edge_count(),
        circular = doc.dependency_graph.circular_references.len(),
        "Analyzed dependency graph"
    );

    graph
}

fn collect_enums(doc: &Document) -> IndexMap<String, EnumDef> {
    doc.schemas()
        .filter_map(|(name, schema)| {
            let values = schema.enum_values.as_ref()?;
            let value_type = schema
                .schema_type
                .or_else(|| values.first().map(JsonType::of_value));
            Some((
                name.to_string(),
                EnumDef {
                    name: name.to_string(),
                    values: values.clone(),
                    value_type,
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[&str])]) -> IndexMap<SchemaName, IndexSet<SchemaName>> {
        entries
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| d.to_string()).collect(),
                )
            })
            .collect()
    }

    fn position(order: &[String], name: &str) -> usize {
        order.iter().position(|n| n == name).unwrap()
    }

    #[test]
    fn test_diamond() {
        let order = topological_sort(&map(&[
            ("A", &["B", "C"]),
            ("B", &["D"]),
            ("C", &["D"]),
            ("D", &[]),
        ]));
        assert_eq!(order, vec!["D", "B", "C", "A"]);
    }

    #[test]
    fn test_self_loop_terminates() {
        let order = topological_sort(&map(&[("Node", &["Node"]), ("Leaf", &[])]));
        assert_eq!(order, vec!["Node", "Leaf"]);
    }

    #[test]
    fn test_three_cycle_every_node_once() {
        let order = topological_sort(&map(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]));
        assert_eq!(order.len(), 3);
        // Broken at A, the first-encountered node
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_dependencies_before_dependents() {
        let deps = map(&[
            ("Order", &["Customer", "LineItem"]),
            ("LineItem", &["Product"]),
            ("Customer", &["Address"]),
            ("Product", &[]),
            ("Address", &[]),
        ]);
        let order = topological_sort(&deps);
        for (name, targets) in &deps {
            for target in targets {
                assert!(position(&order, target) < position(&order, name));
            }
        }
    }

    #[test]
    fn test_unknown_dependency_dropped() {
        let graph = DependencyGraph::from_map(&map(&[("A", &["Missing"])]));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.topological_order(), vec!["A"]);
    }

    #[test]
    fn test_neighbours_in_declaration_order() {
        let graph = DependencyGraph::from_map(&map(&[
            ("A", &["C", "B"]),
            ("B", &[]),
            ("C", &[]),
            ("D", &["B"]),
        ]));
        assert_eq!(graph.dependencies("A"), vec!["C", "B"]);
        assert_eq!(graph.dependents("B"), vec!["A", "D"]);
        assert!(graph.dependencies("Nope").is_empty());
    }

    #[test]
    fn test_cycle_groups() {
        let graph = DependencyGraph::from_map(&map(&[
            ("A", &["B"]),
            ("B", &["A"]),
            ("C", &["A"]),
            ("Self", &["Self"]),
        ]));
        let groups = graph.cycle_groups();
        assert_eq!(groups, vec![vec!["A".to_string(), "B".to_string()], vec!["Self".to_string()]]);
    }
}
