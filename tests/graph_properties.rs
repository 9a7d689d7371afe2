//! Dependency Graph Tests
//!
//! Ordering and cycle marking on whole Documents, built from small
//! structured descriptions.

use serde_json::{json, Value};

use schema_ir::graph::{self, DependencyGraph};
use schema_ir::ir::schema_ref;
use schema_ir::writer::WriterContext;
use schema_ir::{openapi, Document};

/// One object schema per entry, with a `$ref` property per dependency
fn document(entries: &[(&str, &[&str])]) -> Document {
    let mut schemas = serde_json::Map::new();
    for (name, deps) in entries {
        let mut props = serde_json::Map::new();
        for dep in deps.iter() {
            props.insert(dep.to_lowercase(), json!({ "$ref": schema_ref(dep) }));
        }
        schemas.insert(name.to_string(), json!({ "type": "object", "properties": props }));
    }
    let source: Value = json!({
        "openapi": "3.1.0",
        "info": { "title": "graph", "version": "1" },
        "components": { "schemas": schemas }
    });
    openapi::build(&source).unwrap()
}

fn position(order: &[String], name: &str) -> usize {
    order.iter().position(|n| n == name).unwrap()
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_diamond_order() {
    let doc = document(&[("A", &["B", "C"]), ("B", &["D"]), ("C", &["D"]), ("D", &[])]);
    assert_eq!(doc.dependency_graph.topological_order, vec!["D", "B", "C", "A"]);
    assert!(doc.dependency_graph.circular_references.is_empty());
}

#[test]
fn test_dependencies_precede_dependents() {
    let doc = document(&[
        ("Order", &["Customer", "Line"]),
        ("Line", &["Product"]),
        ("Customer", &["Address"]),
        ("Product", &[]),
        ("Address", &[]),
    ]);
    let order = &doc.dependency_graph.topological_order;
    assert_eq!(order.len(), 5);
    for (name, node) in &doc.dependency_graph.nodes {
        for dep in &node.dependencies {
            assert!(position(order, dep) < position(order, name), "{dep} before {name}");
        }
    }
}

#[test]
fn test_three_cycle() {
    let doc = document(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"])]);
    assert_eq!(doc.dependency_graph.topological_order, vec!["C", "B", "A"]);
    assert_eq!(doc.dependency_graph.circular_references, vec!["A", "B", "C"]);
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn test_self_loop() {
    let doc = document(&[("Tree", &["Tree"]), ("Leaf", &[])]);
    assert_eq!(doc.dependency_graph.circular_references, vec!["Tree"]);
    let tree = doc.schema("Tree").unwrap();
    assert_eq!(tree.metadata.circular_references, vec![schema_ref("Tree")]);
    assert!(doc.schema("Leaf").unwrap().metadata.circular_references.is_empty());
}

#[test]
fn test_neighbour_of_cycle_unmarked() {
    let doc = document(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
    assert_eq!(doc.dependency_graph.circular_references, vec!["A", "B"]);

    let a = doc.schema("A").unwrap();
    assert_eq!(a.metadata.circular_references, vec![schema_ref("A"), schema_ref("B")]);
    let b_prop = a.properties.as_ref().unwrap().get("b").unwrap();
    assert_eq!(b_prop.metadata.circular_references, vec![schema_ref("B")]);

    let c = doc.schema("C").unwrap();
    assert!(c.metadata.circular_references.is_empty());
    let a_prop = c.properties.as_ref().unwrap().get("a").unwrap();
    assert!(a_prop.metadata.circular_references.is_empty());
    assert_eq!(c.metadata.dependency_graph.references, vec![schema_ref("A")]);

    assert_eq!(
        a.metadata.dependency_graph.referenced_by,
        vec!["B".to_string(), "C".to_string()]
    );
}

#[test]
fn test_cycle_groups() {
    let doc = document(&[("A", &["B"]), ("B", &["A"]), ("C", &["C"]), ("D", &["A"])]);
    let graph = DependencyGraph::from_document(&doc);
    assert_eq!(
        graph.cycle_groups(),
        vec![vec!["A".to_string(), "B".to_string()], vec!["C".to_string()]]
    );
}

// =============================================================================
// Analysis
// =============================================================================

#[test]
fn test_analyze_is_idempotent() {
    let mut doc = document(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
    let first = doc.clone();
    graph::analyze(&mut doc);
    graph::analyze(&mut doc);
    assert_eq!(doc, first);
}

#[test]
fn test_unknown_dependency_dropped() {
    let mut doc = document(&[("A", &[]), ("B", &["A"])]);
    // Drop `A`; `B` keeps its `$ref` but the graph no longer knows it
    doc.components.remove(0);
    graph::analyze(&mut doc);

    assert_eq!(doc.schema_names, vec!["B"]);
    assert!(doc.dependency_graph.nodes["B"].dependencies.is_empty());
    assert_eq!(doc.dependency_graph.topological_order, vec!["B"]);
}

#[test]
fn test_writer_boundary_accepts_built_documents() {
    let doc = document(&[("A", &["B"]), ("B", &["A"]), ("C", &["A"])]);
    let cx = WriterContext::new(&doc).unwrap();
    let lazy: Vec<_> = cx.regions().iter().filter(|r| r.needs_lazy()).map(|r| r.name).collect();
    assert_eq!(lazy, vec!["B", "A"]);
    assert_eq!(cx.regions().last().map(|r| r.name), Some("C"));
}
