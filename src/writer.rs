//! Writer Boundary
//!
//! Code emitters live outside this crate and reach the IR only through here.
//!
//! Architecture:
//! - WriterContext: built once per Document, verifies it, then read-only
//! - Region: projection of one schema component plus its graph facts
//! - IrWriter: implemented by emitters, consumes Regions in dependency order
//!
//! Writers never decide on their own whether a reference needs a deferred
//! accessor; that is read from `metadata.circularReferences`, which only the
//! circular reference detector writes.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::{IrError, Result};
use crate::ir::{AdditionalProperties, ComponentRef, Document, SchemaNode};

// =============================================================================
// Region
// =============================================================================

/// One schema component as a writer sees it
#[derive(Debug, Clone)]
pub struct Region<'d> {
    pub name: &'d str,
    pub schema: &'d SchemaNode,
    /// Schema components this one references, declaration order
    pub dependencies: Vec<&'d str>,
    /// Schema components referencing this one
    pub dependents: Vec<&'d str>,
}

impl<'d> Region<'d> {
    /// Whether the schema sits on a reference cycle and must be emitted
    /// behind a deferred accessor
    pub fn needs_lazy(&self) -> bool {
        !self.schema.metadata.circular_references.is_empty()
    }

    /// Whether a property's subtree closes a cycle
    pub fn property_needs_lazy(&self, property: &str) -> bool {
        self.schema
            .properties
            .as_ref()
            .and_then(|props| props.get(property))
            .is_some_and(closes_cycle)
    }
}

fn closes_cycle(node: &SchemaNode) -> bool {
    !node.metadata.circular_references.is_empty() || node.children().into_iter().any(closes_cycle)
}

// =============================================================================
// WriterContext
// =============================================================================

/// Verified, read-only view of a Document
#[derive(Debug)]
pub struct WriterContext<'d> {
    document: &'d Document,
    regions: Vec<Region<'d>>,
}

impl<'d> WriterContext<'d> {
    /// Verify the Document and project it into Regions in topological order
    pub fn new(document: &'d Document) -> Result<Self> {
        verify_graph(document)?;
        for (name, schema) in document.schemas() {
            verify_node(name, "", schema)?;
        }

        let regions = document
            .dependency_graph
            .topological_order
            .iter()
            .filter_map(|name| {
                let schema = document.schema(name)?;
                let dependencies = document
                    .dependency_graph
                    .nodes
                    .get(name.as_str())
                    .map(|node| node.dependencies.iter().map(String::as_str).collect())
                    .unwrap_or_default();
                Some(Region {
                    name: name.as_str(),
                    schema,
                    dependencies,
                    dependents: schema
                        .metadata
                        .dependency_graph
                        .referenced_by
                        .iter()
                        .map(String::as_str)
                        .collect(),
                })
            })
            .collect();

        Ok(Self { document, regions })
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    /// Regions in topological order, dependencies first
    pub fn regions(&self) -> &[Region<'d>] {
        &self.regions
    }

    pub fn region(&self, name: &str) -> Option<&Region<'d>> {
        self.regions.iter().find(|r| r.name == name)
    }

    pub fn schema_count(&self) -> usize {
        self.regions.len()
    }
}

/// Topological order, graph nodes and circular names must all agree with
/// `schemaNames`
fn verify_graph(document: &Document) -> Result<()> {
    let names = &document.schema_names;
    let summary = &document.dependency_graph;

    let declared: Vec<&str> = document.schemas().map(|(name, _)| name).collect();
    if declared != names.iter().map(String::as_str).collect::<Vec<_>>() {
        return Err(IrError::BoundaryViolation(
            "schemaNames does not match the schema components".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for name in &summary.topological_order {
        if !seen.insert(name.as_str()) {
            return Err(IrError::BoundaryViolation(format!(
                "`{}` appears twice in the topological order",
                name
            )));
        }
    }
    let known: HashSet<&str> = names.iter().map(String::as_str).collect();
    if seen != known {
        return Err(IrError::BoundaryViolation(
            "topological order does not cover exactly the schema names".to_string(),
        ));
    }

    if !summary.nodes.keys().eq(names.iter()) {
        return Err(IrError::BoundaryViolation(
            "dependency graph nodes do not match the schema names".to_string(),
        ));
    }

    if let Some(unknown) = summary
        .circular_references
        .iter()
        .find(|name| !known.contains(name.as_str()))
    {
        return Err(IrError::BoundaryViolation(format!(
            "circular reference list names unknown schema `{}`",
            unknown
        )));
    }
    Ok(())
}

/// `$ref` purity, reference format and `required ⊆ properties`
fn verify_node(schema: &str, path: &str, node: &SchemaNode) -> Result<()> {
    let at = || {
        if path.is_empty() {
            format!("schema `{}`", schema)
        } else {
            format!("schema `{}` at {}", schema, path)
        }
    };

    if let Some(reference) = &node.reference {
        if node.has_structure() {
            return Err(IrError::BoundaryViolation(format!(
                "{}: `$ref` node carries structural fields",
                at()
            )));
        }
        if ComponentRef::parse(reference).is_none() {
            return Err(IrError::BoundaryViolation(format!(
                "{}: malformed reference '{}'",
                at(),
                reference
            )));
        }
    }

    for name in node.required_names() {
        let declared = node.properties.as_ref().is_some_and(|props| props.contains(name));
        if !declared {
            return Err(IrError::BoundaryViolation(format!(
                "{}: required property `{}` is not declared",
                at(),
                name
            )));
        }
    }

    if let Some(props) = &node.properties {
        for (name, property) in props.entries() {
            verify_node(schema, &format!("{}/properties/{}", path, name), property)?;
        }
    }
    if let Some(items) = &node.items {
        verify_node(schema, &format!("{}/items", path), items)?;
    }
    let member_lists = [
        ("prefixItems", &node.prefix_items),
        ("allOf", &node.all_of),
        ("oneOf", &node.one_of),
        ("anyOf", &node.any_of),
    ];
    for (keyword, members) in member_lists {
        for (index, member) in members.iter().flatten().enumerate() {
            verify_node(schema, &format!("{}/{}/{}", path, keyword, index), member)?;
        }
    }
    if let Some(AdditionalProperties::Schema(value)) = &node.additional_properties {
        verify_node(schema, &format!("{}/additionalProperties", path), value)?;
    }
    Ok(())
}

// =============================================================================
// Writers
// =============================================================================

/// Output of one writer run
#[derive(Debug, Clone, Default)]
pub struct WriterOutput {
    pub content: String,
    /// Number of schemas emitted
    pub schema_count: usize,
    pub warnings: Vec<String>,
}

/// Implemented by code emitters
pub trait IrWriter {
    fn name(&self) -> &str;

    fn write(&self, cx: &WriterContext) -> Result<WriterOutput>;
}

/// Verify a Document and hand it to a writer
pub fn run(writer: &dyn IrWriter, document: &Document) -> Result<WriterOutput> {
    let cx = WriterContext::new(document)?;
    debug!(writer = writer.name(), regions = cx.schema_count(), "Running writer");
    let output = writer.write(&cx)?;
    info!(
        writer = writer.name(),
        schemas = output.schema_count,
        warnings = output.warnings.len(),
        "Writer finished"
    );
    Ok(output)
}
