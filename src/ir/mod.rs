//! Canonical Schema IR
//!
//! The format-agnostic node and document types shared by both front-ends.
//! Nothing in here knows whether a node came from an OpenAPI document or from
//! builder-syntax source; writers only ever see these types.

pub mod document;
pub mod properties;
pub mod reference;

pub use document::{
    Component, DependencyGraphSummary, Document, DocumentInfo, EnumDef, GraphNode, Header,
    HttpMethod, MediaType, OAuthFlow, OAuthFlows, Operation, OperationResponse, Parameter,
    ParameterGroups, ParameterLocation, RequestBody, Response, ResponseAdvisory,
    SecurityRequirement, SecurityScheme, SecuritySchemeType, Server, IR_VERSION,
};
pub use properties::PropertyMap;
pub use reference::{schema_name_of, schema_ref, ComponentKind, ComponentRef, RefOrigin};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Scalar Types
// =============================================================================

/// JSON type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Null,
}

impl JsonType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "object" => Some(Self::Object),
            "array" => Some(Self::Array),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::Null => "null",
        }
    }

    /// Type of a JSON literal
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::Integer,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Integer)
    }
}

/// `additionalProperties`: either a flag or a value schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// Discriminator for tagged unions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
}

// =============================================================================
// Metadata
// =============================================================================

/// Combined presence marker for a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Required,
    Optional,
    Nullable,
    Nullish,
}

impl Presence {
    pub fn from_flags(optional: bool, nullable: bool) -> Self {
        match (optional, nullable) {
            (false, false) => Self::Required,
            (true, false) => Self::Optional,
            (false, true) => Self::Nullable,
            (true, true) => Self::Nullish,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional | Self::Nullish)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Self::Nullable | Self::Nullish)
    }
}

/// Ordered validation steps a writer emits for a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationChain {
    pub presence: Presence,
    /// `keyword:value` descriptors, constraints first, then refinements
    #[serde(default)]
    pub validations: Vec<String>,
    /// JSON text of default values
    #[serde(default)]
    pub defaults: Vec<String>,
}

/// Per-node view of the dependency graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDependencies {
    /// Component refs in this node's subtree, in order of first appearance
    #[serde(default)]
    pub references: Vec<String>,
    /// Components depending on this one (component roots only)
    #[serde(default)]
    pub referenced_by: Vec<String>,
    /// Nesting depth below the component root
    #[serde(default)]
    pub depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    pub required: bool,
    pub nullable: bool,
    pub dependency_graph: NodeDependencies,
    pub validation_chain: ValidationChain,
    /// Written only by the circular reference detector
    #[serde(default)]
    pub circular_references: Vec<String>,
}

// =============================================================================
// Schema Node
// =============================================================================

/// The canonical recursive schema node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<JsonType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub write_only: bool,

    // Numeric constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,

    // String constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    // Array constraints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_items: Option<bool>,

    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "const", default, skip_serializing_if = "Option::is_none")]
    pub const_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix_items: Option<Vec<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<AdditionalProperties>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<SchemaNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,

    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default)]
    pub metadata: NodeMetadata,
}

impl SchemaNode {
    /// A bare node of one JSON type
    pub fn of_type(schema_type: JsonType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Default::default()
        }
    }

    /// A reference node. Carries nothing but `$ref` and metadata.
    pub fn reference(target: impl Into<String>) -> Self {
        Self {
            reference: Some(target.into()),
            ..Default::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether any structural keyword is set besides `$ref`
    pub fn has_structure(&self) -> bool {
        let stripped = SchemaNode {
            reference: None,
            metadata: NodeMetadata::default(),
            ..self.clone()
        };
        stripped != SchemaNode::default()
    }

    /// Names of required properties
    pub fn required_names(&self) -> &[String] {
        self.required.as_deref().unwrap_or(&[])
    }

    /// Direct child nodes
    pub fn children(&self) -> Vec<&SchemaNode> {
        let mut children = Vec::new();
        if let Some(props) = &self.properties {
            children.extend(props.values());
        }
        if let Some(items) = &self.items {
            children.push(items.as_ref());
        }
        if let Some(prefix) = &self.prefix_items {
            children.extend(prefix.iter());
        }
        if let Some(AdditionalProperties::Schema(schema)) = &self.additional_properties {
            children.push(schema.as_ref());
        }
        for members in [&self.all_of, &self.one_of, &self.any_of].into_iter().flatten() {
            children.extend(members.iter());
        }
        children
    }

    /// Direct child nodes, mutably
    pub fn children_mut(&mut self) -> Vec<&mut SchemaNode> {
        let mut children = Vec::new();
        if let Some(props) = &mut self.properties {
            children.extend(props.values_mut());
        }
        if let Some(items) = &mut self.items {
            children.push(items.as_mut());
        }
        if let Some(prefix) = &mut self.prefix_items {
            children.extend(prefix.iter_mut());
        }
        if let Some(AdditionalProperties::Schema(schema)) = &mut self.additional_properties {
            children.push(schema.as_mut());
        }
        for members in [&mut self.all_of, &mut self.one_of, &mut self.any_of]
            .into_iter()
            .flatten()
        {
            children.extend(members.iter_mut());
        }
        children
    }

    /// Every `$ref` in this subtree, first appearance first
    pub fn subtree_references(&self) -> Vec<String> {
        let mut found = IndexSet::new();
        collect_subtree_references(self, &mut found);
        found.into_iter().collect()
    }

    /// Fill the derived metadata: subtree references, depth, and the
    /// validation chain. Refinements already pushed into the chain are kept
    /// after the constraint-derived entries.
    pub fn finalize(&mut self, depth: usize) {
        self.metadata.dependency_graph.references = self.subtree_references();
        self.metadata.dependency_graph.depth = depth;

        let presence = Presence::from_flags(!self.metadata.required, self.metadata.nullable);
        self.metadata.validation_chain.presence = presence;

        let mut validations = constraint_descriptors(self);
        for existing in self.metadata.validation_chain.validations.drain(..) {
            if !validations.contains(&existing) {
                validations.push(existing);
            }
        }
        self.metadata.validation_chain.validations = validations;

        if let Some(default) = &self.default {
            let text = default.to_string();
            if !self.metadata.validation_chain.defaults.contains(&text) {
                self.metadata.validation_chain.defaults.push(text);
            }
        }
    }
}

fn collect_subtree_references(node: &SchemaNode, found: &mut IndexSet<String>) {
    if let Some(target) = &node.reference {
        found.insert(target.clone());
    }
    for child in node.children() {
        collect_subtree_references(child, found);
    }
}

/// `keyword:value` descriptors for every constraint set on a node
fn constraint_descriptors(node: &SchemaNode) -> Vec<String> {
    let mut out = Vec::new();
    let numeric = [
        ("minimum", node.minimum),
        ("maximum", node.maximum),
        ("exclusiveMinimum", node.exclusive_minimum),
        ("exclusiveMaximum", node.exclusive_maximum),
        ("multipleOf", node.multiple_of),
    ];
    for (keyword, value) in numeric {
        if let Some(v) = value {
            out.push(format!("{}:{}", keyword, v));
        }
    }
    let counts = [
        ("minLength", node.min_length),
        ("maxLength", node.max_length),
        ("minItems", node.min_items),
        ("maxItems", node.max_items),
    ];
    for (keyword, value) in counts {
        if let Some(v) = value {
            out.push(format!("{}:{}", keyword, v));
        }
    }
    if let Some(pattern) = &node.pattern {
        out.push(format!("pattern:{}", pattern));
    }
    if let Some(format) = &node.format {
        out.push(format!("format:{}", format));
    }
    if node.unique_items == Some(true) {
        out.push("uniqueItems:true".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_node_has_no_structure() {
        let node = SchemaNode::reference("#/components/schemas/User");
        assert!(node.is_reference());
        assert!(!node.has_structure());

        let mut polluted = node.clone();
        polluted.schema_type = Some(JsonType::Object);
        assert!(polluted.has_structure());
    }

    #[test]
    fn test_finalize_derives_chain() {
        let mut node = SchemaNode::of_type(JsonType::Number);
        node.minimum = Some(0.0);
        node.maximum = Some(150.0);
        node.default = Some(json!(18));
        node.metadata.required = false;
        node.metadata.validation_chain.validations.push("refine".into());
        node.finalize(2);

        let chain = &node.metadata.validation_chain;
        assert_eq!(chain.presence, Presence::Optional);
        assert_eq!(chain.validations, vec!["minimum:0", "maximum:150", "refine"]);
        assert_eq!(chain.defaults, vec!["18"]);
        assert_eq!(node.metadata.dependency_graph.depth, 2);

        // Running twice changes nothing
        let snapshot = node.clone();
        node.finalize(2);
        assert_eq!(node, snapshot);
    }

    #[test]
    fn test_subtree_references_in_order() {
        let mut node = SchemaNode::of_type(JsonType::Object);
        let mut props = PropertyMap::new();
        props.insert("owner", SchemaNode::reference("#/components/schemas/User"));
        let mut tags = SchemaNode::of_type(JsonType::Array);
        tags.items = Some(Box::new(SchemaNode::reference("#/components/schemas/Tag")));
        props.insert("tags", tags);
        props.insert("editor", SchemaNode::reference("#/components/schemas/User"));
        node.properties = Some(props);

        assert_eq!(
            node.subtree_references(),
            vec!["#/components/schemas/User", "#/components/schemas/Tag"]
        );
    }

    #[test]
    fn test_serialized_field_names() {
        let mut node = SchemaNode::of_type(JsonType::String);
        node.min_length = Some(1);
        node.enum_values = Some(vec![json!("a")]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "string");
        assert_eq!(value["minLength"], 1);
        assert_eq!(value["enum"][0], "a");
        assert!(value.get("$ref").is_none());
        assert_eq!(value["metadata"]["validationChain"]["presence"], "required");
    }
}
