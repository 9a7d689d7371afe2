//! Object shapes and the object-only chain methods

use serde_json::Value;
use std::collections::HashSet;
use tree_sitter::Node;

use super::{reference, required_arg, ChainState, Dispatcher, LowerContext, NodeHandler};
use crate::ir::{AdditionalProperties, JsonType, PropertyMap, SchemaNode};
use crate::zod::chain::Call;
use crate::zod::syntax::{named_children, property_key, text, unwrap_expression};
use crate::zod::{ParseFailure, ParseResult};

pub struct ObjectHandler;

impl NodeHandler for ObjectHandler {
    fn name(&self) -> &'static str {
        "object"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &["object", "strictObject", "looseObject"]
    }

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        let properties = match base.arg(0) {
            Some(arg) => shape(arg.node, cx, dispatcher)?,
            None => PropertyMap::new(),
        };
        let mut node = object_node(properties);
        node.additional_properties = match base.name.as_str() {
            "strictObject" => Some(AdditionalProperties::Allowed(false)),
            "looseObject" => Some(AdditionalProperties::Allowed(true)),
            _ => None,
        };
        Ok(node)
    }

    fn apply(
        &self,
        state: &mut ChainState,
        call: &Call,
        cx: LowerContext,
        dispatcher: &Dispatcher,
    ) -> ParseResult<bool> {
        let is_object = state.node.schema_type == Some(JsonType::Object) && !state.node.is_reference();

        match call.name.as_str() {
            // Reference or composed bases extend through allOf
            "extend" | "safeExtend" | "merge" => {
                let arg = required_arg(call)?;
                let addition = if unwrap_expression(arg).kind() == "object" {
                    object_node(shape(arg, cx.child(), dispatcher)?)
                } else {
                    dispatcher.lower(arg, cx.child())?
                };
                if is_object && addition.schema_type == Some(JsonType::Object) && !addition.is_reference() {
                    merge_into(&mut state.node, addition);
                } else {
                    state.wrap(|inner| SchemaNode {
                        all_of: Some(vec![inner, addition]),
                        ..Default::default()
                    });
                }
                Ok(true)
            }
            _ if !is_object => Ok(false),
            "setKey" => {
                let key = call.arg(0).and_then(|arg| arg.as_str()).ok_or_else(|| {
                    ParseFailure::new("`setKey` expects a string literal key").at(call.location)
                })?;
                let value = call.arg(1).map(|arg| arg.node).ok_or_else(|| {
                    ParseFailure::new("`setKey` expects a schema").at(call.location)
                })?;
                let value = dispatcher.lower(value, cx.child())?;
                properties_mut(&mut state.node).insert(key, value);
                sync_required(&mut state.node);
                Ok(true)
            }
            "partial" | "required" => {
                let mask = mask_of(call)?;
                let required = call.name == "required";
                for (name, property) in properties_mut(&mut state.node).entries_mut() {
                    if mask.as_ref().map_or(true, |m| m.contains(name.as_str())) {
                        property.metadata.required = required;
                    }
                }
                sync_required(&mut state.node);
                Ok(true)
            }
            "deepPartial" => {
                deep_partial(&mut state.node);
                Ok(true)
            }
            "strict" => {
                state.node.additional_properties = Some(AdditionalProperties::Allowed(false));
                Ok(true)
            }
            "passthrough" | "nonstrict" | "loose" => {
                state.node.additional_properties = Some(AdditionalProperties::Allowed(true));
                Ok(true)
            }
            "strip" => {
                state.node.additional_properties = None;
                Ok(true)
            }
            "catchall" => {
                let rest = dispatcher.lower(required_arg(call)?, cx.child())?;
                state.node.additional_properties = Some(AdditionalProperties::Schema(Box::new(rest)));
                Ok(true)
            }
            "pick" | "omit" => {
                let mask = mask_of(call)?.ok_or_else(|| {
                    ParseFailure::new(format!("`{}` expects a key mask object", call.name)).at(call.location)
                })?;
                let keep = call.name == "pick";
                properties_mut(&mut state.node).retain(|name, _| mask.contains(name) == keep);
                sync_required(&mut state.node);
                Ok(true)
            }
            "keyof" => {
                let names: Vec<Value> = state
                    .node
                    .properties
                    .iter()
                    .flat_map(|props| props.names())
                    .map(|name| Value::String(name.to_string()))
                    .collect();
                state.node = SchemaNode {
                    enum_values: Some(names),
                    ..SchemaNode::of_type(JsonType::String)
                };
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Lower an object literal of `key: schema` pairs
fn shape(arg: Node, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<PropertyMap> {
    let literal = unwrap_expression(arg);
    if literal.kind() != "object" {
        return Err(ParseFailure::new("object shape must be an object literal").at_node(&arg, cx.source));
    }

    let mut properties = PropertyMap::new();
    for member in named_children(&literal) {
        match member.kind() {
            "pair" => {
                let (Some(key), Some(value)) = (
                    member.child_by_field_name("key"),
                    member.child_by_field_name("value"),
                ) else {
                    continue;
                };
                let Some(name) = property_key(&key, cx.source) else {
                    return Err(ParseFailure::new("computed property key cannot be analyzed").at_node(&key, cx.source));
                };
                properties.insert(name, dispatcher.lower(value, cx.child())?);
            }
            "shorthand_property_identifier" => {
                let name = text(&member, cx.source);
                let mut node = reference::identifier(name);
                node.metadata.required = true;
                properties.insert(name, node);
            }
            "spread_element" => {
                return Err(ParseFailure::new("spread-merged property set cannot be analyzed").at_node(&member, cx.source));
            }
            other => {
                return Err(ParseFailure::new(format!("unsupported object member `{}`", other))
                    .at_node(&member, cx.source));
            }
        }
    }
    Ok(properties)
}

fn object_node(properties: PropertyMap) -> SchemaNode {
    let mut node = SchemaNode::of_type(JsonType::Object);
    node.properties = Some(properties);
    sync_required(&mut node);
    node
}

fn properties_mut(node: &mut SchemaNode) -> &mut PropertyMap {
    node.properties.get_or_insert_with(PropertyMap::new)
}

/// Rebuild `required` from the property nodes' presence
fn sync_required(node: &mut SchemaNode) {
    let required: Vec<String> = node
        .properties
        .iter()
        .flat_map(|props| props.entries())
        .filter(|(_, property)| property.metadata.required)
        .map(|(name, _)| name.clone())
        .collect();
    node.required = (!required.is_empty()).then_some(required);
}

/// Later properties override earlier ones of the same name
fn merge_into(target: &mut SchemaNode, addition: SchemaNode) {
    let props = properties_mut(target);
    for (name, property) in addition.properties.into_iter().flatten() {
        props.insert(name, property);
    }
    if addition.additional_properties.is_some() {
        target.additional_properties = addition.additional_properties;
    }
    sync_required(target);
}

fn deep_partial(node: &mut SchemaNode) {
    if let Some(props) = &mut node.properties {
        for property in props.values_mut() {
            property.metadata.required = false;
            deep_partial(property);
        }
    }
    if let Some(items) = &mut node.items {
        deep_partial(items);
    }
    if node.properties.is_some() {
        sync_required(node);
    }
}

/// Names set to `true` in a `{ name: true }` mask argument
fn mask_of(call: &Call) -> ParseResult<Option<HashSet<String>>> {
    let Some(arg) = call.arg(0) else {
        return Ok(None);
    };
    let Some(Value::Object(mask)) = arg.value.clone() else {
        return Err(ParseFailure::new(format!("`{}` expects a key mask object", call.name)).at(call.location));
    };
    Ok(Some(
        mask.into_iter()
            .filter(|(_, flag)| flag.as_bool() == Some(true))
            .map(|(name, _)| name)
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::ir::{AdditionalProperties, JsonType, Presence};
    use crate::zod::parse;
    use serde_json::json;

    const PRELUDE: &str = "import { z } from \"zod\";\n";

    fn parse_one(body: &str) -> crate::ir::SchemaNode {
        let output = parse(&format!("{}const S = {};\n", PRELUDE, body));
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        output.ir.schema("S").cloned().unwrap()
    }

    #[test]
    fn test_optional_properties_not_required() {
        let node = parse_one("z.object({ id: z.string(), age: z.number().min(0).max(150).optional() })");
        assert_eq!(node.required_names(), ["id"]);
        let age = node.properties.as_ref().unwrap().get("age").unwrap();
        assert_eq!(age.minimum, Some(0.0));
        assert_eq!(age.maximum, Some(150.0));
        assert!(!age.metadata.required);
        assert_eq!(age.metadata.validation_chain.presence, Presence::Optional);
    }

    #[test]
    fn test_extend_and_pick() {
        let node = parse_one("z.object({ a: z.string(), b: z.string() }).extend({ c: z.number() }).pick({ a: true, c: true })");
        let names: Vec<_> = node.properties.as_ref().unwrap().names().collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(node.required_names(), ["a", "c"]);
    }

    #[test]
    fn test_partial_with_mask() {
        let node = parse_one("z.object({ a: z.string(), b: z.string() }).partial({ b: true })");
        assert_eq!(node.required_names(), ["a"]);
    }

    #[test]
    fn test_strictness() {
        let strict = parse_one("z.strictObject({})");
        assert_eq!(strict.additional_properties, Some(AdditionalProperties::Allowed(false)));
        let loose = parse_one("z.object({}).passthrough()");
        assert_eq!(loose.additional_properties, Some(AdditionalProperties::Allowed(true)));
        let catchall = parse_one("z.object({}).catchall(z.string())");
        assert!(matches!(catchall.additional_properties, Some(AdditionalProperties::Schema(_))));
    }

    #[test]
    fn test_keyof() {
        let node = parse_one("z.object({ a: z.string(), b: z.number() }).keyof()");
        assert_eq!(node.schema_type, Some(JsonType::String));
        assert_eq!(node.enum_values, Some(vec![json!("a"), json!("b")]));
    }

    #[test]
    fn test_extend_reference_uses_all_of() {
        let output = parse(&format!(
            "{}const Base = z.object({{ id: z.string() }});\nconst Child = Base.extend({{ name: z.string() }});\n",
            PRELUDE
        ));
        let child = output.ir.schema("Child").unwrap();
        let members = child.all_of.as_ref().unwrap();
        assert_eq!(members[0].reference.as_deref(), Some("#/components/schemas/Base"));
        assert_eq!(members[1].required_names(), ["name"]);
        assert_eq!(output.ir.dependency_graph.topological_order, vec!["Base", "Child"]);
    }
}
