//! Schema lowering
//!
//! Turns one OpenAPI schema object into a [`SchemaNode`]. Every recursive call
//! receives a derived [`BuildContext`]; properties inherit `required` from the
//! parent's `required` list, everything else recurses as required.

use serde_json::{Map, Value};
use tracing::debug;

use super::context::BuildContext;
use super::resolve::{self, Resolved};
use crate::error::Result;
use crate::ir::{AdditionalProperties, ComponentKind, Discriminator, JsonType, PropertyMap, SchemaNode};

/// Lower a schema value at the context's location
pub fn lower_schema(cx: &BuildContext, value: &Value) -> Result<SchemaNode> {
    cx.check_depth()?;

    let obj = match value {
        Value::Object(obj) => obj,
        Value::Bool(true) => {
            let mut node = SchemaNode::default();
            node.metadata.required = cx.required;
            node.finalize(cx.depth);
            return Ok(node);
        }
        Value::Bool(false) => return Err(cx.shape_error("`false` schema admits no value")),
        other => {
            return Err(cx.shape_error(format!(
                "expected a schema object, found {}",
                JsonType::of_value(other).as_str()
            )))
        }
    };

    if let Some(reference) = resolve::ref_of(cx, value)? {
        return lower_reference(cx, reference);
    }

    let (types, mut nullable) = parse_types(cx, obj.get("type"))?;
    if obj.get("nullable").and_then(Value::as_bool) == Some(true) {
        nullable = true;
    }

    if types.len() <= 1 {
        let schema_type = types.first().copied().or_else(|| nullable_only(obj));
        return lower_body(cx, obj, schema_type, nullable);
    }

    // Several non-null types: one member per type, lowered from the same
    // schema with `type` narrowed
    let members_cx = cx.token("type");
    let mut members = Vec::with_capacity(types.len());
    for (i, schema_type) in types.iter().enumerate() {
        let member_cx = members_cx.child(&i.to_string());
        members.push(lower_body(&member_cx, obj, Some(*schema_type), false)?);
    }

    let mut node = SchemaNode {
        one_of: Some(members),
        title: string_field(obj, "title"),
        description: string_field(obj, "description"),
        default: obj.get("default").cloned(),
        deprecated: bool_field(obj, "deprecated"),
        ..Default::default()
    };
    node.metadata.required = cx.required;
    node.metadata.nullable = nullable;
    node.finalize(cx.depth);
    Ok(node)
}

/// A schema `$ref` stays a reference node. Sibling keywords are dropped.
fn lower_reference(cx: &BuildContext, reference: &str) -> Result<SchemaNode> {
    if let Resolved::External { reference: external } = resolve::resolve(cx, reference, ComponentKind::Schema)? {
        debug!(reference = %external, "External schema reference");
    }
    let mut node = SchemaNode::reference(reference);
    node.metadata.required = cx.required;
    node.finalize(cx.depth);
    Ok(node)
}

/// `type: "null"` alone
fn nullable_only(obj: &Map<String, Value>) -> Option<JsonType> {
    match obj.get("type") {
        Some(Value::String(t)) if t == "null" => Some(JsonType::Null),
        Some(Value::Array(items)) if !items.is_empty() && items.iter().all(|t| t == "null") => {
            Some(JsonType::Null)
        }
        _ => None,
    }
}

/// Non-null types in declaration order, plus whether `null` was listed
fn parse_types(cx: &BuildContext, value: Option<&Value>) -> Result<(Vec<JsonType>, bool)> {
    let names: Vec<&Value> = match value {
        None => return Ok((Vec::new(), false)),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let mut types = Vec::new();
    let mut nullable = false;
    for name in names {
        let Some(name) = name.as_str() else {
            return Err(cx.shape_error("type must be a string or an array of strings"));
        };
        match JsonType::from_name(name) {
            Some(JsonType::Null) => nullable = true,
            Some(t) => {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
            None => return Err(cx.shape_error(format!("unknown type '{}'", name))),
        }
    }
    Ok((types, nullable))
}

fn lower_body(
    cx: &BuildContext,
    obj: &Map<String, Value>,
    schema_type: Option<JsonType>,
    nullable: bool,
) -> Result<SchemaNode> {
    let mut node = SchemaNode {
        schema_type: schema_type.or_else(|| infer_type(obj)),
        format: string_field(obj, "format"),
        title: string_field(obj, "title"),
        description: string_field(obj, "description"),
        default: obj.get("default").cloned(),
        deprecated: bool_field(obj, "deprecated"),
        read_only: bool_field(obj, "readOnly"),
        write_only: bool_field(obj, "writeOnly"),
        minimum: number_field(cx, obj, "minimum")?,
        maximum: number_field(cx, obj, "maximum")?,
        multiple_of: number_field(cx, obj, "multipleOf")?,
        min_length: count_field(cx, obj, "minLength")?,
        max_length: count_field(cx, obj, "maxLength")?,
        pattern: string_field(obj, "pattern"),
        min_items: count_field(cx, obj, "minItems")?,
        max_items: count_field(cx, obj, "maxItems")?,
        unique_items: obj.get("uniqueItems").and_then(Value::as_bool),
        const_value: obj.get("const").cloned(),
        ..Default::default()
    };

    lower_exclusive_bounds(cx, obj, &mut node)?;

    if let Some(values) = obj.get("enum") {
        let Some(values) = values.as_array() else {
            return Err(cx.token("enum").shape_error("enum must be an array"));
        };
        node.enum_values = Some(values.clone());
    }

    if let Some(props) = obj.get("properties") {
        let props_cx = cx.token("properties");
        let Some(props) = props.as_object() else {
            return Err(props_cx.shape_error("properties must be an object"));
        };
        let declared_required = required_list(obj);

        let mut properties = PropertyMap::new();
        for (name, prop) in props {
            let required = declared_required.iter().any(|r| r == name);
            let prop_cx = props_cx.child(name).with_required(required);
            properties.insert(name.clone(), lower_schema(&prop_cx, prop)?);
        }

        let required: Vec<String> = declared_required
            .into_iter()
            .filter(|name| properties.contains(name))
            .collect();
        if !required.is_empty() {
            node.required = Some(required);
        }
        node.properties = Some(properties);
    } else if !required_list(obj).is_empty() {
        debug!(path = %cx.path(), "Dropping required list without properties");
    }

    if let Some(items) = obj.get("items") {
        node.items = Some(Box::new(lower_schema(&cx.child("items"), items)?));
    }

    if let Some(prefix) = obj.get("prefixItems") {
        node.prefix_items = Some(lower_members(cx, "prefixItems", prefix)?);
    }

    match obj.get("additionalProperties") {
        None => {}
        Some(Value::Bool(flag)) => node.additional_properties = Some(AdditionalProperties::Allowed(*flag)),
        Some(schema) => {
            let child = lower_schema(&cx.child("additionalProperties"), schema)?;
            node.additional_properties = Some(AdditionalProperties::Schema(Box::new(child)));
        }
    }

    if let Some(members) = obj.get("allOf") {
        node.all_of = Some(lower_members(cx, "allOf", members)?);
    }
    if let Some(members) = obj.get("oneOf") {
        node.one_of = Some(lower_members(cx, "oneOf", members)?);
    }
    if let Some(members) = obj.get("anyOf") {
        node.any_of = Some(lower_members(cx, "anyOf", members)?);
    }

    if let Some(discriminator) = obj.get("discriminator") {
        node.discriminator = Some(lower_discriminator(&cx.token("discriminator"), discriminator)?);
    }

    node.metadata.required = cx.required;
    node.metadata.nullable = nullable;
    node.finalize(cx.depth);
    Ok(node)
}

fn infer_type(obj: &Map<String, Value>) -> Option<JsonType> {
    if obj.contains_key("properties") {
        Some(JsonType::Object)
    } else if obj.contains_key("items") || obj.contains_key("prefixItems") {
        Some(JsonType::Array)
    } else {
        None
    }
}

/// Numeric bounds are copied as-is; the boolean 3.0 form moves the plain
/// bound into the exclusive slot
fn lower_exclusive_bounds(
    cx: &BuildContext,
    obj: &Map<String, Value>,
    node: &mut SchemaNode,
) -> Result<()> {
    match obj.get("exclusiveMinimum") {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => node.exclusive_minimum = node.minimum.take(),
        Some(_) => node.exclusive_minimum = number_field(cx, obj, "exclusiveMinimum")?,
    }
    match obj.get("exclusiveMaximum") {
        None | Some(Value::Bool(false)) => {}
        Some(Value::Bool(true)) => node.exclusive_maximum = node.maximum.take(),
        Some(_) => node.exclusive_maximum = number_field(cx, obj, "exclusiveMaximum")?,
    }
    Ok(())
}

fn lower_members(cx: &BuildContext, keyword: &str, value: &Value) -> Result<Vec<SchemaNode>> {
    let keyword_cx = cx.token(keyword);
    let Some(members) = value.as_array() else {
        return Err(keyword_cx.shape_error(format!("{} must be an array", keyword)));
    };
    members
        .iter()
        .enumerate()
        .map(|(i, member)| lower_schema(&keyword_cx.child(&i.to_string()), member))
        .collect()
}

fn lower_discriminator(cx: &BuildContext, value: &Value) -> Result<Discriminator> {
    let Some(property_name) = value.get("propertyName").and_then(Value::as_str) else {
        return Err(cx.shape_error("discriminator requires propertyName"));
    };
    let mut discriminator = Discriminator {
        property_name: property_name.to_string(),
        ..Default::default()
    };
    if let Some(mapping) = value.get("mapping").and_then(Value::as_object) {
        for (key, target) in mapping {
            let Some(target) = target.as_str() else {
                return Err(cx.token("mapping").shape_error("mapping values must be strings"));
            };
            discriminator.mapping.insert(key.clone(), target.to_string());
        }
    }
    Ok(discriminator)
}

fn required_list(obj: &Map<String, Value>) -> Vec<String> {
    obj.get("required")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

pub(crate) fn bool_field(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn number_field(cx: &BuildContext, obj: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| cx.token(key).shape_error(format!("{} must be a number", key))),
    }
}

fn count_field(cx: &BuildContext, obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(value) => value.as_u64().map(Some).ok_or_else(|| {
            cx.token(key)
                .shape_error(format!("{} must be a non-negative integer", key))
        }),
    }
}
