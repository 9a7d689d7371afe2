//! Collections and enumerations: `array`, `tuple`, `record`, `map`, `set`,
//! `enum`

use serde_json::Value;

use super::union::members;
use super::{reference, required_arg, ChainState, Dispatcher, LowerContext, NodeHandler};
use crate::ir::{AdditionalProperties, JsonType, SchemaNode};
use crate::zod::chain::Call;
use crate::zod::syntax::unwrap_expression;
use crate::zod::{ParseFailure, ParseResult};

pub struct CompositionHandler;

impl NodeHandler for CompositionHandler {
    fn name(&self) -> &'static str {
        "composition"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &["array", "tuple", "record", "map", "set", "enum"]
    }

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        match base.name.as_str() {
            "array" | "set" => {
                let item = dispatcher.lower(required_arg(base)?, cx.child())?;
                let mut node = SchemaNode::of_type(JsonType::Array);
                node.items = Some(Box::new(item));
                if base.name == "set" {
                    node.unique_items = Some(true);
                }
                Ok(node)
            }
            "tuple" => {
                let prefix = members(required_arg(base)?, cx, dispatcher)?;
                let mut node = SchemaNode::of_type(JsonType::Array);
                match base.arg(1) {
                    Some(rest) => {
                        node.items = Some(Box::new(dispatcher.lower(rest.node, cx.child())?));
                        node.min_items = Some(prefix.len() as u64);
                    }
                    None => {
                        node.min_items = Some(prefix.len() as u64);
                        node.max_items = Some(prefix.len() as u64);
                    }
                }
                node.prefix_items = Some(prefix);
                Ok(node)
            }
            "record" | "map" => {
                // The value schema is always the last argument
                let value = base.args.last().map(|arg| arg.node).ok_or_else(|| {
                    ParseFailure::new(format!("`{}` expects a value schema", base.name)).at(base.location)
                })?;
                let value = dispatcher.lower(value, cx.child())?;
                let mut node = SchemaNode::of_type(JsonType::Object);
                node.additional_properties = Some(AdditionalProperties::Schema(Box::new(value)));
                if base.name == "map" {
                    node.metadata.validation_chain.validations.push("map".to_string());
                }
                Ok(node)
            }
            "enum" => {
                let arg = required_arg(base)?;
                let arg = unwrap_expression(arg);
                if arg.kind() == "identifier" {
                    return reference::native_enum(&arg, cx);
                }
                let values = base
                    .arg(0)
                    .and_then(|a| a.value.clone())
                    .and_then(|v| match v {
                        Value::Array(values) if values.iter().all(Value::is_string) => Some(values),
                        _ => None,
                    })
                    .ok_or_else(|| {
                        ParseFailure::new("`enum` expects an array of string literals").at(base.location)
                    })?;
                Ok(SchemaNode {
                    enum_values: Some(values),
                    ..SchemaNode::of_type(JsonType::String)
                })
            }
            other => Err(ParseFailure::new(format!("unsupported collection `{}`", other)).at(base.location)),
        }
    }

    fn apply(
        &self,
        state: &mut ChainState,
        call: &Call,
        cx: LowerContext,
        dispatcher: &Dispatcher,
    ) -> ParseResult<bool> {
        match call.name.as_str() {
            "exclude" | "extract" if state.node.enum_values.is_some() => {
                let Some(Value::Array(listed)) = call.arg(0).and_then(|arg| arg.value.clone()) else {
                    return Err(ParseFailure::new(format!("`{}` expects an array of literals", call.name))
                        .at(call.location));
                };
                let keep = call.name == "extract";
                if let Some(values) = &mut state.node.enum_values {
                    values.retain(|value| listed.contains(value) == keep);
                }
                Ok(true)
            }
            "rest" if state.node.prefix_items.is_some() => {
                let rest = dispatcher.lower(required_arg(call)?, cx.child())?;
                state.node.items = Some(Box::new(rest));
                state.node.max_items = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::{AdditionalProperties, JsonType};
    use crate::zod::parse;
    use serde_json::json;

    #[test]
    fn test_collections() {
        let output = parse(
            r#"import { z } from "zod";
const Tags = z.array(z.string()).min(1).max(10);
const Pair = z.tuple([z.string(), z.number()]);
const Scores = z.record(z.string(), z.number());
const Unique = z.set(z.string());
"#,
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let ir = &output.ir;

        let tags = ir.schema("Tags").unwrap();
        assert_eq!(tags.min_items, Some(1));
        assert_eq!(tags.max_items, Some(10));
        assert_eq!(tags.items.as_ref().unwrap().schema_type, Some(JsonType::String));

        let pair = ir.schema("Pair").unwrap();
        assert_eq!(pair.prefix_items.as_ref().unwrap().len(), 2);
        assert_eq!((pair.min_items, pair.max_items), (Some(2), Some(2)));

        let scores = ir.schema("Scores").unwrap();
        match &scores.additional_properties {
            Some(AdditionalProperties::Schema(value)) => {
                assert_eq!(value.schema_type, Some(JsonType::Number))
            }
            other => panic!("unexpected additionalProperties {:?}", other),
        }

        assert_eq!(ir.schema("Unique").unwrap().unique_items, Some(true));
    }

    #[test]
    fn test_enum_and_exclude() {
        let output = parse(
            r#"import { z } from "zod";
const Role = z.enum(["admin", "user", "guest"]);
const Member = z.enum(["admin", "user", "guest"]).exclude(["guest"]);
"#,
        );
        let ir = &output.ir;
        assert_eq!(
            ir.schema("Member").unwrap().enum_values,
            Some(vec![json!("admin"), json!("user")])
        );
        let role = &ir.enums["Role"];
        assert_eq!(role.values.len(), 3);
        assert_eq!(role.value_type, Some(JsonType::String));
    }
}
