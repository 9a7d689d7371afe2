//! Scalar factories: `string`, `number`, `boolean`, `literal` and friends

use super::{Dispatcher, LowerContext, NodeHandler};
use crate::ir::{JsonType, SchemaNode};
use crate::zod::chain::Call;
use crate::zod::constraints::format_for;
use crate::zod::{ParseFailure, ParseResult};

pub struct PrimitiveHandler;

impl NodeHandler for PrimitiveHandler {
    fn name(&self) -> &'static str {
        "primitive"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &[
            "string", "number", "bigint", "boolean", "date", "null", "undefined", "void", "any",
            "unknown", "never", "nan", "literal", "int", "int32", "int64", "float32", "float64",
            // Top-level string formats
            "email", "url", "uuid", "guid", "cuid", "cuid2", "ulid", "emoji", "base64",
            "base64url", "nanoid", "ipv4", "ipv6", "cidrv4", "cidrv6",
        ]
    }

    fn build(&self, base: &Call, _cx: LowerContext, _dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        let node = match base.name.as_str() {
            "string" => SchemaNode::of_type(JsonType::String),
            "number" | "float64" => SchemaNode::of_type(JsonType::Number),
            "float32" => with_format(JsonType::Number, "float"),
            "int" => SchemaNode::of_type(JsonType::Integer),
            "int32" => with_format(JsonType::Integer, "int32"),
            "bigint" | "int64" => with_format(JsonType::Integer, "int64"),
            "boolean" => SchemaNode::of_type(JsonType::Boolean),
            "date" => with_format(JsonType::String, "date-time"),
            "null" => SchemaNode::of_type(JsonType::Null),
            "any" | "unknown" => SchemaNode::default(),
            "undefined" | "void" => {
                let mut node = SchemaNode::default();
                node.metadata.validation_chain.validations.push(base.name.clone());
                node
            }
            "never" => SchemaNode {
                enum_values: Some(Vec::new()),
                ..Default::default()
            },
            "nan" => {
                let mut node = SchemaNode::of_type(JsonType::Number);
                node.metadata.validation_chain.validations.push("nan".to_string());
                node
            }
            "literal" => {
                let value = base.arg(0).and_then(|arg| arg.value.clone()).ok_or_else(|| {
                    ParseFailure::new("`literal` expects a literal value").at(base.location)
                })?;
                SchemaNode {
                    schema_type: Some(JsonType::of_value(&value)),
                    const_value: Some(value),
                    ..Default::default()
                }
            }
            other => match format_for(other) {
                Some(format) => with_format(JsonType::String, format),
                None => {
                    return Err(ParseFailure::new(format!("unsupported primitive `{}`", other))
                        .at(base.location))
                }
            },
        };
        Ok(node)
    }
}

fn with_format(schema_type: JsonType, format: &str) -> SchemaNode {
    SchemaNode {
        format: Some(format.to_string()),
        ..SchemaNode::of_type(schema_type)
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::JsonType;
    use crate::zod::parse;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        let output = parse(
            r#"import { z } from "zod";
const S = z.string();
const I = z.number().int();
const B = z.bigint();
const D = z.date();
const L = z.literal("admin");
const E = z.email();
"#,
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let ir = &output.ir;
        assert_eq!(ir.schema("S").unwrap().schema_type, Some(JsonType::String));
        assert_eq!(ir.schema("I").unwrap().schema_type, Some(JsonType::Integer));
        assert_eq!(ir.schema("B").unwrap().format.as_deref(), Some("int64"));
        assert_eq!(ir.schema("D").unwrap().format.as_deref(), Some("date-time"));
        let literal = ir.schema("L").unwrap();
        assert_eq!(literal.const_value, Some(json!("admin")));
        assert_eq!(literal.schema_type, Some(JsonType::String));
        assert_eq!(ir.schema("E").unwrap().format.as_deref(), Some("email"));
    }

    #[test]
    fn test_literal_requires_static_value() {
        let output = parse(
            r#"import { z } from "zod";
const role = "admin";
const L = z.literal(role);
"#,
        );
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.ir.schema("L").is_none());
    }
}
