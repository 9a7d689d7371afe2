//! References between declarations: identifiers, `lazy`, `nativeEnum`

use serde_json::Value;
use tree_sitter::Node;

use super::{required_arg, Dispatcher, LowerContext, NodeHandler};
use crate::ir::{schema_ref, JsonType, SchemaNode};
use crate::zod::chain::Call;
use crate::zod::syntax::{literal_value, named_children, property_key, text, unwrap_expression};
use crate::zod::{ParseFailure, ParseResult};

pub struct ReferenceHandler;

impl NodeHandler for ReferenceHandler {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &["lazy", "nativeEnum"]
    }

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        let arg = unwrap_expression(required_arg(base)?);
        match base.name.as_str() {
            "lazy" => {
                let body = lazy_body(&arg).ok_or_else(|| {
                    ParseFailure::new("`lazy` expects a function returning a schema").at_node(&arg, cx.source)
                })?;
                dispatcher.lower(body, cx)
            }
            _ if arg.kind() == "identifier" => native_enum(&arg, cx),
            _ => Err(ParseFailure::new("`nativeEnum` expects an enum identifier").at_node(&arg, cx.source)),
        }
    }
}

/// Reference to a schema component by declaration name
pub fn identifier(name: &str) -> SchemaNode {
    SchemaNode::reference(schema_ref(name))
}

/// Returned expression of `() => expr` or `() => { return expr; }`
fn lazy_body<'t>(function: &Node<'t>) -> Option<Node<'t>> {
    if !matches!(function.kind(), "arrow_function" | "function_expression" | "function") {
        return None;
    }
    let body = function.child_by_field_name("body")?;
    if body.kind() != "statement_block" {
        return Some(body);
    }
    named_children(&body)
        .into_iter()
        .find(|statement| statement.kind() == "return_statement")
        .and_then(|statement| named_children(&statement).into_iter().next())
}

/// Members of a same-file TypeScript enum or `as const` object. Anything
/// declared elsewhere stays a reference.
pub(crate) fn native_enum(ident: &Node, cx: LowerContext) -> ParseResult<SchemaNode> {
    let name = text(ident, cx.source);
    let values = match find_enum_values(cx.root, cx.source, name) {
        Some(values) => values,
        None => return Ok(identifier(name)),
    };

    let schema_type = match values.first().map(JsonType::of_value) {
        Some(first) if values.iter().all(|v| JsonType::of_value(v) == first) => Some(first),
        _ => None,
    };
    Ok(SchemaNode {
        schema_type,
        enum_values: Some(values),
        ..Default::default()
    })
}

fn find_enum_values(root: Node, source: &str, name: &str) -> Option<Vec<Value>> {
    for statement in named_children(&root) {
        let declaration = match statement.kind() {
            "export_statement" => match statement.child_by_field_name("declaration") {
                Some(declaration) => declaration,
                None => continue,
            },
            _ => statement,
        };
        match declaration.kind() {
            "enum_declaration" => {
                let declared = declaration.child_by_field_name("name");
                if declared.is_some_and(|d| text(&d, source) == name) {
                    return enum_body_values(&declaration.child_by_field_name("body")?, source);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(&declaration) {
                    let matches = declarator
                        .child_by_field_name("name")
                        .is_some_and(|n| text(&n, source) == name);
                    if !matches {
                        continue;
                    }
                    return match literal_value(declarator.child_by_field_name("value")?, source)? {
                        Value::Object(members) => Some(members.into_iter().map(|(_, v)| v).collect()),
                        _ => None,
                    };
                }
            }
            _ => {}
        }
    }
    None
}

/// Numeric members without an initializer count up from the previous one
fn enum_body_values(body: &Node, source: &str) -> Option<Vec<Value>> {
    let mut values = Vec::new();
    let mut next: i64 = 0;
    for member in named_children(body) {
        match member.kind() {
            "enum_assignment" => {
                let value = literal_value(member.child_by_field_name("value")?, source)?;
                if let Some(n) = value.as_i64() {
                    next = n + 1;
                }
                values.push(value);
            }
            _ if property_key(&member, source).is_some() => {
                values.push(Value::from(next));
                next += 1;
            }
            _ => {}
        }
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use crate::ir::JsonType;
    use crate::zod::parse;
    use serde_json::json;

    #[test]
    fn test_lazy_self_reference_is_circular() {
        let output = parse(
            r#"import { z } from "zod";
const Category = z.object({
  name: z.string(),
  children: z.lazy(() => Category.array()),
});
"#,
        );
        assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
        let category = output.ir.schema("Category").unwrap();
        assert_eq!(
            category.metadata.circular_references,
            vec!["#/components/schemas/Category"]
        );
        assert_eq!(output.ir.dependency_graph.circular_references, vec!["Category"]);
        let children = category.properties.as_ref().unwrap().get("children").unwrap();
        assert_eq!(children.schema_type, Some(JsonType::Array));
    }

    #[test]
    fn test_lazy_block_body() {
        let output = parse(
            r#"import { z } from "zod";
const Node = z.lazy(() => {
  return z.object({ next: Node.optional() });
});
"#,
        );
        let node = output.ir.schema("Node").unwrap();
        assert!(node.properties.as_ref().unwrap().contains("next"));
        assert!(node.required.is_none());
    }

    #[test]
    fn test_native_enum() {
        let output = parse(
            r#"import { z } from "zod";
enum Level { Low, Mid = 5, High }
const Colors = { Red: "red", Blue: "blue" } as const;
const L = z.nativeEnum(Level);
const C = z.nativeEnum(Colors);
const External = z.nativeEnum(Imported);
"#,
        );
        let ir = &output.ir;
        assert_eq!(ir.schema("L").unwrap().enum_values, Some(vec![json!(0), json!(5), json!(6)]));
        let colors = ir.schema("C").unwrap();
        assert_eq!(colors.enum_values, Some(vec![json!("red"), json!("blue")]));
        assert_eq!(colors.schema_type, Some(JsonType::String));
        assert!(ir.schema("External").unwrap().is_reference());
    }
}
