//! Method-chain extraction
//!
//! `z.string().min(1).optional()` is a nest of call and member expressions.
//! Unwinding it from the outside in yields the base call (`string`) and the
//! chained calls in source order.

use serde_json::Value;
use tree_sitter::Node;

use super::diagnostics::SourceLocation;
use super::syntax::{arguments, literal_value, text, unwrap_expression, Binding, Bindings};

/// One argument: the syntax node plus its value when statically known
#[derive(Debug, Clone)]
pub struct Arg<'t> {
    pub node: Node<'t>,
    pub value: Option<Value>,
}

impl<'t> Arg<'t> {
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value.as_ref().and_then(Value::as_f64)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value.as_ref().and_then(Value::as_u64)
    }
}

/// A call in the chain
#[derive(Debug, Clone)]
pub struct Call<'t> {
    pub name: String,
    pub args: Vec<Arg<'t>>,
    /// Position of the method name
    pub location: SourceLocation,
    pub node: Node<'t>,
}

impl<'t> Call<'t> {
    pub fn arg(&self, index: usize) -> Option<&Arg<'t>> {
        self.args.get(index)
    }
}

/// Where a chain starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainOrigin {
    /// A builder factory call such as `z.string()`
    Builder,
    /// A bare identifier such as `User` in `User.optional()`
    Identifier(String),
    /// Anything else
    Other,
}

#[derive(Debug, Clone)]
pub struct MethodChain<'t> {
    pub origin: ChainOrigin,
    /// Builder factory call, for `Builder` origins
    pub base: Option<Call<'t>>,
    /// `z.coerce.number()`
    pub coerce: bool,
    pub calls: Vec<Call<'t>>,
    /// Root identifier node, for `Identifier` origins
    pub root: Option<Node<'t>>,
}

impl<'t> MethodChain<'t> {
    fn other() -> Self {
        Self {
            origin: ChainOrigin::Other,
            base: None,
            coerce: false,
            calls: Vec::new(),
            root: None,
        }
    }

    pub fn is_builder(&self) -> bool {
        self.origin == ChainOrigin::Builder
    }

    pub fn base_name(&self) -> Option<&str> {
        self.base.as_ref().map(|b| b.name.as_str())
    }

    pub fn has_call(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c.name == name)
    }
}

/// Unwind an expression into a method chain
pub fn extract<'t>(node: Node<'t>, source: &str, bindings: &Bindings) -> MethodChain<'t> {
    let mut calls = Vec::new();
    let mut current = unwrap_expression(node);

    let mut chain = loop {
        match current.kind() {
            "call_expression" => {
                let Some(function) = current.child_by_field_name("function") else {
                    break MethodChain::other();
                };
                let args = collect_args(&current, source);
                let function = unwrap_expression(function);

                match function.kind() {
                    "member_expression" => {
                        let (Some(object), Some(property)) = (
                            function.child_by_field_name("object"),
                            function.child_by_field_name("property"),
                        ) else {
                            break MethodChain::other();
                        };
                        let call = Call {
                            name: text(&property, source).to_string(),
                            args,
                            location: SourceLocation::of(&property, source),
                            node: current,
                        };
                        let object = unwrap_expression(object);
                        if let Some(coerce) = namespace_root(&object, source, bindings) {
                            break MethodChain {
                                origin: ChainOrigin::Builder,
                                base: Some(call),
                                coerce,
                                calls: Vec::new(),
                                root: None,
                            };
                        }
                        calls.push(call);
                        current = object;
                    }
                    "identifier" => match bindings.resolve(&function, source) {
                        Some(Binding::Factory(name)) => {
                            break MethodChain {
                                origin: ChainOrigin::Builder,
                                base: Some(Call {
                                    name,
                                    args,
                                    location: SourceLocation::of(&function, source),
                                    node: current,
                                }),
                                coerce: false,
                                calls: Vec::new(),
                                root: None,
                            };
                        }
                        _ => break MethodChain::other(),
                    },
                    _ => break MethodChain::other(),
                }
            }
            "identifier" => {
                // A bare builder namespace is not a schema
                if bindings.resolve(&current, source).is_some() {
                    break MethodChain::other();
                }
                break MethodChain {
                    origin: ChainOrigin::Identifier(text(&current, source).to_string()),
                    base: None,
                    coerce: false,
                    calls: Vec::new(),
                    root: Some(current),
                };
            }
            _ => break MethodChain::other(),
        }
    };

    if chain.origin != ChainOrigin::Other {
        calls.reverse();
        chain.calls = calls;
    }
    chain
}

/// `Some(coerce)` when `object` is the builder namespace (`z`) or its coerce
/// member (`z.coerce`)
fn namespace_root(object: &Node, source: &str, bindings: &Bindings) -> Option<bool> {
    match object.kind() {
        "identifier" => match bindings.resolve(object, source)? {
            Binding::Namespace => Some(false),
            Binding::Factory(_) => None,
        },
        "member_expression" => {
            let property = object.child_by_field_name("property")?;
            let inner = unwrap_expression(object.child_by_field_name("object")?);
            let is_coerce = text(&property, source) == "coerce";
            (is_coerce && namespace_root(&inner, source, bindings) == Some(false)).then_some(true)
        }
        _ => None,
    }
}

fn collect_args<'t>(call: &Node<'t>, source: &str) -> Vec<Arg<'t>> {
    arguments(call.child_by_field_name("arguments"))
        .into_iter()
        .map(|node| Arg {
            node,
            value: literal_value(node, source),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;
    use crate::zod::syntax::{find_descendant, parse_tree};

    fn chain_of(source: &str, check: impl Fn(&MethodChain)) {
        let tree = parse_tree(source).unwrap();
        let bindings = Bindings::collect(&tree.root_node(), source, &ParseConfig::default());
        let declarator =
            find_descendant(tree.root_node(), &|n| n.kind() == "variable_declarator").unwrap();
        let value = declarator.child_by_field_name("value").unwrap();
        check(&extract(value, source, &bindings));
    }

    #[test]
    fn test_builder_chain() {
        chain_of(
            "import { z } from 'zod';\nconst Name = z.string().min(1, 'required').optional();",
            |chain| {
                assert!(chain.is_builder());
                assert_eq!(chain.base_name(), Some("string"));
                let names: Vec<_> = chain.calls.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["min", "optional"]);
                assert_eq!(chain.calls[0].arg(0).and_then(Arg::as_u64), Some(1));
                assert_eq!(chain.calls[0].arg(1).and_then(Arg::as_str), Some("required"));
                assert_eq!(chain.calls[0].location, SourceLocation::new(2, 25));
            },
        );
    }

    #[test]
    fn test_coerce() {
        chain_of("import { z } from 'zod';\nconst N = z.coerce.number().int();", |chain| {
            assert!(chain.is_builder());
            assert!(chain.coerce);
            assert_eq!(chain.base_name(), Some("number"));
        });
    }

    #[test]
    fn test_identifier_origin() {
        chain_of("import { z } from 'zod';\nconst Admin = (User).array();", |chain| {
            assert_eq!(chain.origin, ChainOrigin::Identifier("User".into()));
            assert_eq!(chain.calls.len(), 1);
        });
    }

    #[test]
    fn test_non_builder_call() {
        chain_of("import { z } from 'zod';\nconst X = other.string().min(1);", |chain| {
            assert_eq!(chain.origin, ChainOrigin::Identifier("other".into()));
        });
        chain_of("import { z } from 'zod';\nconst X = makeSchema();", |chain| {
            assert_eq!(chain.origin, ChainOrigin::Other);
        });
    }
}
