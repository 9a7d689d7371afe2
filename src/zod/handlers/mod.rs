//! Node handler dispatch
//!
//! Each handler owns a set of builder factory calls (`string`, `object`,
//! `union`, ...) and the chain methods that only make sense for the node
//! kinds it builds. The [`Dispatcher`] is built once per [`Parser`] and is
//! handed to handlers by reference so they can lower nested members.
//!
//! [`Parser`]: super::Parser

pub mod composition;
pub mod intersection;
pub mod object;
pub mod primitive;
pub mod reference;
pub mod union;

use indexmap::IndexSet;
use serde_json::Value;
use std::collections::HashMap;
use tree_sitter::Node;

use super::chain::{extract, Call, ChainOrigin};
use super::constraints;
use super::syntax::{text, Bindings};
use super::{ParseFailure, ParseResult};
use crate::ir::{JsonType, SchemaNode};

// =============================================================================
// Lowering Context
// =============================================================================

/// Per-declaration lowering state, copied down the recursion
#[derive(Clone, Copy)]
pub struct LowerContext<'a, 't> {
    pub source: &'a str,
    pub bindings: &'a Bindings,
    /// Names of every schema declaration in the file
    pub declarations: &'a IndexSet<String>,
    /// Program node, for same-file lookups
    pub root: Node<'t>,
    pub depth: usize,
    pub max_depth: usize,
}

impl<'a, 't> LowerContext<'a, 't> {
    pub fn new(
        source: &'a str,
        bindings: &'a Bindings,
        declarations: &'a IndexSet<String>,
        root: Node<'t>,
        max_depth: usize,
    ) -> Self {
        Self {
            source,
            bindings,
            declarations,
            root,
            depth: 0,
            max_depth,
        }
    }

    pub fn child(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }

    fn check_depth(&self, node: &Node) -> ParseResult<()> {
        if self.depth > self.max_depth {
            return Err(ParseFailure::new(format!(
                "schema nesting exceeds the limit of {}",
                self.max_depth
            ))
            .at_node(node, self.source));
        }
        Ok(())
    }
}

// =============================================================================
// Chain State
// =============================================================================

/// The node under construction plus the pending presence marker
#[derive(Debug, Clone)]
pub struct ChainState {
    pub node: SchemaNode,
    pub optional: bool,
    pub nullable: bool,
}

impl ChainState {
    pub fn new(node: SchemaNode) -> Self {
        Self {
            nullable: node.metadata.nullable,
            node,
            optional: false,
        }
    }

    /// Flush the presence marker onto the current node, then replace the
    /// node with `wrap(node)`
    pub fn wrap(&mut self, wrap: impl FnOnce(SchemaNode) -> SchemaNode) {
        let mut inner = std::mem::take(&mut self.node);
        apply_presence(&mut inner, self.optional, self.nullable);
        self.optional = false;
        self.nullable = false;
        self.node = wrap(inner);
    }

    /// Node that takes annotations (`describe`, `default`, `readonly`). A
    /// `$ref` node is moved into a single-member `allOf` first so it keeps
    /// no fields besides the reference; the presence marker stays pending.
    pub fn annotated(&mut self) -> &mut SchemaNode {
        if self.node.is_reference() {
            let reference = std::mem::take(&mut self.node);
            self.node = SchemaNode {
                all_of: Some(vec![reference]),
                ..Default::default()
            };
        }
        &mut self.node
    }

    pub fn finish(mut self) -> SchemaNode {
        apply_presence(&mut self.node, self.optional, self.nullable);
        self.node
    }
}

fn apply_presence(node: &mut SchemaNode, optional: bool, nullable: bool) {
    node.metadata.required = !optional;
    node.metadata.nullable = nullable;
}

// =============================================================================
// Handler Trait
// =============================================================================

pub trait NodeHandler {
    fn name(&self) -> &'static str;

    /// Builder factory calls this handler builds
    fn base_calls(&self) -> &'static [&'static str];

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode>;

    /// Apply a kind-specific chain method. `Ok(false)` when the method is
    /// not one of this handler's.
    fn apply(
        &self,
        _state: &mut ChainState,
        _call: &Call,
        _cx: LowerContext,
        _dispatcher: &Dispatcher,
    ) -> ParseResult<bool> {
        Ok(false)
    }
}

/// Methods recorded as validation descriptors without changing the shape
const REFINEMENTS: &[&str] = &[
    "refine",
    "superRefine",
    "check",
    "transform",
    "pipe",
    "brand",
    "catch",
    "trim",
    "toLowerCase",
    "toUpperCase",
    "finite",
    "safe",
];

// =============================================================================
// Dispatcher
// =============================================================================

pub struct Dispatcher {
    handlers: Vec<Box<dyn NodeHandler>>,
    table: HashMap<&'static str, usize>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_handlers(vec![
            Box::new(primitive::PrimitiveHandler),
            Box::new(object::ObjectHandler),
            Box::new(union::UnionHandler),
            Box::new(intersection::IntersectionHandler),
            Box::new(composition::CompositionHandler),
            Box::new(reference::ReferenceHandler),
        ])
    }

    /// The first handler to claim a base call keeps it
    pub fn with_handlers(handlers: Vec<Box<dyn NodeHandler>>) -> Self {
        let mut table = HashMap::new();
        for (index, handler) in handlers.iter().enumerate() {
            for call in handler.base_calls() {
                table.entry(*call).or_insert(index);
            }
        }
        Self { handlers, table }
    }

    pub fn handler_for(&self, base: &str) -> Option<&dyn NodeHandler> {
        self.table.get(base).map(|&index| self.handlers[index].as_ref())
    }

    /// Lower one schema expression
    pub fn lower(&self, expr: Node, cx: LowerContext) -> ParseResult<SchemaNode> {
        cx.check_depth(&expr)?;
        let chain = extract(expr, cx.source, cx.bindings);

        let mut node = match &chain.origin {
            ChainOrigin::Builder => {
                let Some(base) = &chain.base else {
                    return Err(ParseFailure::new("builder chain without a factory call").at_node(&expr, cx.source));
                };
                let handler = self.handler_for(&base.name).ok_or_else(|| {
                    ParseFailure::new(format!("unsupported builder call `{}`", base.name))
                        .at(base.location)
                })?;
                handler.build(base, cx, self)?
            }
            ChainOrigin::Identifier(name) => reference::identifier(name),
            ChainOrigin::Other => {
                return Err(ParseFailure::new(format!(
                    "`{}` is not a schema expression",
                    snippet(text(&expr, cx.source))
                ))
                .at_node(&expr, cx.source));
            }
        };
        if chain.coerce {
            node.metadata.validation_chain.validations.push("coerce".to_string());
        }

        let mut state = ChainState::new(node);
        for call in &chain.calls {
            self.apply(&mut state, call, cx)?;
        }
        Ok(state.finish())
    }

    fn apply(&self, state: &mut ChainState, call: &Call, cx: LowerContext) -> ParseResult<()> {
        if self.apply_generic(state, call, cx)? {
            return Ok(());
        }
        if constraints::apply(&mut state.node, call, cx.source)? {
            return Ok(());
        }
        for handler in &self.handlers {
            if handler.apply(state, call, cx, self)? {
                return Ok(());
            }
        }
        Err(ParseFailure::new(format!("unknown method `{}`", call.name)).at(call.location))
    }

    /// Methods valid on every node kind
    fn apply_generic(&self, state: &mut ChainState, call: &Call, cx: LowerContext) -> ParseResult<bool> {
        match call.name.as_str() {
            "optional" => state.optional = true,
            "nullable" => state.nullable = true,
            "nullish" => {
                state.optional = true;
                state.nullable = true;
            }
            "default" | "prefault" => {
                state.optional = true;
                match call.arg(0).and_then(|arg| arg.value.clone()) {
                    Some(value) => state.annotated().default = Some(value),
                    None => {
                        let expr = call.arg(0).map(|arg| text(&arg.node, cx.source)).unwrap_or_default();
                        state
                            .node
                            .metadata
                            .validation_chain
                            .validations
                            .push(format!("default:{}", snippet(expr)));
                    }
                }
            }
            "describe" => {
                let description = call.arg(0).and_then(|arg| arg.as_str()).ok_or_else(|| {
                    ParseFailure::new("`describe` expects a string literal").at(call.location)
                })?;
                state.annotated().description = Some(description.to_string());
            }
            "array" => state.wrap(|inner| {
                let mut array = SchemaNode::of_type(JsonType::Array);
                array.items = Some(Box::new(inner));
                array
            }),
            "or" | "and" => {
                let other = self.lower(required_arg(call)?, cx.child())?;
                let union = call.name == "or";
                state.wrap(|inner| {
                    let mut combined = SchemaNode::default();
                    if union {
                        combined.any_of = Some(vec![inner, other]);
                    } else {
                        combined.all_of = Some(vec![inner, other]);
                    }
                    combined
                });
            }
            "readonly" => {
                let node = state.annotated();
                node.read_only = true;
                push_refinement(node, call);
            }
            name if REFINEMENTS.contains(&name) => push_refinement(&mut state.node, call),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// `name` or `name:literal` for refinement-style methods
fn push_refinement(node: &mut SchemaNode, call: &Call) {
    let descriptor = match call.arg(0).and_then(|arg| arg.value.as_ref()) {
        Some(Value::String(s)) => format!("{}:{}", call.name, s),
        Some(value) => format!("{}:{}", call.name, value),
        None => call.name.clone(),
    };
    node.metadata.validation_chain.validations.push(descriptor);
}

/// First argument node, or a failure naming the method
pub(crate) fn required_arg<'t>(call: &Call<'t>) -> ParseResult<Node<'t>> {
    call.arg(0)
        .map(|arg| arg.node)
        .ok_or_else(|| ParseFailure::new(format!("`{}` expects an argument", call.name)).at(call.location))
}

/// Short single-line excerpt of source text for messages
fn snippet(source: &str) -> String {
    let line = source.lines().next().unwrap_or_default();
    if line.chars().count() > 40 {
        format!("{}...", line.chars().take(40).collect::<String>())
    } else {
        line.to_string()
    }
}
