//! `union` and `discriminatedUnion`

use tree_sitter::Node;

use super::{Dispatcher, LowerContext, NodeHandler};
use crate::ir::{Discriminator, SchemaNode};
use crate::zod::chain::Call;
use crate::zod::syntax::{named_children, unwrap_expression};
use crate::zod::{ParseFailure, ParseResult};

pub struct UnionHandler;

impl NodeHandler for UnionHandler {
    fn name(&self) -> &'static str {
        "union"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &["union", "discriminatedUnion"]
    }

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        if base.name == "discriminatedUnion" {
            let key = base.arg(0).and_then(|arg| arg.as_str()).ok_or_else(|| {
                ParseFailure::new("`discriminatedUnion` expects a discriminator key").at(base.location)
            })?;
            let options = base.arg(1).map(|arg| arg.node).ok_or_else(|| {
                ParseFailure::new("`discriminatedUnion` expects an options array").at(base.location)
            })?;
            return Ok(SchemaNode {
                one_of: Some(members(options, cx, dispatcher)?),
                discriminator: Some(Discriminator {
                    property_name: key.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        let options = base.arg(0).map(|arg| arg.node).ok_or_else(|| {
            ParseFailure::new("`union` expects an options array").at(base.location)
        })?;
        Ok(SchemaNode {
            any_of: Some(members(options, cx, dispatcher)?),
            ..Default::default()
        })
    }
}

/// Lower each element of an array literal of schemas
pub(crate) fn members(array: Node, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<Vec<SchemaNode>> {
    let array = unwrap_expression(array);
    if array.kind() != "array" {
        return Err(ParseFailure::new("expected an array literal of schemas").at_node(&array, cx.source));
    }
    named_children(&array)
        .into_iter()
        .map(|element| dispatcher.lower(element, cx.child()))
        .collect()
}
