//! `intersection(a, b)`

use super::{Dispatcher, LowerContext, NodeHandler};
use crate::ir::SchemaNode;
use crate::zod::chain::Call;
use crate::zod::{ParseFailure, ParseResult};

pub struct IntersectionHandler;

impl NodeHandler for IntersectionHandler {
    fn name(&self) -> &'static str {
        "intersection"
    }

    fn base_calls(&self) -> &'static [&'static str] {
        &["intersection"]
    }

    fn build(&self, base: &Call, cx: LowerContext, dispatcher: &Dispatcher) -> ParseResult<SchemaNode> {
        if base.args.len() != 2 {
            return Err(ParseFailure::new("`intersection` expects exactly two schemas").at(base.location));
        }
        let members = base
            .args
            .iter()
            .map(|arg| dispatcher.lower(arg.node, cx.child()))
            .collect::<ParseResult<Vec<_>>>()?;
        Ok(SchemaNode {
            all_of: Some(members),
            ..Default::default()
        })
    }
}
