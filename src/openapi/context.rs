//! Build context threaded through every recursive lowering call

use serde_json::Value;

use crate::error::{IrError, Result};

/// Per-call build state. Children are derived, never mutated in place.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    /// The whole source document, for reference lookups
    pub root: &'a Value,
    path: Vec<String>,
    /// Whether the node being lowered is required by its parent
    pub required: bool,
    /// Nesting depth below the component or operation root
    pub depth: usize,
    pub max_depth: usize,
}

impl<'a> BuildContext<'a> {
    pub fn new(root: &'a Value, max_depth: usize) -> Self {
        Self {
            root,
            path: Vec::new(),
            required: true,
            depth: 0,
            max_depth,
        }
    }

    /// Context for a fresh root at `tokens` (a component or operation)
    pub fn at(&self, tokens: &[&str]) -> Self {
        Self {
            root: self.root,
            path: tokens.iter().map(|t| t.to_string()).collect(),
            required: true,
            depth: 0,
            max_depth: self.max_depth,
        }
    }

    /// Same depth, one more path token. Used for keyword hops such as
    /// `properties` that do not nest a schema on their own.
    pub fn token(&self, token: &str) -> Self {
        let mut next = self.clone();
        next.path.push(token.to_string());
        next
    }

    /// One level deeper at `token`, required by default
    pub fn child(&self, token: &str) -> Self {
        let mut next = self.token(token);
        next.depth += 1;
        next.required = true;
        next
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Fails once the nesting ceiling is crossed
    pub fn check_depth(&self) -> Result<()> {
        if self.depth > self.max_depth {
            return Err(IrError::RecursionLimit {
                limit: self.max_depth,
                path: self.path(),
            });
        }
        Ok(())
    }

    /// JSON pointer of the current location, `#/a/b~1c`
    pub fn path(&self) -> String {
        let mut out = String::from("#");
        for token in &self.path {
            out.push('/');
            out.push_str(&token.replace('~', "~0").replace('/', "~1"));
        }
        out
    }

    pub fn shape_error(&self, reason: impl Into<String>) -> IrError {
        IrError::UnknownSchemaShape {
            path: self.path(),
            reason: reason.into(),
        }
    }
}
