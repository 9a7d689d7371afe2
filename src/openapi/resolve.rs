//! Reference classification and component lookup

use serde_json::Value;
use tracing::debug;

use super::context::BuildContext;
use crate::error::{IrError, Result};
use crate::ir::{ComponentKind, ComponentRef, RefOrigin};

/// Outcome of resolving a `$ref`
#[derive(Debug)]
pub enum Resolved<'a> {
    /// A component of this document, with its raw definition
    Local { reference: ComponentRef, target: &'a Value },
    /// A bundler-lifted component; kept as a leaf and never followed
    External { reference: ComponentRef },
}

/// Parse a `$ref` string or fail with `InvalidReferenceFormat`
pub fn classify(cx: &BuildContext, reference: &str) -> Result<ComponentRef> {
    ComponentRef::parse(reference).ok_or_else(|| IrError::InvalidReferenceFormat {
        reference: reference.to_string(),
        path: cx.path(),
    })
}

/// Resolve a reference expected to point at a `kind` component.
///
/// Local targets must exist and must not be references themselves. Following
/// a chain of references back to an earlier one is reported as a circular
/// component reference rather than as a nested one.
pub fn resolve<'a>(
    cx: &BuildContext<'a>,
    reference: &str,
    kind: ComponentKind,
) -> Result<Resolved<'a>> {
    let parsed = classify(cx, reference)?;
    if parsed.kind != kind {
        return Err(IrError::UnsupportedReferenceTarget {
            reference: reference.to_string(),
            expected: kind.to_string(),
            found: parsed.kind.to_string(),
            path: cx.path(),
        });
    }

    if let RefOrigin::External { hash } = &parsed.origin {
        debug!(reference, hash = %hash, "Keeping external reference as leaf");
        return Ok(Resolved::External { reference: parsed });
    }

    let target = lookup(cx, reference, &parsed)?;
    if let Some(next) = target.get("$ref") {
        return Err(follow_chain(cx, reference, next));
    }

    Ok(Resolved::Local {
        reference: parsed,
        target,
    })
}

/// The `$ref` value of an object, if it has one
pub fn ref_of<'v>(cx: &BuildContext, value: &'v Value) -> Result<Option<&'v str>> {
    match value.get("$ref") {
        None => Ok(None),
        Some(Value::String(reference)) => Ok(Some(reference)),
        Some(_) => Err(cx.shape_error("$ref must be a string")),
    }
}

fn lookup<'a>(cx: &BuildContext<'a>, reference: &str, parsed: &ComponentRef) -> Result<&'a Value> {
    cx.root
        .pointer(&parsed.pointer())
        .ok_or_else(|| IrError::UnresolvedReference {
            reference: reference.to_string(),
            path: cx.path(),
        })
}

/// Walk a chain of references starting at `first` to decide between a
/// nested and a circular reference error
fn follow_chain(cx: &BuildContext, first: &str, next: &Value) -> IrError {
    let nested = || IrError::NestedReferenceNotBundled {
        reference: first.to_string(),
        path: cx.path(),
    };

    let mut chain = vec![first.to_string()];
    let mut current = next;
    loop {
        let Some(reference) = current.as_str() else {
            return nested();
        };
        if chain.iter().any(|seen| seen == reference) {
            chain.push(reference.to_string());
            return IrError::CircularComponentReference { chain, path: cx.path() };
        }
        chain.push(reference.to_string());

        let Some(parsed) = ComponentRef::parse(reference) else {
            return nested();
        };
        if parsed.is_external() {
            return nested();
        }
        match cx.root.pointer(&parsed.pointer()).and_then(|t| t.get("$ref")) {
            Some(following) => current = following,
            None => return nested(),
        }
    }
}
