//! Constraint extraction tables
//!
//! Chain methods are mapped to IR constraint fields by the JSON type of the
//! node they are applied to. A method outside the table for the current type
//! is left for the other handlers.

use super::chain::{Arg, Call};
use super::syntax::{named_children, text};
use super::ParseFailure;
use crate::ir::{JsonType, SchemaNode};

/// String helper methods that set `format`
const FORMATS: &[(&str, &str)] = &[
    ("email", "email"),
    ("url", "uri"),
    ("uuid", "uuid"),
    ("guid", "uuid"),
    ("cuid", "cuid"),
    ("cuid2", "cuid2"),
    ("ulid", "ulid"),
    ("datetime", "date-time"),
    ("date", "date"),
    ("time", "time"),
    ("ip", "ip"),
    ("ipv4", "ipv4"),
    ("ipv6", "ipv6"),
    ("emoji", "emoji"),
    ("base64", "base64"),
    ("base64url", "base64url"),
    ("nanoid", "nanoid"),
    ("duration", "duration"),
    ("cidr", "cidr"),
    ("cidrv4", "cidrv4"),
    ("cidrv6", "cidrv6"),
];

/// `format` string for a string helper method
pub fn format_for(method: &str) -> Option<&'static str> {
    FORMATS
        .iter()
        .find(|(name, _)| *name == method)
        .map(|(_, format)| *format)
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MultipleOf,
}

const NUMBER_BOUNDS: &[(&str, Bound)] = &[
    ("min", Bound::Minimum),
    ("gte", Bound::Minimum),
    ("max", Bound::Maximum),
    ("lte", Bound::Maximum),
    ("gt", Bound::ExclusiveMinimum),
    ("lt", Bound::ExclusiveMaximum),
    ("multipleOf", Bound::MultipleOf),
    ("step", Bound::MultipleOf),
];

/// Sign methods and the zero bound they set
const SIGN_BOUNDS: &[(&str, Bound)] = &[
    ("positive", Bound::ExclusiveMinimum),
    ("nonnegative", Bound::Minimum),
    ("negative", Bound::ExclusiveMaximum),
    ("nonpositive", Bound::Maximum),
];

#[derive(Debug, Clone, Copy)]
enum Length {
    Min,
    Max,
    Exact,
}

const LENGTHS: &[(&str, Length)] = &[
    ("min", Length::Min),
    ("max", Length::Max),
    ("length", Length::Exact),
];

/// Apply a constraint method. `Ok(false)` when the method is not a
/// constraint for the node's current type.
pub fn apply(node: &mut SchemaNode, call: &Call, source: &str) -> Result<bool, ParseFailure> {
    match node.schema_type {
        Some(JsonType::String) => apply_string(node, call, source),
        Some(JsonType::Number) | Some(JsonType::Integer) => apply_number(node, call),
        Some(JsonType::Array) => apply_array(node, call),
        _ => Ok(false),
    }
}

fn apply_string(node: &mut SchemaNode, call: &Call, source: &str) -> Result<bool, ParseFailure> {
    let name = call.name.as_str();

    if let Some((_, length)) = LENGTHS.iter().find(|(n, _)| *n == name) {
        let value = count_arg(call)?;
        set_length(&mut node.min_length, &mut node.max_length, *length, value);
        return Ok(true);
    }
    if name == "nonempty" {
        node.min_length = Some(1);
        return Ok(true);
    }
    if let Some(format) = format_for(name) {
        node.format = Some(format.to_string());
        return Ok(true);
    }

    let pattern = match name {
        "startsWith" => format!("^{}", regex::escape(string_arg(call)?)),
        "endsWith" => format!("{}$", regex::escape(string_arg(call)?)),
        "includes" => regex::escape(string_arg(call)?),
        "regex" => regex_arg(call, source)?,
        _ => return Ok(false),
    };
    add_pattern(node, pattern);
    Ok(true)
}

fn apply_number(node: &mut SchemaNode, call: &Call) -> Result<bool, ParseFailure> {
    let name = call.name.as_str();

    if let Some((_, bound)) = NUMBER_BOUNDS.iter().find(|(n, _)| *n == name) {
        let value = number_arg(call)?;
        set_bound(node, *bound, value);
        return Ok(true);
    }
    if let Some((_, bound)) = SIGN_BOUNDS.iter().find(|(n, _)| *n == name) {
        set_bound(node, *bound, 0.0);
        return Ok(true);
    }
    if name == "int" {
        node.schema_type = Some(JsonType::Integer);
        return Ok(true);
    }
    Ok(false)
}

fn apply_array(node: &mut SchemaNode, call: &Call) -> Result<bool, ParseFailure> {
    let name = call.name.as_str();

    if let Some((_, length)) = LENGTHS.iter().find(|(n, _)| *n == name) {
        let value = count_arg(call)?;
        set_length(&mut node.min_items, &mut node.max_items, *length, value);
        return Ok(true);
    }
    if name == "nonempty" {
        node.min_items = Some(1);
        return Ok(true);
    }
    Ok(false)
}

fn set_bound(node: &mut SchemaNode, bound: Bound, value: f64) {
    let slot = match bound {
        Bound::Minimum => &mut node.minimum,
        Bound::Maximum => &mut node.maximum,
        Bound::ExclusiveMinimum => &mut node.exclusive_minimum,
        Bound::ExclusiveMaximum => &mut node.exclusive_maximum,
        Bound::MultipleOf => &mut node.multiple_of,
    };
    *slot = Some(value);
}

fn set_length(min: &mut Option<u64>, max: &mut Option<u64>, length: Length, value: u64) {
    match length {
        Length::Min => *min = Some(value),
        Length::Max => *max = Some(value),
        Length::Exact => {
            *min = Some(value);
            *max = Some(value);
        }
    }
}

/// The first pattern becomes `pattern`; later ones are kept as validations
fn add_pattern(node: &mut SchemaNode, pattern: String) {
    if node.pattern.is_none() {
        node.pattern = Some(pattern);
    } else {
        node.metadata
            .validation_chain
            .validations
            .push(format!("pattern:{}", pattern));
    }
}

fn first_arg<'c, 't>(call: &'c Call<'t>) -> Result<&'c Arg<'t>, ParseFailure> {
    call.arg(0).ok_or_else(|| {
        ParseFailure::new(format!("`{}` expects an argument", call.name)).at(call.location)
    })
}

fn number_arg(call: &Call) -> Result<f64, ParseFailure> {
    first_arg(call)?.as_f64().ok_or_else(|| {
        ParseFailure::new(format!("`{}` expects a numeric literal", call.name)).at(call.location)
    })
}

fn count_arg(call: &Call) -> Result<u64, ParseFailure> {
    first_arg(call)?.as_u64().ok_or_else(|| {
        ParseFailure::new(format!("`{}` expects a non-negative integer literal", call.name))
            .at(call.location)
    })
}

fn string_arg<'c>(call: &'c Call) -> Result<&'c str, ParseFailure> {
    first_arg(call)?.as_str().ok_or_else(|| {
        ParseFailure::new(format!("`{}` expects a string literal", call.name)).at(call.location)
    })
}

/// Pattern text of a regex literal argument
fn regex_arg(call: &Call, source: &str) -> Result<String, ParseFailure> {
    let arg = first_arg(call)?;
    if arg.node.kind() != "regex" {
        return Err(ParseFailure::new("`regex` expects a regular expression literal").at(call.location));
    }
    named_children(&arg.node)
        .into_iter()
        .find(|child| child.kind() == "regex_pattern")
        .map(|pattern| text(&pattern, source).to_string())
        .ok_or_else(|| ParseFailure::new("empty regular expression").at(call.location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table() {
        assert_eq!(format_for("url"), Some("uri"));
        assert_eq!(format_for("datetime"), Some("date-time"));
        assert_eq!(format_for("email"), Some("email"));
        assert_eq!(format_for("min"), None);
    }

    #[test]
    fn test_second_pattern_is_a_validation() {
        let mut node = SchemaNode::of_type(JsonType::String);
        add_pattern(&mut node, "^a".into());
        add_pattern(&mut node, "b$".into());
        assert_eq!(node.pattern.as_deref(), Some("^a"));
        assert_eq!(node.metadata.validation_chain.validations, vec!["pattern:b$"]);
    }

    #[test]
    fn test_exact_length() {
        let (mut min, mut max) = (None, None);
        set_length(&mut min, &mut max, Length::Exact, 4);
        assert_eq!((min, max), (Some(4), Some(4)));
    }
}
