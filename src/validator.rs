//! Checks values against a [`TypeSpec`].
//!
//! Validation is total for well-formed specs: every mismatch is `Ok(false)`.
//! The only error is reaching an `Unresolved` node, which means the upstream
//! analysis is broken rather than that the value is bad.

use serde_json::Value;

use crate::error::{FuzzError, Result};
use crate::spec::{Args, TypeKind, TypeSpec};

/// Validates a whole argument list. Missing trailing arguments count as omitted.
pub fn validate_args(args: &Args, specs: &[TypeSpec]) -> Result<bool> {
    if args.len() > specs.len() {
        return Ok(false);
    }
    for (i, spec) in specs.iter().enumerate() {
        let value = args.get(i).and_then(|v| v.as_ref());
        if !validate(value, spec)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Validates an optional value; `None` means absent.
pub fn validate(value: Option<&Value>, spec: &TypeSpec) -> Result<bool> {
    if spec.is_no_input() {
        return Ok(value.is_none());
    }
    if let TypeKind::Unresolved = spec.kind() {
        return Err(FuzzError::Unresolved {
            name: spec.name().to_string(),
        });
    }
    match value {
        None => Ok(spec.is_optional()),
        Some(v) => validate_value(v, spec),
    }
}

/// Validates a present value, ignoring the type's own optionality.
pub fn validate_value(value: &Value, spec: &TypeSpec) -> Result<bool> {
    validate_dims(value, spec, 0)
}

fn validate_dims(value: &Value, spec: &TypeSpec, depth: usize) -> Result<bool> {
    let Some(length) = spec.dimension_lengths().get(depth) else {
        return validate_element(value, spec);
    };
    let Value::Array(items) = value else {
        return Ok(false);
    };
    if !length.contains(&items.len()) {
        return Ok(false);
    }
    for item in items {
        if !validate_dims(item, spec, depth + 1)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn validate_element(value: &Value, spec: &TypeSpec) -> Result<bool> {
    match spec.kind() {
        TypeKind::Number(n) => Ok(value.as_f64().is_some_and(|x| n.accepts(x))),
        TypeKind::String(s) => Ok(value.as_str().is_some_and(|x| s.accepts(x))),
        TypeKind::Boolean(b) => Ok(value.as_bool().is_some_and(|x| b.accepts(x))),
        TypeKind::Object(children) => {
            let Value::Object(map) = value else {
                return Ok(false);
            };
            if map.keys().any(|k| !children.iter().any(|c| c.name() == k.as_str())) {
                return Ok(false);
            }
            for child in children {
                if !validate(map.get(child.name()), child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        TypeKind::Union(_) => Ok(matching_branch(value, spec)?.is_some()),
        TypeKind::Literal(constant) => Ok(literal_matches(value, constant)),
        TypeKind::Unresolved => Err(FuzzError::Unresolved {
            name: spec.name().to_string(),
        }),
    }
}

/// Index of the first eligible union alternative that accepts `value`.
pub(crate) fn matching_branch(value: &Value, spec: &TypeSpec) -> Result<Option<usize>> {
    for (i, branch) in spec.children().iter().enumerate() {
        if branch.is_no_input() {
            continue;
        }
        if validate_value(value, branch)? {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn literal_matches(value: &Value, constant: &Value) -> bool {
    match (value, constant) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (a, b) => a == b,
    }
}
