//! JSON argument declarations, the shape an upstream type analyzer hands us.
//!
//! ```json
//! [
//!   { "name": "n", "type": "number", "integer": true,
//!     "intervals": [{ "min": 0, "max": 100 }] },
//!   { "name": "tags", "type": "string", "dims": 1,
//!     "dimLengths": [{ "min": 0, "max": 3 }], "charset": "abc" }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    BooleanSpec, Interval, NumberSpec, StringSpec, TypeKind, TypeSpec, TypeTag,
    DEFAULT_DIMENSION_LENGTH,
};
use crate::error::{FuzzError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: TypeTag,
    #[serde(default)]
    pub dims: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dim_lengths: Option<Vec<Interval<usize>>>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub no_input: bool,
    /// Typed by `type`: numbers, strings or booleans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervals: Option<Vec<Interval<Value>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<Interval<usize>>,
    /// Constant of a `literal`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ArgDecl>,
}

impl TypeSpec {
    /// Parses a JSON array of [`ArgDecl`]s into validated argument specs.
    pub fn from_json(json: &str) -> Result<Vec<TypeSpec>> {
        let decls: Vec<ArgDecl> = serde_json::from_str(json)?;
        Self::from_decls(&decls)
    }

    /// Builds one validated spec per declaration; offsets follow position.
    pub fn from_decls(decls: &[ArgDecl]) -> Result<Vec<TypeSpec>> {
        decls
            .iter()
            .enumerate()
            .map(|(offset, decl)| Ok(build(decl)?.at_offset(offset).validated()?))
            .collect()
    }
}

fn build(decl: &ArgDecl) -> Result<TypeSpec> {
    let name = decl.name.as_str();
    let kind = match decl.type_tag {
        TypeTag::Number => {
            let mut spec = NumberSpec::new();
            if let Some(ivs) = &decl.intervals {
                spec = spec.intervals(convert(name, ivs, |v| v.as_f64())?);
            }
            if let Some(integer) = decl.integer {
                spec = spec.integer(integer);
            }
            if let Some(signed) = decl.signed {
                spec = spec.signed(signed);
            }
            TypeKind::Number(spec)
        }
        TypeTag::String => {
            let mut spec = StringSpec::new();
            if let Some(charset) = &decl.charset {
                spec = spec.charset(charset);
            }
            if let Some(length) = decl.length {
                spec = spec.length(length.min, length.max);
            }
            if let Some(ivs) = &decl.intervals {
                spec = spec.intervals(convert(name, ivs, |v| v.as_str().map(str::to_string))?);
            }
            TypeKind::String(spec)
        }
        TypeTag::Boolean => {
            let mut spec = BooleanSpec::new();
            if let Some(ivs) = &decl.intervals {
                spec.intervals = convert(name, ivs, |v| v.as_bool())?;
            }
            TypeKind::Boolean(spec)
        }
        TypeTag::Object => TypeKind::Object(build_children(decl)?),
        TypeTag::Union => TypeKind::Union(build_children(decl)?),
        TypeTag::Literal => match &decl.value {
            Some(value) => TypeKind::Literal(value.clone()),
            None => return Err(FuzzError::config(name, "literal declaration has no value")),
        },
        TypeTag::Unresolved => TypeKind::Unresolved,
    };

    let dims = match &decl.dim_lengths {
        Some(lengths) if lengths.len() == decl.dims => lengths.clone(),
        Some(lengths) => {
            return Err(FuzzError::config(
                name,
                format!("{} dimension lengths given for {} dimensions", lengths.len(), decl.dims),
            ))
        }
        None => vec![DEFAULT_DIMENSION_LENGTH; decl.dims],
    };

    Ok(TypeSpec::new(name, kind)
        .dims(dims)
        .optional(decl.optional)
        .no_input(decl.no_input))
}

fn build_children(decl: &ArgDecl) -> Result<Vec<TypeSpec>> {
    decl.children.iter().map(build).collect()
}

fn convert<T>(
    name: &str,
    intervals: &[Interval<Value>],
    f: impl Fn(&Value) -> Option<T>,
) -> Result<Vec<Interval<T>>> {
    intervals
        .iter()
        .map(|iv| match (f(&iv.min), f(&iv.max)) {
            (Some(min), Some(max)) => Ok(Interval::new(min, max)),
            _ => Err(FuzzError::config(
                name,
                format!("interval bounds {} / {} do not match the declared type", iv.min, iv.max),
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_nested_declarations() {
        let json = r#"[
            { "name": "n", "type": "number", "integer": true,
              "intervals": [{ "min": 0, "max": 5 }] },
            { "name": "opts", "type": "object", "optional": true, "children": [
                { "name": "flag", "type": "boolean", "optional": true },
                { "name": "words", "type": "string", "dims": 1, "charset": "ab",
                  "dimLengths": [{ "min": 1, "max": 2 }] }
            ]},
            { "name": "u", "type": "union", "children": [
                { "name": "lit", "type": "literal", "value": "on" },
                { "name": "num", "type": "number" }
            ]}
        ]"#;
        let specs = TypeSpec::from_json(json).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[1].offset(), 1);
        assert!(specs[1].is_optional());
        let words = specs[1].child("words").unwrap();
        assert_eq!(words.dimensions(), 1);
        assert_eq!(words.dimension_lengths()[0], Interval::new(1, 2));
        assert_eq!(specs[2].children().len(), 2);
        match specs[0].kind() {
            TypeKind::Number(n) => {
                assert!(n.integer);
                assert_eq!(n.intervals, vec![Interval::new(0.0, 5.0)]);
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_default_dimension_lengths() {
        let specs = TypeSpec::from_json(r#"[{ "name": "m", "type": "boolean", "dims": 2 }]"#).unwrap();
        assert_eq!(
            specs[0].dimension_lengths(),
            &[DEFAULT_DIMENSION_LENGTH, DEFAULT_DIMENSION_LENGTH]
        );
    }

    #[test]
    fn test_rejects_mistyped_interval() {
        let result = TypeSpec::from_json(
            r#"[{ "name": "n", "type": "number", "intervals": [{ "min": "a", "max": 3 }] }]"#,
        );
        assert!(matches!(result, Err(FuzzError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_dimension_mismatch() {
        let result = TypeSpec::from_json(
            r#"[{ "name": "n", "type": "number", "dims": 2, "dimLengths": [{ "min": 0, "max": 1 }] }]"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = TypeSpec::from_json("[{ \"name\": 3 }]");
        assert!(matches!(result, Err(FuzzError::Json(_))));
    }

    #[test]
    fn test_unresolved_is_accepted_at_ingestion() {
        let specs = TypeSpec::from_json(r#"[{ "name": "x", "type": "unresolved" }]"#).unwrap();
        assert_eq!(specs[0].tag(), TypeTag::Unresolved);
    }
}
