//! User option overrides.
//!
//! Overrides never edit a spec in place: [`TypeSpec::with_options`] returns a
//! new, re-validated tree. Nested `children` overrides are matched by name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{BooleanSpec, Interval, TypeKind, TypeSpec};
use crate::error::{FuzzError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecOverrides {
    pub num_min: Option<f64>,
    pub num_max: Option<f64>,
    pub num_integer: Option<bool>,
    pub num_signed: Option<bool>,
    pub str_charset: Option<String>,
    // Lengths are signed so that negative values are reported as
    // configuration errors rather than parse failures.
    pub str_length_min: Option<i64>,
    pub str_length_max: Option<i64>,
    pub str_min: Option<String>,
    pub str_max: Option<String>,
    pub array_length_min: Option<i64>,
    pub array_length_max: Option<i64>,
    pub bool_value: Option<bool>,
    pub no_input: Option<bool>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, SpecOverrides>,
}

impl SpecOverrides {
    fn has_number(&self) -> bool {
        self.num_min.is_some()
            || self.num_max.is_some()
            || self.num_integer.is_some()
            || self.num_signed.is_some()
    }

    fn has_string(&self) -> bool {
        self.str_charset.is_some()
            || self.str_length_min.is_some()
            || self.str_length_max.is_some()
            || self.str_min.is_some()
            || self.str_max.is_some()
    }

    fn has_array(&self) -> bool {
        self.array_length_min.is_some() || self.array_length_max.is_some()
    }
}

fn length(name: &str, what: &str, value: Option<i64>) -> Result<Option<usize>> {
    match value {
        None => Ok(None),
        Some(v) => usize::try_from(v)
            .map(Some)
            .map_err(|_| FuzzError::config(name, format!("{} must not be negative, got {}", what, v))),
    }
}

impl TypeSpec {
    /// A copy of this spec with `overrides` applied and re-validated.
    pub fn with_options(&self, overrides: &SpecOverrides) -> Result<TypeSpec> {
        let name = self.name();

        let mismatched = match self.kind() {
            TypeKind::Number(_) => overrides.has_string() || overrides.bool_value.is_some(),
            TypeKind::String(_) => overrides.has_number() || overrides.bool_value.is_some(),
            TypeKind::Boolean(_) => overrides.has_number() || overrides.has_string(),
            _ => overrides.has_number() || overrides.has_string() || overrides.bool_value.is_some(),
        };
        if mismatched {
            return Err(FuzzError::config(
                name,
                format!("options do not apply to a {} spec", self.tag()),
            ));
        }

        let kind = match self.kind() {
            TypeKind::Number(n) if overrides.has_number() => {
                let mut n = n.clone();
                if overrides.num_min.is_some() || overrides.num_max.is_some() {
                    let extent = n.extent().unwrap_or(Interval::new(0.0, 0.0));
                    n.intervals = vec![Interval::new(
                        overrides.num_min.unwrap_or(extent.min),
                        overrides.num_max.unwrap_or(extent.max),
                    )];
                }
                if let Some(integer) = overrides.num_integer {
                    n.integer = integer;
                }
                if let Some(signed) = overrides.num_signed {
                    n.signed = signed;
                    if !signed {
                        n.intervals = n
                            .intervals
                            .iter()
                            .filter(|i| i.max >= 0.0)
                            .map(|i| Interval::new(i.min.max(0.0), i.max))
                            .collect();
                    }
                }
                TypeKind::Number(n)
            }
            TypeKind::String(s) if overrides.has_string() => {
                let mut s = s.clone();
                if let Some(charset) = &overrides.str_charset {
                    s = s.charset(charset);
                }
                let min_len = length(name, "string length min", overrides.str_length_min)?;
                let max_len = length(name, "string length max", overrides.str_length_max)?;
                s.length = Interval::new(
                    min_len.unwrap_or(s.length.min),
                    max_len.unwrap_or(s.length.max),
                );
                if overrides.str_min.is_some() || overrides.str_max.is_some() {
                    let lowest = s.intervals.iter().map(|i| i.min.clone()).min().unwrap_or_default();
                    let highest = s.intervals.iter().map(|i| i.max.clone()).max().unwrap_or_default();
                    s.intervals = vec![Interval::new(
                        overrides.str_min.clone().unwrap_or(lowest),
                        overrides.str_max.clone().unwrap_or(highest),
                    )];
                }
                TypeKind::String(s)
            }
            TypeKind::Boolean(_) if overrides.bool_value.is_some() => {
                let value = overrides.bool_value.unwrap_or_default();
                TypeKind::Boolean(BooleanSpec::new().fixed(value))
            }
            other => other.clone(),
        };

        let kind = if overrides.children.is_empty() {
            kind
        } else {
            match kind {
                TypeKind::Object(children) => TypeKind::Object(override_children(name, children, &overrides.children)?),
                TypeKind::Union(children) => TypeKind::Union(override_children(name, children, &overrides.children)?),
                _ => {
                    let child = overrides.children.keys().next().cloned().unwrap_or_default();
                    return Err(FuzzError::UnknownChild {
                        parent: name.to_string(),
                        child,
                    });
                }
            }
        };

        let mut spec = self.with_kind(kind);
        if overrides.has_array() {
            if spec.dimensions() == 0 {
                return Err(FuzzError::config(name, "array options on a non-array spec"));
            }
            let min = length(name, "array length min", overrides.array_length_min)?;
            let max = length(name, "array length max", overrides.array_length_max)?;
            let dims = spec
                .dimension_lengths()
                .iter()
                .map(|d| Interval::new(min.unwrap_or(d.min), max.unwrap_or(d.max)))
                .collect();
            spec = spec.with_dims(dims);
        }
        if let Some(no_input) = overrides.no_input {
            spec = spec.no_input(no_input);
        }
        spec.validated()
    }
}

fn override_children(
    parent: &str,
    children: Vec<TypeSpec>,
    overrides: &BTreeMap<String, SpecOverrides>,
) -> Result<Vec<TypeSpec>> {
    if let Some(unknown) = overrides.keys().find(|k| !children.iter().any(|c| c.name() == k.as_str())) {
        return Err(FuzzError::UnknownChild {
            parent: parent.to_string(),
            child: unknown.clone(),
        });
    }
    children
        .into_iter()
        .map(|child| match overrides.get(child.name()) {
            Some(o) => child.with_options(o),
            None => Ok(child),
        })
        .collect()
}

/// Applies per-argument overrides keyed by argument name.
pub fn apply_overrides(
    specs: &[TypeSpec],
    overrides: &BTreeMap<String, SpecOverrides>,
) -> Result<Vec<TypeSpec>> {
    if let Some(unknown) = overrides.keys().find(|k| !specs.iter().any(|s| s.name() == k.as_str())) {
        return Err(FuzzError::UnknownChild {
            parent: "<arguments>".to_string(),
            child: unknown.clone(),
        });
    }
    specs
        .iter()
        .map(|spec| match overrides.get(spec.name()) {
            Some(o) => spec.with_options(o),
            None => Ok(spec.clone()),
        })
        .collect()
}
