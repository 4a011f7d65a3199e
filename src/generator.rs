//! Random value generation from a [`TypeSpec`].
//!
//! Every function here is a pure function of the type spec and the generator
//! state: the same seed reproduces the same values.

use rand::Rng;
use serde_json::{Map, Value};

use crate::error::{FuzzError, Result};
use crate::spec::{number_value, Args, BooleanSpec, NumberSpec, StringSpec, TypeKind, TypeSpec};

/// Generates one argument list. `noInput` arguments are always omitted and
/// optional ones are dropped half of the time.
pub fn generate_args<R: Rng + ?Sized>(specs: &[TypeSpec], rng: &mut R) -> Result<Args> {
    specs
        .iter()
        .map(|spec| {
            if spec.is_no_input() {
                return Ok(None);
            }
            let value = generate(spec, rng)?;
            if spec.is_optional() && rng.gen_bool(0.5) {
                Ok(None)
            } else {
                Ok(Some(value))
            }
        })
        .collect()
}

/// Generates a value for `spec`, including its array dimensions. Optionality
/// of `spec` itself is the caller's concern.
pub fn generate<R: Rng + ?Sized>(spec: &TypeSpec, rng: &mut R) -> Result<Value> {
    generate_dims(spec, 0, rng)
}

fn generate_dims<R: Rng + ?Sized>(spec: &TypeSpec, depth: usize, rng: &mut R) -> Result<Value> {
    let Some(length) = spec.dimension_lengths().get(depth) else {
        return generate_element(spec, rng);
    };
    let len = if length.is_point() {
        length.min
    } else {
        rng.gen_range(length.min..=length.max)
    };
    let items = (0..len)
        .map(|_| generate_dims(spec, depth + 1, rng))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(items))
}

fn generate_element<R: Rng + ?Sized>(spec: &TypeSpec, rng: &mut R) -> Result<Value> {
    match spec.kind() {
        TypeKind::Number(n) => Ok(generate_number(n, rng)),
        TypeKind::String(s) => Ok(Value::String(generate_string(s, rng))),
        TypeKind::Boolean(b) => Ok(Value::Bool(generate_boolean(b, rng))),
        TypeKind::Object(children) => {
            let mut map = Map::new();
            for child in children.iter().filter(|c| !c.is_no_input()) {
                let value = generate(child, rng)?;
                if child.is_optional() && rng.gen_bool(0.5) {
                    continue;
                }
                map.insert(child.name().to_string(), value);
            }
            Ok(Value::Object(map))
        }
        TypeKind::Union(children) => {
            let eligible: Vec<&TypeSpec> = children.iter().filter(|c| !c.is_no_input()).collect();
            if eligible.is_empty() {
                return Err(FuzzError::config(spec.name(), "union has no eligible alternative"));
            }
            let branch = eligible[rng.gen_range(0..eligible.len())];
            generate(branch, rng)
        }
        TypeKind::Literal(value) => Ok(value.clone()),
        TypeKind::Unresolved => Err(FuzzError::Unresolved {
            name: spec.name().to_string(),
        }),
    }
}

fn pick<'a, T, R: Rng + ?Sized>(items: &'a [T], rng: &mut R) -> &'a T {
    if items.len() == 1 {
        &items[0]
    } else {
        &items[rng.gen_range(0..items.len())]
    }
}

// TODO: weight the interval choice by interval size.
pub(crate) fn generate_number<R: Rng + ?Sized>(spec: &NumberSpec, rng: &mut R) -> Value {
    let drawable = spec.drawable();
    if drawable.is_empty() {
        return Value::Null;
    }
    let iv = *pick(&drawable, rng);
    if spec.integer {
        let lo = iv.min.ceil() as i64;
        let hi = iv.max.floor() as i64;
        let n = if lo == hi { lo } else { rng.gen_range(lo..=hi) };
        Value::from(n)
    } else if iv.is_point() {
        number_value(iv.min, false)
    } else if (iv.max - iv.min).is_finite() {
        number_value(rng.gen_range(iv.min..=iv.max), false)
    } else {
        // The width overflows; interpolate instead.
        let t: f64 = rng.gen_range(0.0..=1.0);
        number_value((iv.min * (1.0 - t) + iv.max * t).clamp(iv.min, iv.max), false)
    }
}

/// Picks a length, then each character in turn. While the prefix still
/// equals the (padded) lower or upper bound, the next character is limited
/// so the result cannot leave the interval. Characters are therefore not
/// uniformly distributed over the interval.
pub(crate) fn generate_string<R: Rng + ?Sized>(spec: &StringSpec, rng: &mut R) -> String {
    let iv = pick(&spec.intervals, rng);
    let bound_len = iv.min.chars().count().min(spec.length.max);
    let min_len = spec.length.min.max(bound_len);
    let len = if min_len >= spec.length.max {
        spec.length.max
    } else {
        rng.gen_range(min_len..=spec.length.max)
    };

    let lower = spec.lower_bound_at(&iv.min, len);
    let upper = spec.upper_bound_at(&iv.max, len);
    let last = spec.chars().len().saturating_sub(1);
    let mut on_lower = true;
    let mut on_upper = true;
    let mut out = String::with_capacity(len);

    for i in 0..len {
        let lo = if on_lower { spec.char_index(lower[i]).unwrap_or(0) } else { 0 };
        let hi = if on_upper { spec.char_index(upper[i]).unwrap_or(last) } else { last };
        let idx = if lo >= hi { lo } else { rng.gen_range(lo..=hi) };
        let c = spec.chars()[idx];
        on_lower &= c == lower[i];
        on_upper &= c == upper[i];
        out.push(c);
    }
    out
}

pub(crate) fn generate_boolean<R: Rng + ?Sized>(spec: &BooleanSpec, rng: &mut R) -> bool {
    let iv = pick(&spec.intervals, rng);
    if iv.is_point() {
        iv.min
    } else {
        rng.gen_bool(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::seeded;
    use crate::spec::{Interval, NumberSpec, MAX_SAFE_INTEGER};
    use crate::validator::{validate_args, validate_value};
    use serde_json::json;

    fn int_range(min: f64, max: f64) -> TypeSpec {
        TypeSpec::number("n", NumberSpec::new().range(min, max).integer(true))
    }

    #[test]
    fn test_golden_first_integer() {
        let spec = int_range(-100.0, 100.0);
        let mut rng = seeded("qwertyuiop");
        let first = generate(&spec, &mut rng).unwrap();
        assert_eq!(first, json!(34));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let spec = TypeSpec::object(
            "o",
            vec![
                int_range(-5.0, 5.0),
                TypeSpec::string("s", StringSpec::new()).optional(true),
            ],
        )
        .array(1, Interval::new(0, 3));
        let run = |seed: &str| {
            let mut rng = seeded(seed);
            (0..50)
                .map(|_| generate(&spec, &mut rng).unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(run("abc"), run("abc"));
        assert_ne!(run("abc"), run("abd"));
    }

    #[test]
    fn test_integer_endpoints_are_reachable() {
        let spec = int_range(0.0, 5.0);
        let mut rng = seeded("endpoints");
        let values: Vec<i64> = (0..1000)
            .map(|_| generate(&spec, &mut rng).unwrap().as_i64().unwrap())
            .collect();
        assert!(values.contains(&0));
        assert!(values.contains(&5));
        assert!(values.iter().all(|v| (0..=5).contains(v)));
    }

    #[test]
    fn test_fractional_bounds_round_inward() {
        let spec = int_range(0.5, 2.5);
        let mut rng = seeded("inward");
        for _ in 0..200 {
            let v = generate(&spec, &mut rng).unwrap().as_i64().unwrap();
            assert!((1..=2).contains(&v), "{}", v);
        }
    }

    #[test]
    fn test_huge_float_interval() {
        let spec = TypeSpec::number("n", NumberSpec::new().range(-1e308, 1e308));
        let mut rng = seeded("huge");
        for _ in 0..100 {
            let v = generate(&spec, &mut rng).unwrap().as_f64().unwrap();
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_no_input_unresolved_round_trips() {
        let specs = vec![
            TypeSpec::number("n", NumberSpec::new().range(0.0, 9.0).integer(true)),
            TypeSpec::unresolved("cb").no_input(true),
        ];
        let mut rng = seeded("callback");
        for _ in 0..100 {
            let args = generate_args(&specs, &mut rng).unwrap();
            assert!(validate_args(&args, &specs).unwrap(), "{:?}", args);
        }
    }

    #[test]
    fn test_widest_safe_integer_interval() {
        let spec = TypeSpec::number(
            "n",
            NumberSpec::new()
                .range(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER)
                .integer(true),
        )
        .validated()
        .unwrap();
        let mut rng = seeded("safe");
        for _ in 0..1000 {
            let v = generate(&spec, &mut rng).unwrap();
            assert!(validate_value(&v, &spec).unwrap(), "{:?}", v);
        }
    }

    #[test]
    fn test_optional_field_present_and_absent() {
        let spec = TypeSpec::object(
            "o",
            vec![TypeSpec::boolean("b", BooleanSpec::new()).optional(true)],
        );
        let mut rng = seeded("optional");
        let mut present = 0;
        let mut absent = 0;
        for _ in 0..1000 {
            match generate(&spec, &mut rng).unwrap().get("b") {
                Some(_) => present += 1,
                None => absent += 1,
            }
        }
        assert!(present > 0 && absent > 0, "present={} absent={}", present, absent);
    }

    #[test]
    fn test_no_input_is_never_generated() {
        let specs = vec![
            int_range(0.0, 1.0).no_input(true),
            TypeSpec::object(
                "o",
                vec![TypeSpec::boolean("hidden", BooleanSpec::new()).no_input(true)],
            ),
        ];
        let mut rng = seeded("no-input");
        for _ in 0..100 {
            let args = generate_args(&specs, &mut rng).unwrap();
            assert_eq!(args[0], None);
            assert_eq!(args[1], Some(json!({})));
        }
    }

    #[test]
    fn test_fixed_boolean() {
        let spec = TypeSpec::boolean("b", BooleanSpec::new().fixed(true));
        let mut rng = seeded("fixed");
        assert!((0..50).all(|_| generate(&spec, &mut rng).unwrap() == json!(true)));
    }

    #[test]
    fn test_string_stays_in_padded_interval() {
        let s = StringSpec::new().charset("abcd").range("bb", "c").length(1, 4);
        let mut rng = seeded("strings");
        for _ in 0..500 {
            let v = generate_string(&s, &mut rng);
            assert!(s.accepts(&v), "{:?}", v);
            assert!(v.chars().count() >= 2, "{:?}", v);
        }
    }

    #[test]
    fn test_fixed_length_string() {
        let s = StringSpec::new().charset("xy").length(3, 3);
        let mut rng = seeded("fixed-len");
        for _ in 0..100 {
            assert_eq!(generate_string(&s, &mut rng).len(), 3);
        }
    }

    #[test]
    fn test_array_lengths_follow_each_dimension() {
        let spec = TypeSpec::boolean("m", BooleanSpec::new())
            .dims(vec![Interval::new(2, 2), Interval::new(0, 1)]);
        let mut rng = seeded("dims");
        for _ in 0..50 {
            let v = generate(&spec, &mut rng).unwrap();
            let outer = v.as_array().unwrap();
            assert_eq!(outer.len(), 2);
            for inner in outer {
                assert!(inner.as_array().unwrap().len() <= 1);
            }
        }
    }

    #[test]
    fn test_union_picks_eligible_branch() {
        let spec = TypeSpec::union(
            "u",
            vec![
                TypeSpec::literal("a", json!("a")),
                TypeSpec::literal("b", json!("b")).no_input(true),
            ],
        );
        let mut rng = seeded("union");
        assert!((0..50).all(|_| generate(&spec, &mut rng).unwrap() == json!("a")));
    }

    #[test]
    fn test_unresolved_fails() {
        let spec = TypeSpec::unresolved("x");
        let mut rng = seeded("x");
        assert!(matches!(
            generate(&spec, &mut rng),
            Err(FuzzError::Unresolved { .. })
        ));
    }
}
