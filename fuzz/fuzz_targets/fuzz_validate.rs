#![no_main]
use libfuzzer_sys::fuzz_target;
use serde_json::{json, Value};
use typefuzz::{
    get_mutators, seeded, validate_args, BooleanSpec, Interval, NumberSpec, StringSpec, TypeSpec,
};

fn specs() -> Vec<TypeSpec> {
    vec![
        TypeSpec::object(
            "o",
            vec![
                TypeSpec::string("s", StringSpec::new().charset("abc").length(0, 4)),
                TypeSpec::number("n", NumberSpec::new().range(-10.0, 10.0).integer(true)).optional(true),
                TypeSpec::union(
                    "u",
                    vec![
                        TypeSpec::literal("none", json!("none")),
                        TypeSpec::boolean("b", BooleanSpec::new()).array(1, Interval::new(0, 3)),
                    ],
                ),
            ],
        ),
        TypeSpec::number("x", NumberSpec::new()).optional(true),
    ]
}

// Validate arbitrary JSON against a fixed spec tree. Whatever validates must
// also be safe to mutate, and every mutation must still validate.
fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let args: Vec<Option<Value>> = match value {
        Value::Array(items) => items
            .into_iter()
            .map(|v| if v.is_null() { None } else { Some(v) })
            .collect(),
        other => vec![Some(other)],
    };

    let specs = specs();
    if !validate_args(&args, &specs).unwrap_or(false) {
        return;
    }
    let mut rng = seeded("fuzz");
    let mutators = get_mutators(&specs, &args, &mut rng).expect("valid input must be mutable");
    if let Some(first) = mutators.first() {
        let mutated = first.apply(&args).expect("fresh mutator set");
        assert!(validate_args(&mutated, &specs).unwrap_or(false));
    }
});
