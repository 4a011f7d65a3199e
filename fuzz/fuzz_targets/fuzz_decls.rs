#![no_main]
use libfuzzer_sys::fuzz_target;
use typefuzz::{generate_args, seeded, validate_args, TypeSpec};

// Parse arbitrary argument declarations. Anything accepted must generate
// values that validate, or fail with an engine error rather than panic.
fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(specs) = TypeSpec::from_json(json) else {
        return;
    };
    let mut rng = seeded("fuzz");
    if let Ok(args) = generate_args(&specs, &mut rng) {
        assert!(validate_args(&args, &specs).unwrap_or(true));
    }
});
