//! Small, valid perturbations of an existing argument list.
//!
//! [`get_mutators`] walks the value in lock-step with its specs and proposes
//! one [`Mutator`] per possible edit. Applying a mutator returns a new
//! argument list; the input is left alone. All mutators from one call share
//! a single-use token: once any of them has been applied, the paths of the
//! whole set are stale and every further `apply` fails with
//! [`FuzzError::AlreadyMutated`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::{FuzzError, Result};
use crate::generator::generate;
use crate::spec::{number_value, Args, NumberSpec, StringSpec, TypeKind, TypeSpec};
use crate::validator::matching_branch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

pub type Path = Vec<PathSegment>;

/// Renders a path as `[0].field[2]`.
pub fn format_path(path: &[PathSegment]) -> String {
    path.iter()
        .map(|seg| match seg {
            PathSegment::Index(i) => format!("[{}]", i),
            PathSegment::Key(k) => format!(".{}", k),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Edit {
    Set(Value),
    Remove,
}

pub struct Mutator {
    name: &'static str,
    path: Path,
    edit: Edit,
    spent: Rc<Cell<bool>>,
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("name", &self.name)
            .field("path", &format_path(&self.path))
            .field("edit", &self.edit)
            .finish()
    }
}

impl Mutator {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// The value written at [`Mutator::path`], `None` for a deletion.
    pub fn replacement(&self) -> Option<&Value> {
        match &self.edit {
            Edit::Set(v) => Some(v),
            Edit::Remove => None,
        }
    }

    /// Returns a copy of `args` with the edit applied.
    pub fn apply(&self, args: &Args) -> Result<Args> {
        if self.spent.replace(true) {
            return Err(FuzzError::AlreadyMutated {
                name: self.name.to_string(),
            });
        }
        let mut out = args.clone();
        if !write(&mut out, &self.path, &self.edit) {
            return Err(FuzzError::config(
                self.name,
                format!("path {} does not exist in the value", format_path(&self.path)),
            ));
        }
        Ok(out)
    }
}

fn write(args: &mut Args, path: &[PathSegment], edit: &Edit) -> bool {
    let Some((PathSegment::Index(arg), rest)) = path.split_first() else {
        return false;
    };
    let Some(slot) = args.get_mut(*arg) else {
        return false;
    };
    if rest.is_empty() {
        *slot = match edit {
            Edit::Set(v) => Some(v.clone()),
            Edit::Remove => None,
        };
        return true;
    }
    match slot {
        Some(value) => write_value(value, rest, edit),
        None => false,
    }
}

fn write_value(value: &mut Value, path: &[PathSegment], edit: &Edit) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut target = value;
    for seg in parents {
        let next = match (seg, target) {
            (PathSegment::Index(i), Value::Array(items)) => items.get_mut(*i),
            (PathSegment::Key(k), Value::Object(map)) => map.get_mut(k),
            _ => None,
        };
        match next {
            Some(v) => target = v,
            None => return false,
        }
    }
    match (last, target, edit) {
        (PathSegment::Index(i), Value::Array(items), Edit::Set(v)) if *i < items.len() => {
            items[*i] = v.clone();
            true
        }
        (PathSegment::Key(k), Value::Object(map), Edit::Set(v)) => {
            map.insert(k.clone(), v.clone());
            true
        }
        (PathSegment::Key(k), Value::Object(map), Edit::Remove) => map.remove(k).is_some(),
        _ => false,
    }
}

/// Proposes every single-step mutation of `args`.
pub fn get_mutators<R: Rng + ?Sized>(specs: &[TypeSpec], args: &Args, rng: &mut R) -> Result<Vec<Mutator>> {
    let mut collector = Collector {
        rng,
        spent: Rc::new(Cell::new(false)),
        out: Vec::new(),
    };
    for (i, spec) in specs.iter().enumerate() {
        if spec.is_no_input() {
            continue;
        }
        let path = vec![PathSegment::Index(i)];
        let current = args.get(i).and_then(|v| v.as_ref());
        if spec.is_optional() {
            match current {
                None => {
                    let value = generate(spec, &mut *collector.rng)?;
                    collector.push("materialize", &path, Edit::Set(value));
                }
                Some(_) => collector.push("delete", &path, Edit::Remove),
            }
        }
        if let Some(value) = current {
            collector.walk(spec, value, &path, 0)?;
        }
    }
    Ok(collector.out)
}

struct Collector<'r, R: ?Sized> {
    rng: &'r mut R,
    spent: Rc<Cell<bool>>,
    out: Vec<Mutator>,
}

impl<R: Rng + ?Sized> Collector<'_, R> {
    fn push(&mut self, name: &'static str, path: &[PathSegment], edit: Edit) {
        self.out.push(Mutator {
            name,
            path: path.to_vec(),
            edit,
            spent: self.spent.clone(),
        });
    }

    fn walk(&mut self, spec: &TypeSpec, value: &Value, path: &[PathSegment], depth: usize) -> Result<()> {
        if depth < spec.dimensions() {
            if let Value::Array(items) = value {
                for (j, item) in items.iter().enumerate() {
                    let mut child = path.to_vec();
                    child.push(PathSegment::Index(j));
                    self.walk(spec, item, &child, depth + 1)?;
                }
            }
            return Ok(());
        }

        match spec.kind() {
            TypeKind::Number(n) => {
                if let Some(x) = value.as_f64() {
                    for (name, candidate) in number_candidates(n, x) {
                        self.push(name, path, Edit::Set(candidate));
                    }
                }
            }
            TypeKind::String(s) => {
                if let Some(current) = value.as_str() {
                    for (name, candidate) in string_candidates(s, current, &mut *self.rng) {
                        self.push(name, path, Edit::Set(Value::String(candidate)));
                    }
                }
            }
            TypeKind::Boolean(b) => {
                if let Some(current) = value.as_bool() {
                    if b.accepts(!current) {
                        self.push("flip", path, Edit::Set(Value::Bool(!current)));
                    }
                }
            }
            TypeKind::Object(children) => {
                let Value::Object(map) = value else {
                    return Ok(());
                };
                for child in children.iter().filter(|c| !c.is_no_input()) {
                    let mut child_path = path.to_vec();
                    child_path.push(PathSegment::Key(child.name().to_string()));
                    let present = map.get(child.name());
                    if child.is_optional() {
                        match present {
                            None => {
                                let generated = generate(child, &mut *self.rng)?;
                                self.push("materialize", &child_path, Edit::Set(generated));
                            }
                            Some(_) => self.push("delete", &child_path, Edit::Remove),
                        }
                    }
                    if let Some(v) = present {
                        self.walk(child, v, &child_path, 0)?;
                    }
                }
            }
            TypeKind::Union(children) => {
                let matched = matching_branch(value, spec)?;
                let others: Vec<&TypeSpec> = children
                    .iter()
                    .enumerate()
                    .filter(|(i, c)| !c.is_no_input() && Some(*i) != matched)
                    .map(|(_, c)| c)
                    .collect();
                if !others.is_empty() {
                    let branch = others[self.rng.gen_range(0..others.len())];
                    let generated = generate(branch, &mut *self.rng)?;
                    if &generated != value {
                        self.push("switch-branch", path, Edit::Set(generated));
                    }
                }
                if let Some(i) = matched {
                    self.walk(&children[i], value, path, 0)?;
                }
            }
            TypeKind::Literal(_) | TypeKind::Unresolved => {}
        }
        Ok(())
    }
}

fn number_candidates(spec: &NumberSpec, x: f64) -> Vec<(&'static str, Value)> {
    let candidates = [
        ("increment", x + 1.0),
        ("decrement", x - 1.0),
        ("negate", -x),
        ("double", x * 2.0),
        ("triple", x * 3.0),
        ("halve", x / 2.0),
        ("third", x / 3.0),
    ];
    let mut seen: Vec<f64> = Vec::new();
    candidates
        .into_iter()
        .filter_map(|(name, y)| {
            let y = if spec.integer { y.round() } else { y };
            // -0.0 == 0.0, so negating zero is dropped here as well.
            if y == x || !spec.accepts(y) || seen.contains(&y) {
                return None;
            }
            seen.push(y);
            Some((name, number_value(y, spec.integer)))
        })
        .collect()
}

fn string_candidates<R: Rng + ?Sized>(spec: &StringSpec, current: &str, rng: &mut R) -> Vec<(&'static str, String)> {
    let chars: Vec<char> = current.chars().collect();
    let mut candidates: Vec<(&'static str, Vec<char>)> = Vec::with_capacity(4);

    if !chars.is_empty() {
        let mut deleted = chars.clone();
        deleted.remove(rng.gen_range(0..chars.len()));
        candidates.push(("delete-char", deleted));
    }
    if !spec.chars().is_empty() {
        let mut inserted = chars.clone();
        let at = rng.gen_range(0..=chars.len());
        let c = spec.chars()[rng.gen_range(0..spec.chars().len())];
        inserted.insert(at, c);
        candidates.push(("insert-char", inserted));
    }
    let mut reversed = chars.clone();
    reversed.reverse();
    candidates.push(("reverse", reversed));
    let mut jumbled = chars.clone();
    jumbled.shuffle(rng);
    candidates.push(("jumble", jumbled));

    candidates
        .into_iter()
        .map(|(name, cs)| (name, cs.into_iter().collect::<String>()))
        .filter(|(_, s)| s != current && spec.accepts(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prng::seeded;
    use crate::spec::{BooleanSpec, Interval};
    use crate::validator::validate_args;
    use serde_json::json;

    fn names(mutators: &[Mutator]) -> Vec<&str> {
        mutators.iter().map(|m| m.name()).collect()
    }

    #[test]
    fn test_number_candidates_respect_interval() {
        let spec = TypeSpec::number("n", NumberSpec::new().range(0.0, 10.0).integer(true));
        let mut rng = seeded("numbers");
        let mutators = get_mutators(&[spec], &vec![Some(json!(4))], &mut rng).unwrap();
        let values: Vec<i64> = mutators
            .iter()
            .map(|m| m.replacement().unwrap().as_i64().unwrap())
            .collect();
        // 4+1, 4-1, 4*2, 4/2 survive; -4 and 12 leave the interval, 4/3 rounds to 1.
        assert_eq!(values, vec![5, 3, 8, 2, 1]);
    }

    #[test]
    fn test_zero_has_no_negation() {
        let spec = TypeSpec::number("n", NumberSpec::new().range(-5.0, 5.0));
        let mut rng = seeded("zero");
        let mutators = get_mutators(&[spec], &vec![Some(json!(0))], &mut rng).unwrap();
        assert_eq!(names(&mutators), vec!["increment", "decrement"]);
    }

    #[test]
    fn test_boolean_flip_respects_fixed_value() {
        let free = TypeSpec::boolean("b", BooleanSpec::new());
        let fixed = TypeSpec::boolean("b", BooleanSpec::new().fixed(true));
        let mut rng = seeded("bool");
        let args = vec![Some(json!(true))];
        let flips = get_mutators(&[free], &args, &mut rng).unwrap();
        assert_eq!(flips.len(), 1);
        assert_eq!(flips[0].apply(&args).unwrap(), vec![Some(json!(false))]);
        assert!(get_mutators(&[fixed], &args, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn test_literal_is_immutable() {
        let spec = TypeSpec::literal("k", json!("const"));
        let mut rng = seeded("literal");
        assert!(get_mutators(&[spec], &vec![Some(json!("const"))], &mut rng)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_optional_argument_materialize_and_delete() {
        let spec = TypeSpec::boolean("b", BooleanSpec::new()).optional(true);
        let mut rng = seeded("optional");

        let absent = get_mutators(&[spec.clone()], &vec![None], &mut rng).unwrap();
        assert_eq!(names(&absent), vec!["materialize"]);
        assert!(absent[0].apply(&vec![None]).unwrap()[0].is_some());

        let present = get_mutators(&[spec], &vec![Some(json!(true))], &mut rng).unwrap();
        assert_eq!(names(&present), vec!["delete", "flip"]);
        assert_eq!(present[0].apply(&vec![Some(json!(true))]).unwrap(), vec![None]);
    }

    #[test]
    fn test_nested_object_paths() {
        let spec = TypeSpec::object(
            "o",
            vec![
                TypeSpec::boolean("flags", BooleanSpec::new()).array(1, Interval::new(0, 3)),
                TypeSpec::boolean("extra", BooleanSpec::new()).optional(true),
            ],
        );
        let args = vec![Some(json!({ "flags": [true, false], "extra": true }))];
        let mut rng = seeded("paths");
        let mutators = get_mutators(&[spec], &args, &mut rng).unwrap();
        let paths: Vec<String> = mutators.iter().map(|m| format_path(m.path())).collect();
        assert_eq!(
            paths,
            vec!["[0].flags[0]", "[0].flags[1]", "[0].extra", "[0].extra"]
        );
        let flipped = mutators[1].apply(&args).unwrap();
        assert_eq!(flipped[0], Some(json!({ "flags": [true, true], "extra": true })));
    }

    #[test]
    fn test_single_use() {
        let spec = TypeSpec::number("n", NumberSpec::new().range(0.0, 100.0));
        let args = vec![Some(json!(10))];
        let mut rng = seeded("once");
        let mutators = get_mutators(&[spec], &args, &mut rng).unwrap();
        assert!(mutators.len() >= 2);
        mutators[0].apply(&args).unwrap();
        assert!(matches!(
            mutators[0].apply(&args),
            Err(FuzzError::AlreadyMutated { .. })
        ));
        assert!(matches!(
            mutators[1].apply(&args),
            Err(FuzzError::AlreadyMutated { .. })
        ));
    }

    #[test]
    fn test_string_mutations_stay_valid() {
        let spec = TypeSpec::string("s", StringSpec::new().charset("abc").length(2, 4));
        let mut rng = seeded("strings");
        let args = vec![Some(json!("abc"))];
        let specs = [spec];
        for _ in 0..50 {
            for m in get_mutators(&specs, &args, &mut rng).unwrap() {
                let out = vec![m.replacement().cloned()];
                assert_ne!(out, args);
                assert!(validate_args(&out, &specs).unwrap(), "{:?}", out);
            }
        }
    }

    #[test]
    fn test_union_switches_branch_and_mutates_within() {
        let spec = TypeSpec::union(
            "u",
            vec![
                TypeSpec::number("n", NumberSpec::new().range(0.0, 3.0).integer(true)),
                TypeSpec::literal("none", json!("none")),
            ],
        );
        let args = vec![Some(json!(1))];
        let mut rng = seeded("union");
        let mutators = get_mutators(&[spec.clone()], &args, &mut rng).unwrap();
        assert_eq!(mutators[0].name(), "switch-branch");
        assert_eq!(mutators[0].replacement(), Some(&json!("none")));
        assert!(names(&mutators).contains(&"increment"));
        for m in &mutators[1..] {
            let v = m.replacement().unwrap();
            assert!(crate::validator::validate_value(v, &spec).unwrap());
        }
    }

    #[test]
    fn test_apply_leaves_input_untouched() {
        let spec = TypeSpec::boolean("b", BooleanSpec::new());
        let args = vec![Some(json!(false))];
        let mut rng = seeded("pure");
        let mutators = get_mutators(&[spec], &args, &mut rng).unwrap();
        let out = mutators[0].apply(&args).unwrap();
        assert_eq!(args, vec![Some(json!(false))]);
        assert_eq!(out, vec![Some(json!(true))]);
    }
}
