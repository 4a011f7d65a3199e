//! Type specifications for the arguments of a function under test.
//!
//! A [`TypeSpec`] is an immutable tree. Scalars (`Number`, `String`,
//! `Boolean`, `Literal`) are leaves, `Object` and `Union` carry children.
//! Any node may be wrapped in one or more array dimensions. Specs are
//! validated once when built ([`TypeSpec::validated`]) and are only ever
//! replaced, never edited, by [`TypeSpec::with_options`] and
//! [`TypeSpec::with_intervals`].

pub mod decl;
pub mod options;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{FuzzError, Result};

pub use decl::ArgDecl;
pub use options::{apply_overrides, SpecOverrides};

/// Largest integer a JavaScript number holds exactly.
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub const DEFAULT_STRING_LENGTH: Interval<usize> = Interval { min: 0, max: 10 };
pub const DEFAULT_DIMENSION_LENGTH: Interval<usize> = Interval { min: 0, max: 4 };

/// Printable ASCII, `' '..='~'`.
pub fn default_charset() -> String {
    (' '..='~').collect()
}

/// An argument list. `None` is an omitted argument.
pub type Args = Vec<Option<Value>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Number,
    String,
    Boolean,
    Object,
    Union,
    Literal,
    Unresolved,
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Object => write!(f, "object"),
            Self::Union => write!(f, "union"),
            Self::Literal => write!(f, "literal"),
            Self::Unresolved => write!(f, "unresolved"),
        }
    }
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval<T> {
    pub min: T,
    pub max: T,
}

impl<T> Interval<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }
}

impl<T: PartialOrd> Interval<T> {
    pub fn contains(&self, value: &T) -> bool {
        &self.min <= value && value <= &self.max
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    pub fn is_point(&self) -> bool {
        self.min == self.max
    }
}

// ── Scalar specs ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct NumberSpec {
    pub intervals: Vec<Interval<f64>>,
    /// Draw and accept integers only.
    pub integer: bool,
    /// When false, every interval must lie in `[0, +inf)`.
    pub signed: bool,
}

impl Default for NumberSpec {
    fn default() -> Self {
        Self {
            intervals: vec![Interval::new(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER)],
            integer: false,
            signed: true,
        }
    }
}

impl NumberSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.intervals = vec![Interval::new(min, max)];
        self
    }

    pub fn intervals(mut self, intervals: Vec<Interval<f64>>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn integer(mut self, integer: bool) -> Self {
        self.integer = integer;
        self
    }

    pub fn signed(mut self, signed: bool) -> Self {
        self.signed = signed;
        self
    }

    /// Smallest and largest bound across all intervals.
    pub fn extent(&self) -> Option<Interval<f64>> {
        let min = self.intervals.iter().map(|i| i.min).reduce(f64::min)?;
        let max = self.intervals.iter().map(|i| i.max).reduce(f64::max)?;
        Some(Interval::new(min, max))
    }

    /// Intervals that can produce a value in the current mode.
    pub(crate) fn drawable(&self) -> Vec<&Interval<f64>> {
        self.intervals
            .iter()
            .filter(|i| !self.integer || i.min.ceil() <= i.max.floor())
            .collect()
    }

    pub(crate) fn accepts(&self, x: f64) -> bool {
        x.is_finite()
            && (!self.integer || x.fract() == 0.0)
            && self.intervals.iter().any(|i| i.contains(&x))
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.intervals.is_empty() {
            return Err(FuzzError::config(name, "number spec has no intervals"));
        }
        for iv in &self.intervals {
            if !iv.min.is_finite() || !iv.max.is_finite() {
                return Err(FuzzError::config(
                    name,
                    format!("number interval [{}, {}] has a non-finite bound", iv.min, iv.max),
                ));
            }
            if self.integer && (iv.min < -MAX_SAFE_INTEGER || iv.max > MAX_SAFE_INTEGER) {
                return Err(FuzzError::config(
                    name,
                    format!("integer interval [{}, {}] exceeds the safe integer range", iv.min, iv.max),
                ));
            }
            if !iv.is_ordered() {
                return Err(FuzzError::config(
                    name,
                    format!("number interval min {} exceeds max {}", iv.min, iv.max),
                ));
            }
            if !self.signed && iv.min < 0.0 {
                return Err(FuzzError::config(
                    name,
                    format!("unsigned number interval has negative min {}", iv.min),
                ));
            }
        }
        if self.drawable().is_empty() {
            return Err(FuzzError::config(name, "no interval contains an integer"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringSpec {
    /// Lexicographic bounds; see [`StringSpec::lower_bound_at`].
    pub intervals: Vec<Interval<String>>,
    pub length: Interval<usize>,
    charset: Vec<char>,
}

impl Default for StringSpec {
    fn default() -> Self {
        let charset: Vec<char> = default_charset().chars().collect();
        Self {
            intervals: vec![full_string_interval(&charset)],
            length: DEFAULT_STRING_LENGTH,
            charset,
        }
    }
}

fn full_string_interval(charset: &[char]) -> Interval<String> {
    let max = charset.last().map(|c| c.to_string()).unwrap_or_default();
    Interval::new(String::new(), max)
}

impl StringSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the alphabet. Characters are de-duplicated and sorted, and the
    /// intervals reset to the full range of the new alphabet.
    pub fn charset(mut self, charset: &str) -> Self {
        self.charset = normalize_charset(charset);
        self.intervals = vec![full_string_interval(&self.charset)];
        self
    }

    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.length = Interval::new(min, max);
        self
    }

    pub fn range(mut self, min: &str, max: &str) -> Self {
        self.intervals = vec![Interval::new(min.to_string(), max.to_string())];
        self
    }

    pub fn intervals(mut self, intervals: Vec<Interval<String>>) -> Self {
        self.intervals = intervals;
        self
    }

    /// The ordered alphabet.
    pub fn chars(&self) -> &[char] {
        &self.charset
    }

    pub fn charset_string(&self) -> String {
        self.charset.iter().collect()
    }

    pub(crate) fn lowest(&self) -> char {
        self.charset.first().copied().unwrap_or(' ')
    }

    pub(crate) fn highest(&self) -> char {
        self.charset.last().copied().unwrap_or('~')
    }

    pub(crate) fn char_index(&self, c: char) -> Option<usize> {
        self.charset.binary_search(&c).ok()
    }

    /// `bound` truncated or padded with the lowest char to `len` chars.
    pub fn lower_bound_at(&self, bound: &str, len: usize) -> Vec<char> {
        fit(bound, len, self.lowest())
    }

    /// `bound` truncated or padded with the highest char to `len` chars.
    pub fn upper_bound_at(&self, bound: &str, len: usize) -> Vec<char> {
        fit(bound, len, self.highest())
    }

    pub(crate) fn accepts(&self, s: &str) -> bool {
        let chars: Vec<char> = s.chars().collect();
        if !self.length.contains(&chars.len()) {
            return false;
        }
        if chars.iter().any(|c| self.char_index(*c).is_none()) {
            return false;
        }
        self.intervals.iter().any(|iv| {
            self.lower_bound_at(&iv.min, chars.len()) <= chars
                && chars <= self.upper_bound_at(&iv.max, chars.len())
        })
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.charset.is_empty() {
            return Err(FuzzError::config(name, "string charset is empty"));
        }
        if !self.length.is_ordered() {
            return Err(FuzzError::config(
                name,
                format!(
                    "string length min {} exceeds max {}",
                    self.length.min, self.length.max
                ),
            ));
        }
        if self.intervals.is_empty() {
            return Err(FuzzError::config(name, "string spec has no intervals"));
        }
        for iv in &self.intervals {
            if !iv.is_ordered() {
                return Err(FuzzError::config(
                    name,
                    format!("string interval {:?} exceeds {:?}", iv.min, iv.max),
                ));
            }
            if let Some(c) = iv
                .min
                .chars()
                .chain(iv.max.chars())
                .find(|c| self.char_index(*c).is_none())
            {
                return Err(FuzzError::config(
                    name,
                    format!("string bound character {:?} is not in the charset", c),
                ));
            }
        }
        Ok(())
    }
}

fn normalize_charset(charset: &str) -> Vec<char> {
    let mut chars: Vec<char> = charset.chars().collect();
    chars.sort_unstable();
    chars.dedup();
    chars
}

fn fit(bound: &str, len: usize, pad: char) -> Vec<char> {
    let mut chars: Vec<char> = bound.chars().take(len).collect();
    chars.resize(len, pad);
    chars
}

#[derive(Debug, Clone, PartialEq)]
pub struct BooleanSpec {
    pub intervals: Vec<Interval<bool>>,
}

impl Default for BooleanSpec {
    fn default() -> Self {
        Self {
            intervals: vec![Interval::new(false, true)],
        }
    }
}

impl BooleanSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins the value to `value`.
    pub fn fixed(mut self, value: bool) -> Self {
        self.intervals = vec![Interval::new(value, value)];
        self
    }

    pub(crate) fn accepts(&self, b: bool) -> bool {
        self.intervals.iter().any(|i| i.contains(&b))
    }

    fn check(&self, name: &str) -> Result<()> {
        if self.intervals.is_empty() {
            return Err(FuzzError::config(name, "boolean spec has no intervals"));
        }
        if self.intervals.iter().any(|i| !i.is_ordered()) {
            return Err(FuzzError::config(name, "boolean interval has min true and max false"));
        }
        Ok(())
    }
}

// ── Tree ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Number(NumberSpec),
    String(StringSpec),
    Boolean(BooleanSpec),
    /// Object fields, in declaration order.
    Object(Vec<TypeSpec>),
    /// Union alternatives.
    Union(Vec<TypeSpec>),
    /// A constant: number, string or boolean.
    Literal(Value),
    Unresolved,
}

/// Replacement intervals for [`TypeSpec::with_intervals`].
#[derive(Debug, Clone, PartialEq)]
pub enum Intervals {
    Number(Vec<Interval<f64>>),
    String(Vec<Interval<String>>),
    Boolean(Vec<Interval<bool>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpec {
    name: String,
    offset: usize,
    dims: Vec<Interval<usize>>,
    optional: bool,
    no_input: bool,
    kind: TypeKind,
}

impl TypeSpec {
    pub fn new(name: &str, kind: TypeKind) -> Self {
        let kind = match kind {
            TypeKind::Object(children) => TypeKind::Object(renumber(children)),
            TypeKind::Union(children) => TypeKind::Union(renumber(children)),
            other => other,
        };
        Self {
            name: name.to_string(),
            offset: 0,
            dims: Vec::new(),
            optional: false,
            no_input: false,
            kind,
        }
    }

    pub fn number(name: &str, spec: NumberSpec) -> Self {
        Self::new(name, TypeKind::Number(spec))
    }

    pub fn string(name: &str, spec: StringSpec) -> Self {
        Self::new(name, TypeKind::String(spec))
    }

    pub fn boolean(name: &str, spec: BooleanSpec) -> Self {
        Self::new(name, TypeKind::Boolean(spec))
    }

    pub fn object(name: &str, children: Vec<TypeSpec>) -> Self {
        Self::new(name, TypeKind::Object(children))
    }

    pub fn union(name: &str, children: Vec<TypeSpec>) -> Self {
        Self::new(name, TypeKind::Union(children))
    }

    pub fn literal(name: &str, value: Value) -> Self {
        Self::new(name, TypeKind::Literal(value))
    }

    pub fn unresolved(name: &str) -> Self {
        Self::new(name, TypeKind::Unresolved)
    }

    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn no_input(mut self, no_input: bool) -> Self {
        self.no_input = no_input;
        self
    }

    /// Wraps the node in `dims.len()` array dimensions.
    pub fn dims(mut self, dims: Vec<Interval<usize>>) -> Self {
        self.dims = dims;
        self
    }

    /// `depth` dimensions, all with the same length bounds.
    pub fn array(self, depth: usize, length: Interval<usize>) -> Self {
        self.dims(vec![length; depth])
    }

    /// Runs [`TypeSpec::is_option_valid`] over the whole tree.
    pub fn validated(self) -> Result<Self> {
        self.is_option_valid()?;
        Ok(self)
    }

    pub fn is_option_valid(&self) -> Result<()> {
        for (i, dim) in self.dims.iter().enumerate() {
            if !dim.is_ordered() {
                return Err(FuzzError::config(
                    &self.name,
                    format!("dimension {} length min {} exceeds max {}", i, dim.min, dim.max),
                ));
            }
        }
        match &self.kind {
            TypeKind::Number(n) => n.check(&self.name),
            TypeKind::String(s) => s.check(&self.name),
            TypeKind::Boolean(b) => b.check(&self.name),
            TypeKind::Object(children) => {
                let mut names = HashSet::new();
                for child in children {
                    if !names.insert(child.name.as_str()) {
                        return Err(FuzzError::config(
                            &self.name,
                            format!("duplicate field '{}'", child.name),
                        ));
                    }
                    child.is_option_valid()?;
                }
                Ok(())
            }
            TypeKind::Union(children) => {
                if !children.iter().any(|c| !c.no_input) {
                    return Err(FuzzError::config(&self.name, "union has no eligible alternative"));
                }
                children.iter().try_for_each(|c| c.is_option_valid())
            }
            TypeKind::Literal(value) => match value {
                Value::Number(_) | Value::String(_) | Value::Bool(_) => Ok(()),
                other => Err(FuzzError::config(
                    &self.name,
                    format!("literal must be a number, string or boolean, got {}", other),
                )),
            },
            TypeKind::Unresolved => Ok(()),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn tag(&self) -> TypeTag {
        match &self.kind {
            TypeKind::Number(_) => TypeTag::Number,
            TypeKind::String(_) => TypeTag::String,
            TypeKind::Boolean(_) => TypeTag::Boolean,
            TypeKind::Object(_) => TypeTag::Object,
            TypeKind::Union(_) => TypeTag::Union,
            TypeKind::Literal(_) => TypeTag::Literal,
            TypeKind::Unresolved => TypeTag::Unresolved,
        }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn dimensions(&self) -> usize {
        self.dims.len()
    }

    pub fn dimension_lengths(&self) -> &[Interval<usize>] {
        &self.dims
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_no_input(&self) -> bool {
        self.no_input
    }

    /// Object fields or union alternatives; empty for scalars.
    pub fn children(&self) -> &[TypeSpec] {
        match &self.kind {
            TypeKind::Object(children) | TypeKind::Union(children) => children,
            _ => &[],
        }
    }

    pub fn child(&self, name: &str) -> Option<&TypeSpec> {
        self.children().iter().find(|c| c.name == name)
    }

    /// True for a scalar pinned to one value, and for literals.
    pub fn is_constant(&self) -> bool {
        if !self.dims.is_empty() {
            return false;
        }
        match &self.kind {
            TypeKind::Number(n) => n.intervals.len() == 1 && n.intervals[0].is_point(),
            TypeKind::String(s) => s.intervals.len() == 1 && s.intervals[0].is_point(),
            TypeKind::Boolean(b) => b.intervals.len() == 1 && b.intervals[0].is_point(),
            TypeKind::Literal(_) => true,
            _ => false,
        }
    }

    /// The value of a constant spec. Strings are padded with the lowest
    /// charset character or truncated to fit the length bounds.
    pub fn constant_value(&self) -> Option<Value> {
        if !self.is_constant() {
            return None;
        }
        match &self.kind {
            TypeKind::Number(n) => Some(number_value(n.intervals[0].min, n.integer)),
            TypeKind::String(s) => {
                let chars: Vec<char> = s.intervals[0].min.chars().collect();
                let len = chars.len().clamp(s.length.min, s.length.max);
                let fitted: String = s.lower_bound_at(&s.intervals[0].min, len).into_iter().collect();
                Some(Value::String(fitted))
            }
            TypeKind::Boolean(b) => Some(Value::Bool(b.intervals[0].min)),
            TypeKind::Literal(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// A copy of this spec with its scalar intervals replaced.
    pub fn with_intervals(&self, intervals: Intervals) -> Result<Self> {
        let kind = match (&self.kind, intervals) {
            (TypeKind::Number(n), Intervals::Number(ivs)) => {
                TypeKind::Number(n.clone().intervals(ivs))
            }
            (TypeKind::String(s), Intervals::String(ivs)) => {
                TypeKind::String(s.clone().intervals(ivs))
            }
            (TypeKind::Boolean(_), Intervals::Boolean(ivs)) => {
                TypeKind::Boolean(BooleanSpec { intervals: ivs })
            }
            (_, other) => {
                return Err(FuzzError::config(
                    &self.name,
                    format!("cannot apply {:?} to a {} spec", other, self.tag()),
                ))
            }
        };
        self.with_kind(kind).validated()
    }

    pub(crate) fn with_kind(&self, kind: TypeKind) -> Self {
        Self {
            name: self.name.clone(),
            offset: self.offset,
            dims: self.dims.clone(),
            optional: self.optional,
            no_input: self.no_input,
            kind,
        }
    }

    pub(crate) fn with_dims(&self, dims: Vec<Interval<usize>>) -> Self {
        Self {
            dims,
            ..self.clone()
        }
    }
}

fn renumber(children: Vec<TypeSpec>) -> Vec<TypeSpec> {
    children
        .into_iter()
        .enumerate()
        .map(|(i, c)| c.at_offset(i))
        .collect()
}

/// JSON form of a number. Integers are stored as integers so they round-trip
/// through JavaScript unchanged.
pub(crate) fn number_value(n: f64, integer: bool) -> Value {
    if (integer || n.fract() == 0.0) && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_children_are_renumbered() {
        let spec = TypeSpec::object(
            "o",
            vec![
                TypeSpec::number("a", NumberSpec::new()).at_offset(7),
                TypeSpec::boolean("b", BooleanSpec::new()),
            ],
        );
        let offsets: Vec<usize> = spec.children().iter().map(|c| c.offset()).collect();
        assert_eq!(offsets, vec![0, 1]);
        assert_eq!(spec.child("b").map(|c| c.tag()), Some(TypeTag::Boolean));
    }

    #[test]
    fn test_rejects_empty_charset() {
        let err = TypeSpec::string("s", StringSpec::new().charset(""))
            .validated()
            .unwrap_err();
        assert!(matches!(err, FuzzError::Configuration { .. }), "{}", err);
    }

    #[test]
    fn test_rejects_inverted_lengths() {
        let string = TypeSpec::string("s", StringSpec::new().length(5, 2)).validated();
        assert!(matches!(string, Err(FuzzError::Configuration { .. })));

        let array = TypeSpec::number("n", NumberSpec::new())
            .array(1, Interval::new(3, 1))
            .validated();
        assert!(matches!(array, Err(FuzzError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_inverted_number_interval() {
        let result = TypeSpec::number("n", NumberSpec::new().range(5.0, -5.0)).validated();
        assert!(matches!(result, Err(FuzzError::Configuration { .. })));
    }

    #[test]
    fn test_rejects_integer_mode_without_integers() {
        let result = TypeSpec::number("n", NumberSpec::new().range(0.2, 0.8).integer(true)).validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_finite_bounds() {
        for (min, max) in [(0.0, f64::INFINITY), (f64::NEG_INFINITY, 0.0), (f64::NAN, 1.0)] {
            let result = TypeSpec::number("n", NumberSpec::new().range(min, max)).validated();
            assert!(matches!(result, Err(FuzzError::Configuration { .. })), "[{}, {}]", min, max);
        }
    }

    #[test]
    fn test_rejects_integers_beyond_safe_range() {
        let result = TypeSpec::number("n", NumberSpec::new().range(1e19, 2e19).integer(true)).validated();
        assert!(matches!(result, Err(FuzzError::Configuration { .. })));
        let result = TypeSpec::number("n", NumberSpec::new().range(-1e16, 0.0).integer(true)).validated();
        assert!(result.is_err());

        let edge = NumberSpec::new().range(-MAX_SAFE_INTEGER, MAX_SAFE_INTEGER).integer(true);
        assert!(TypeSpec::number("n", edge).validated().is_ok());
        // Floats may still span the whole double range.
        assert!(TypeSpec::number("n", NumberSpec::new().range(1e19, 2e19)).validated().is_ok());
    }

    #[test]
    fn test_rejects_unsigned_negative_interval() {
        let result = TypeSpec::number("n", NumberSpec::new().range(-1.0, 1.0).signed(false)).validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_bound_outside_charset() {
        let result = TypeSpec::string("s", StringSpec::new().charset("abc").range("a", "z")).validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_union_without_alternatives() {
        let result = TypeSpec::union(
            "u",
            vec![TypeSpec::number("n", NumberSpec::new()).no_input(true)],
        )
        .validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_fields() {
        let result = TypeSpec::object(
            "o",
            vec![
                TypeSpec::number("a", NumberSpec::new()),
                TypeSpec::number("a", NumberSpec::new()),
            ],
        )
        .validated();
        assert!(result.is_err());
    }

    #[test]
    fn test_charset_is_sorted_and_deduplicated() {
        let spec = StringSpec::new().charset("cbaab");
        assert_eq!(spec.chars(), &['a', 'b', 'c']);
        assert_eq!(spec.intervals, vec![Interval::new(String::new(), "c".to_string())]);
    }

    #[test]
    fn test_constant_number_and_boolean() {
        let n = TypeSpec::number("n", NumberSpec::new().range(4.0, 4.0).integer(true));
        assert!(n.is_constant());
        assert_eq!(n.constant_value(), Some(json!(4)));

        let b = TypeSpec::boolean("b", BooleanSpec::new().fixed(true));
        assert_eq!(b.constant_value(), Some(json!(true)));

        let open = TypeSpec::number("n", NumberSpec::new().range(0.0, 1.0));
        assert!(!open.is_constant());
        assert_eq!(open.constant_value(), None);
    }

    #[test]
    fn test_constant_string_is_padded_and_truncated() {
        let padded = TypeSpec::string(
            "s",
            StringSpec::new().charset("abcxyz").range("xy", "xy").length(4, 6),
        );
        assert_eq!(padded.constant_value(), Some(json!("xyaa")));

        let truncated = TypeSpec::string(
            "s",
            StringSpec::new().charset("abcxyz").range("xyzxyz", "xyzxyz").length(0, 3),
        );
        assert_eq!(truncated.constant_value(), Some(json!("xyz")));
    }

    #[test]
    fn test_with_intervals_returns_new_spec() {
        let original = TypeSpec::number("n", NumberSpec::new().range(0.0, 10.0));
        let narrowed = original
            .with_intervals(Intervals::Number(vec![Interval::new(2.0, 3.0)]))
            .unwrap();
        assert_eq!(
            original.kind(),
            &TypeKind::Number(NumberSpec::new().range(0.0, 10.0))
        );
        match narrowed.kind() {
            TypeKind::Number(n) => assert_eq!(n.intervals, vec![Interval::new(2.0, 3.0)]),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_with_intervals_rejects_mismatched_tag() {
        let spec = TypeSpec::boolean("b", BooleanSpec::new());
        let result = spec.with_intervals(Intervals::Number(vec![Interval::new(0.0, 1.0)]));
        assert!(matches!(result, Err(FuzzError::Configuration { .. })));
    }

    #[test]
    fn test_string_bounds_are_padded() {
        let spec = StringSpec::new().charset("abc").range("b", "bc");
        assert_eq!(spec.lower_bound_at("b", 3), vec!['b', 'a', 'a']);
        assert_eq!(spec.upper_bound_at("bc", 3), vec!['b', 'c', 'c']);
        assert!(spec.accepts("bab"));
        assert!(spec.accepts("bcc"));
        assert!(!spec.accepts("cab"));
        assert!(!spec.accepts("aaa"));
    }

    #[test]
    fn test_number_value_keeps_integers() {
        assert_eq!(number_value(3.0, false), json!(3));
        assert_eq!(number_value(2.5, false), json!(2.5));
        assert_eq!(number_value(-7.0, true), json!(-7));
    }
}
