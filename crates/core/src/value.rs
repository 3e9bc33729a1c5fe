//! Runtime value model for item variables.
//!
//! A variable holds one of three things: nothing (`Null`), a typed value
//! whose shape follows its cardinality, or an `Invalid` marker carrying a
//! diagnostic. `Single` always wraps exactly one [`Scalar`]; `Multiple` and
//! `Ordered` always wrap a collection, so the cardinality/payload pairing
//! cannot be violated by construction.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ──────────────────────────────────────────────
// Type tags
// ──────────────────────────────────────────────

/// Base type of a variable or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Boolean,
    Integer,
    Float,
    String,
    Identifier,
    Uri,
    Pair,
    DirectedPair,
    Point,
    Duration,
    File,
    Record,
}

impl BaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Float => "float",
            BaseType::String => "string",
            BaseType::Identifier => "identifier",
            BaseType::Uri => "uri",
            BaseType::Pair => "pair",
            BaseType::DirectedPair => "directedPair",
            BaseType::Point => "point",
            BaseType::Duration => "duration",
            BaseType::File => "file",
            BaseType::Record => "record",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseType::Integer | BaseType::Float)
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many scalars a variable holds and whether their order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    Single,
    Multiple,
    Ordered,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Single => "single",
            Cardinality::Multiple => "multiple",
            Cardinality::Ordered => "ordered",
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Cardinality::Single)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Scalars
// ──────────────────────────────────────────────

/// A single payload item. Durations are held in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Identifier(String),
    Uri(String),
    Pair(String, String),
    DirectedPair(String, String),
    Point(i64, i64),
    Duration(f64),
    File(String),
    Record(BTreeMap<String, Value>),
}

impl Scalar {
    pub fn base_type(&self) -> BaseType {
        match self {
            Scalar::Boolean(_) => BaseType::Boolean,
            Scalar::Integer(_) => BaseType::Integer,
            Scalar::Float(_) => BaseType::Float,
            Scalar::String(_) => BaseType::String,
            Scalar::Identifier(_) => BaseType::Identifier,
            Scalar::Uri(_) => BaseType::Uri,
            Scalar::Pair(..) => BaseType::Pair,
            Scalar::DirectedPair(..) => BaseType::DirectedPair,
            Scalar::Point(..) => BaseType::Point,
            Scalar::Duration(_) => BaseType::Duration,
            Scalar::File(_) => BaseType::File,
            Scalar::Record(_) => BaseType::Record,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Integer(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Textual key used by mappings and match tables.
    ///
    /// Pairs render as `"A B"`; records and files have no key.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Scalar::Boolean(b) => Some(b.to_string()),
            Scalar::Integer(i) => Some(i.to_string()),
            Scalar::Float(f) => Some(format_float(*f)),
            Scalar::String(s) | Scalar::Identifier(s) | Scalar::Uri(s) => Some(s.clone()),
            Scalar::Pair(a, b) | Scalar::DirectedPair(a, b) => Some(format!("{} {}", a, b)),
            Scalar::Point(x, y) => Some(format!("{} {}", x, y)),
            Scalar::Duration(d) => Some(format_float(*d)),
            Scalar::File(_) | Scalar::Record(_) => None,
        }
    }

    /// Rule-language equality: pairs are unordered, directed pairs are not,
    /// integers and floats only match their own type.
    pub fn matches(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Pair(a1, b1), Scalar::Pair(a2, b2)) => {
                (a1 == a2 && b1 == b2) || (a1 == b2 && b1 == a2)
            }
            (Scalar::Record(l), Scalar::Record(r)) => {
                l.len() == r.len()
                    && l.iter()
                        .zip(r.iter())
                        .all(|((lk, lv), (rk, rv))| lk == rk && lv.matches(rv))
            }
            _ => self == other,
        }
    }

    /// Parse a textual key into a scalar of the given base type.
    ///
    /// Used when lookup targets and mapping keys arrive as strings.
    pub fn parse(base_type: BaseType, text: &str) -> Option<Scalar> {
        let text = text.trim();
        match base_type {
            BaseType::Boolean => text.parse().ok().map(Scalar::Boolean),
            BaseType::Integer => text.parse().ok().map(Scalar::Integer),
            BaseType::Float => text.parse().ok().map(Scalar::Float),
            BaseType::Duration => text.parse().ok().map(Scalar::Duration),
            BaseType::String => Some(Scalar::String(text.to_string())),
            BaseType::Identifier => Some(Scalar::Identifier(text.to_string())),
            BaseType::Uri => Some(Scalar::Uri(text.to_string())),
            BaseType::File => Some(Scalar::File(text.to_string())),
            BaseType::Pair | BaseType::DirectedPair | BaseType::Point => {
                let mut parts = text.split_whitespace();
                let (a, b) = (parts.next()?, parts.next()?);
                if parts.next().is_some() {
                    return None;
                }
                match base_type {
                    BaseType::Pair => Some(Scalar::Pair(a.to_string(), b.to_string())),
                    BaseType::DirectedPair => {
                        Some(Scalar::DirectedPair(a.to_string(), b.to_string()))
                    }
                    _ => Some(Scalar::Point(a.parse().ok()?, b.parse().ok()?)),
                }
            }
            BaseType::Record => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Record(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Scalar::File(name) => write!(f, "file({})", name),
            other => match other.key_string() {
                Some(s) => f.write_str(&s),
                None => Ok(()),
            },
        }
    }
}

fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// The value of a rule-language variable or expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// No value. The tags record what was expected, when known.
    Null {
        #[serde(default)]
        base_type: Option<BaseType>,
        #[serde(default)]
        cardinality: Option<Cardinality>,
    },
    Single(Scalar),
    Multiple {
        base_type: BaseType,
        values: Vec<Scalar>,
    },
    Ordered {
        base_type: BaseType,
        values: Vec<Scalar>,
    },
    /// An evaluation that could not produce a value.
    Invalid {
        message: String,
        #[serde(default)]
        base_type: Option<BaseType>,
        #[serde(default)]
        cardinality: Option<Cardinality>,
    },
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

impl Value {
    pub fn null() -> Self {
        Value::Null {
            base_type: None,
            cardinality: None,
        }
    }

    pub fn typed_null(base_type: BaseType, cardinality: Cardinality) -> Self {
        Value::Null {
            base_type: Some(base_type),
            cardinality: Some(cardinality),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Value::Invalid {
            message: message.into(),
            base_type: None,
            cardinality: None,
        }
    }

    pub fn boolean(b: bool) -> Self {
        Value::Single(Scalar::Boolean(b))
    }

    pub fn integer(i: i64) -> Self {
        Value::Single(Scalar::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Value::Single(Scalar::Float(f))
    }

    pub fn identifier(s: impl Into<String>) -> Self {
        Value::Single(Scalar::Identifier(s.into()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Single(Scalar::String(s.into()))
    }

    pub fn point(x: i64, y: i64) -> Self {
        Value::Single(Scalar::Point(x, y))
    }

    pub fn multiple(base_type: BaseType, values: Vec<Scalar>) -> Self {
        Value::Multiple { base_type, values }
    }

    pub fn ordered(base_type: BaseType, values: Vec<Scalar>) -> Self {
        Value::Ordered { base_type, values }
    }

    /// Build a container of the given cardinality; `Single` takes the first
    /// scalar and yields a null when there is none.
    pub fn container(base_type: BaseType, cardinality: Cardinality, values: Vec<Scalar>) -> Self {
        match cardinality {
            Cardinality::Single => match values.into_iter().next() {
                Some(s) => Value::Single(s),
                None => Value::typed_null(base_type, Cardinality::Single),
            },
            Cardinality::Multiple => Value::Multiple { base_type, values },
            Cardinality::Ordered => Value::Ordered { base_type, values },
        }
    }

    /// True for `Null` and for empty containers.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null { .. } => true,
            Value::Multiple { values, .. } | Value::Ordered { values, .. } => values.is_empty(),
            _ => false,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid { .. })
    }

    /// True when the value cannot take part in a computation.
    pub fn is_missing(&self) -> bool {
        self.is_null() || self.is_invalid()
    }

    pub fn base_type(&self) -> Option<BaseType> {
        match self {
            Value::Null { base_type, .. } | Value::Invalid { base_type, .. } => *base_type,
            Value::Single(s) => Some(s.base_type()),
            Value::Multiple { base_type, .. } | Value::Ordered { base_type, .. } => {
                Some(*base_type)
            }
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Value::Null { cardinality, .. } | Value::Invalid { cardinality, .. } => *cardinality,
            Value::Single(_) => Some(Cardinality::Single),
            Value::Multiple { .. } => Some(Cardinality::Multiple),
            Value::Ordered { .. } => Some(Cardinality::Ordered),
        }
    }

    pub fn as_single(&self) -> Option<&Scalar> {
        match self {
            Value::Single(s) => Some(s),
            _ => None,
        }
    }

    /// The payload as a slice: one element for `Single`, the collection for
    /// containers, nothing for `Null`/`Invalid`.
    pub fn scalars(&self) -> &[Scalar] {
        match self {
            Value::Single(s) => std::slice::from_ref(s),
            Value::Multiple { values, .. } | Value::Ordered { values, .. } => values,
            _ => &[],
        }
    }

    /// Boolean coercion used by conditions: only a single `true` is true.
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Single(Scalar::Boolean(true)))
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_single().and_then(Scalar::as_f64)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_single().and_then(Scalar::as_i64)
    }

    /// Human-readable diagnostic carried by an `Invalid` value.
    pub fn invalid_message(&self) -> Option<&str> {
        match self {
            Value::Invalid { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Structural equality with rule-language scalar matching; `Multiple`
    /// compares as a multiset, `Ordered` position by position.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Single(l), Value::Single(r)) => l.matches(r),
            (Value::Ordered { values: l, .. }, Value::Ordered { values: r, .. }) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| a.matches(b))
            }
            (Value::Multiple { values: l, .. }, Value::Multiple { values: r, .. }) => {
                multiset_eq(l, r)
            }
            (l, r) if l.is_null() && r.is_null() => true,
            _ => false,
        }
    }
}

fn multiset_eq(l: &[Scalar], r: &[Scalar]) -> bool {
    if l.len() != r.len() {
        return false;
    }
    let mut used = vec![false; r.len()];
    l.iter().all(|a| {
        match r
            .iter()
            .enumerate()
            .position(|(i, b)| !used[i] && a.matches(b))
        {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null { .. } => write!(f, "NULL"),
            Value::Single(s) => write!(f, "{}", s),
            Value::Multiple { values, .. } | Value::Ordered { values, .. } => {
                let open = if matches!(self, Value::Ordered { .. }) { "<" } else { "[" };
                let close = if open == "<" { ">" } else { "]" };
                write!(f, "{}", open)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "{}", close)
            }
            Value::Invalid { message, .. } => write!(f, "INVALID({})", message),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Single(s)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
