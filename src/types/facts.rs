use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::condition::CompareOp;

/// A host object exposing named fields to the path resolver.
///
/// Two records are equal when they share a type name and every field value is
/// equal, which lets records key the executor's memo cache by value.
pub trait Record: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn field(&self, name: &str) -> Option<Facts>;

    /// Field names in a stable order. Drives wildcard expansion.
    fn field_names(&self) -> Vec<String>;
}

/// The data graph being validated.
///
/// Containers are shared behind `Arc`, so cloning a `Facts` is cheap no matter
/// how large the graph is.
#[derive(Debug, Clone, Default)]
pub enum Facts {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Arc<Vec<Facts>>),
    Map(Arc<BTreeMap<String, Facts>>),
    Record(Arc<dyn Record>),
}

impl Facts {
    /// Build a map from key/value pairs.
    #[must_use]
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Facts>,
    {
        Facts::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Build a list from values.
    #[must_use]
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Facts>,
    {
        Facts::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn record(record: impl Record + 'static) -> Self {
        Facts::Record(Arc::new(record))
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Facts::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Facts::Bool(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Facts::Int(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Facts::Float(v) => Some(*v),
            Facts::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Facts::Text(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Facts]> {
        match self {
            Facts::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Facts>> {
        match self {
            Facts::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// A short name for the kind of value, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Facts::Null => "null",
            Facts::Bool(_) => "bool",
            Facts::Int(_) => "int",
            Facts::Float(_) => "float",
            Facts::Text(_) => "text",
            Facts::List(_) => "list",
            Facts::Map(_) => "map",
            Facts::Record(r) => r.type_name(),
        }
    }

    /// Compare this value to another using the given operator.
    ///
    /// Null-safe: two nulls are equal, a null and a non-null are unequal, and
    /// ordering operators involving exactly one null are false. Returns `None`
    /// for incompatible types.
    #[must_use]
    pub fn compare(&self, op: CompareOp, other: &Facts) -> Option<bool> {
        match (self, other) {
            (Facts::Null, Facts::Null) => {}
            (Facts::Null, _) | (_, Facts::Null) => {
                return Some(matches!(op, CompareOp::Neq));
            }
            _ => {}
        }
        let ord = self.partial_cmp_value(other)?;
        Some(match op {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Neq => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn partial_cmp_value(&self, other: &Facts) -> Option<Ordering> {
        match (self, other) {
            (Facts::Null, Facts::Null) => Some(Ordering::Equal),
            (Facts::Int(a), Facts::Int(b)) => a.partial_cmp(b),
            (Facts::Float(a), Facts::Float(b)) => a.partial_cmp(b),
            (Facts::Int(a), Facts::Float(b)) => (*a as f64).partial_cmp(b),
            (Facts::Float(a), Facts::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Facts::Bool(a), Facts::Bool(b)) => Some(a.cmp(b)),
            (Facts::Text(a), Facts::Text(b)) => a.partial_cmp(b),
            // Containers only support equality.
            (Facts::List(_), Facts::List(_))
            | (Facts::Map(_), Facts::Map(_))
            | (Facts::Record(_), Facts::Record(_)) => {
                if self == other {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

impl PartialEq for Facts {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Facts::Null, Facts::Null) => true,
            (Facts::Bool(a), Facts::Bool(b)) => a == b,
            (Facts::Int(a), Facts::Int(b)) => a == b,
            (Facts::Float(a), Facts::Float(b)) => a.to_bits() == b.to_bits(),
            (Facts::Text(a), Facts::Text(b)) => a == b,
            (Facts::List(a), Facts::List(b)) => Arc::ptr_eq(a, b) || a == b,
            (Facts::Map(a), Facts::Map(b)) => Arc::ptr_eq(a, b) || a == b,
            (Facts::Record(a), Facts::Record(b)) => records_equal(a, b),
            _ => false,
        }
    }
}

impl Eq for Facts {}

fn records_equal(a: &Arc<dyn Record>, b: &Arc<dyn Record>) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    if a.type_name() != b.type_name() {
        return false;
    }
    let names = a.field_names();
    names == b.field_names() && names.iter().all(|n| a.field(n) == b.field(n))
}

impl Hash for Facts {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Facts::Null => {}
            Facts::Bool(v) => v.hash(state),
            Facts::Int(v) => v.hash(state),
            Facts::Float(v) => v.to_bits().hash(state),
            Facts::Text(v) => v.hash(state),
            Facts::List(items) => items.hash(state),
            Facts::Map(entries) => entries.hash(state),
            // Field values are left out; equal records still hash equally.
            Facts::Record(r) => {
                r.type_name().hash(state);
                r.field_names().hash(state);
            }
        }
    }
}

impl From<i64> for Facts {
    fn from(v: i64) -> Self {
        Facts::Int(v)
    }
}

impl From<i32> for Facts {
    fn from(v: i32) -> Self {
        Facts::Int(i64::from(v))
    }
}

impl From<f64> for Facts {
    fn from(v: f64) -> Self {
        Facts::Float(v)
    }
}

impl From<bool> for Facts {
    fn from(v: bool) -> Self {
        Facts::Bool(v)
    }
}

impl From<&str> for Facts {
    fn from(v: &str) -> Self {
        Facts::Text(v.to_owned())
    }
}

impl From<String> for Facts {
    fn from(v: String) -> Self {
        Facts::Text(v)
    }
}

impl From<Vec<Facts>> for Facts {
    fn from(v: Vec<Facts>) -> Self {
        Facts::List(Arc::new(v))
    }
}

impl From<BTreeMap<String, Facts>> for Facts {
    fn from(v: BTreeMap<String, Facts>) -> Self {
        Facts::Map(Arc::new(v))
    }
}

impl<T: Into<Facts>> From<Option<T>> for Facts {
    fn from(v: Option<T>) -> Self {
        v.map_or(Facts::Null, Into::into)
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Value> for Facts {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Facts::Null,
            Json::Bool(b) => Facts::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Facts::Int(i),
                None => n.as_f64().map_or(Facts::Null, Facts::Float),
            },
            Json::String(s) => Facts::Text(s),
            Json::Array(items) => Facts::list(items),
            Json::Object(entries) => Facts::map(entries),
        }
    }
}

impl fmt::Display for Facts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facts::Null => write!(f, "null"),
            Facts::Bool(v) => write!(f, "{v}"),
            Facts::Int(v) => write!(f, "{v}"),
            Facts::Float(v) => write!(f, "{v}"),
            Facts::Text(v) => write!(f, "\"{v}\""),
            Facts::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Facts::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "\"{k}\": {v}")?;
                }
                write!(f, "}}")
            }
            Facts::Record(r) => write!(f, "{}{{..}}", r.type_name()),
        }
    }
}

/// Conversion from [`Facts`] into a typed value, used by
/// [`Value`](super::Value) lookups.
pub trait FromFacts: Sized {
    /// The expected kind, for error messages.
    const EXPECTED: &'static str;

    fn from_facts(facts: &Facts) -> Option<Self>;
}

impl FromFacts for Facts {
    const EXPECTED: &'static str = "any";

    fn from_facts(facts: &Facts) -> Option<Self> {
        Some(facts.clone())
    }
}

impl FromFacts for bool {
    const EXPECTED: &'static str = "bool";

    fn from_facts(facts: &Facts) -> Option<Self> {
        facts.as_bool()
    }
}

impl FromFacts for i64 {
    const EXPECTED: &'static str = "int";

    fn from_facts(facts: &Facts) -> Option<Self> {
        facts.as_i64()
    }
}

impl FromFacts for f64 {
    const EXPECTED: &'static str = "float";

    fn from_facts(facts: &Facts) -> Option<Self> {
        facts.as_f64()
    }
}

impl FromFacts for String {
    const EXPECTED: &'static str = "text";

    fn from_facts(facts: &Facts) -> Option<Self> {
        match facts {
            Facts::Text(s) => Some(s.clone()),
            Facts::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

impl<T: FromFacts> FromFacts for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_facts(facts: &Facts) -> Option<Self> {
        if facts.is_null() {
            Some(None)
        } else {
            T::from_facts(facts).map(Some)
        }
    }
}
