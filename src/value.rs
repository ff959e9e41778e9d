//! Runtime values and the variable context templates are evaluated against

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A dynamically typed template value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Numeric view of a value
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

impl Value {
    /// The empty-coalescing rule: empty values render as "" and test false.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty() || s == "0",
            Value::List(items) => items.is_empty(),
            Value::Map(entries) => entries.is_empty(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        !self.is_empty()
    }

    /// Parse a numeric literal as written in a template (`12`, `-3.5`, `.5`, `0x1f`)
    pub fn parse_number(text: &str) -> Option<Value> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if let Some(hex) = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
        {
            if let Ok(n) = i64::from_str_radix(hex, 16) {
                return Some(Value::Int(if negative { -n } else { n }));
            }
            // past the integer range hex literals widen to floats
            let n = hex
                .chars()
                .try_fold(0f64, |acc, c| c.to_digit(16).map(|d| acc * 16.0 + f64::from(d)))
                .filter(|_| !hex.is_empty())?;
            return Some(Value::Float(if negative { -n } else { n }));
        }
        if !digits.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return Some(Value::Int(n));
            }
        }
        text.parse::<f64>().ok().map(Value::Float)
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Value::Null => Some(Number::Int(0)),
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::Str(s) => numeric_str(s),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Whether this value is a number or a string that reads as one
    pub(crate) fn is_numeric(&self) -> bool {
        match self {
            Value::Int(_) | Value::Float(_) => true,
            Value::Str(s) => numeric_str(s).is_some(),
            _ => false,
        }
    }

    pub(crate) fn as_int(&self) -> Option<i64> {
        match self.as_number()? {
            Number::Int(i) => Some(i),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(f as i64),
            Number::Float(_) => None,
        }
    }

    /// Loose (`==`) equality
    pub(crate) fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
                self.is_truthy() == other.is_truthy()
            }
            (Value::List(_) | Value::Map(_), _) | (_, Value::List(_) | Value::Map(_)) => {
                self == other
            }
            _ if self.is_numeric() && other.is_numeric() => {
                self.loose_cmp(other) == Some(Ordering::Equal)
            }
            _ => self.to_string() == other.to_string(),
        }
    }

    /// Ordering used by `<`, `>`, `<=` and `>=`
    pub(crate) fn loose_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_numeric() && other.is_numeric() {
            return match (self.as_number()?, other.as_number()?) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            };
        }
        match (self, other) {
            (Value::Null | Value::Bool(_), _) | (_, Value::Null | Value::Bool(_)) => {
                Some(self.is_truthy().cmp(&other.is_truthy()))
            }
            _ => Some(self.to_string().cmp(&other.to_string())),
        }
    }

    /// Map entry lookup
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.get(key),
            Value::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// List element lookup; maps are searched for the decimal key
    pub fn get_index(&self, index: i64) -> Option<&Value> {
        match self {
            Value::List(items) => usize::try_from(index).ok().and_then(|i| items.get(i)),
            Value::Map(entries) => entries.get(&index.to_string()),
            _ => None,
        }
    }
}

fn numeric_str(s: &str) -> Option<Number> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Number::Int(i));
    }
    // reject "inf"/"nan" spellings that f64::from_str accepts
    if !trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    trimmed.parse::<f64>().ok().map(Number::Float)
}

/// Textual form used when a value is interpolated
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Bool(false) => Ok(()),
            Value::Bool(true) => f.write_str("1"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => write_joined(f, items.iter()),
            Value::Map(entries) => write_joined(f, entries.values()),
        }
    }
}

fn write_joined<'a>(
    f: &mut fmt::Formatter<'_>,
    values: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    let mut first = true;
    for value in values.filter(|v| v.is_truthy()) {
        if !first {
            f.write_str(", ")?;
        }
        write!(f, "{}", value)?;
        first = false;
    }
    Ok(())
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

/// Variables visible to a template, owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    vars: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a variable, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Merge another context into this one; entries from `other` win
    pub fn extend(&mut self, other: Context) {
        self.vars.extend(other.vars);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Load variables from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load variables from a JSON object
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, Value>> for Context {
    fn from(vars: BTreeMap<String, Value>) -> Self {
        Self { vars }
    }
}
