//! Attribute values carried by annotation nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Typed attribute value
///
/// Attribute maps are open and configuration-driven, so values are a tagged
/// union looked up by name rather than a closed schema. `List` and `Set` are
/// both treated as collections by the equivalence tests; they differ only in
/// equality (`List` is ordered, `Set` is not).
///
/// JSON arrays deserialize as `List`. `Set` is produced in memory (value
/// mappings, collected feature values) and serializes as a plain array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    #[serde(skip_deserializing)]
    Set(Vec<Value>),
}

impl Value {
    /// Build a set, dropping duplicate members
    pub fn set(values: impl IntoIterator<Item = Value>) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for value in values {
            if !members.contains(&value) {
                members.push(value);
            }
        }
        Value::Set(members)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Members if this value is a collection
    pub fn as_collection(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Collection membership test; `None` for scalars
    pub fn collection_contains(&self, value: &Value) -> Option<bool> {
        self.as_collection().map(|items| items.contains(value))
    }

    /// Textual form used by unit-of-analysis filters
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::List(_) | Value::Set(_) => None,
        }
    }

    fn kind_tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::Str(_) => 4,
            Value::List(_) => 5,
            Value::Set(_) => 6,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bitwise so that NaN equals itself and Eq/Hash stay lawful
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_tag().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::List(items) => items.hash(state),
            Value::Set(items) => {
                // Order-independent: combine member hashes commutatively
                use std::collections::hash_map::DefaultHasher;
                let combined = items.iter().fold(0u64, |acc, item| {
                    let mut hasher = DefaultHasher::new();
                    item.hash(&mut hasher);
                    acc.wrapping_add(hasher.finish())
                });
                items.len().hash(state);
                combined.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
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

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scalar_kinds_do_not_cross_compare() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::from("1"));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let a = Value::set(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::set(vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(a, b);

        let mut seen = HashSet::new();
        seen.insert(a);
        assert!(seen.contains(&b));
    }

    #[test]
    fn test_list_equality_is_ordered() {
        let a = Value::List(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::List(vec![Value::Int(2), Value::Int(1)]);
        assert_ne!(a, b);
        assert_ne!(a, Value::set(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn test_set_constructor_deduplicates() {
        let set = Value::set(vec![Value::from("a"), Value::from("a"), Value::from("b")]);
        assert_eq!(set.as_collection().map(|items| items.len()), Some(2));
    }

    #[test]
    fn test_deserialize_untagged_json() {
        let value: Value = serde_json::from_str(r#"[1, "x", null, true, 2.5]"#).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Int(1),
                Value::from("x"),
                Value::Null,
                Value::Bool(true),
                Value::Float(2.5),
            ])
        );
    }

    #[test]
    fn test_display_renders_collections() {
        let value = Value::List(vec![Value::Int(1), Value::from("b")]);
        assert_eq!(value.to_string(), "[1, b]");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
