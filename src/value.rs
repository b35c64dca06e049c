pub mod serializer;

use crate::Result;
use crate::error::TemplateError;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub use serializer::{ValueSerializer, to_value};

/// A JSON-like value flowing through template contexts.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    /// Ordered list of values (e.g. arrays, tuples)
    List(Vec<Value>),
    /// Key-value map (e.g. structs, JSON objects), ordered by key
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I64(_) | Value::F64(_) => "number",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::I64(n) => *n != 0,
            Value::F64(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I64(n) => Some(*n as f64),
            Value::F64(n) => Some(*n),
            _ => None,
        }
    }

    /// Equality with numeric promotion: `1 == 1.0`. Values of different
    /// kinds are simply unequal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::I64(l), Value::I64(r)) => l == r,
            (Value::List(l), Value::List(r)) => {
                l.len() == r.len() && l.iter().zip(r).all(|(a, b)| a.loose_eq(b))
            }
            (Value::Map(l), Value::Map(r)) => {
                l.len() == r.len()
                    && l
                        .iter()
                        .all(|(k, v)| r.get(k).is_some_and(|other| v.loose_eq(other)))
            }
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(l), Some(r)) => l == r,
                _ => self == other,
            },
        }
    }

    /// Ordering between two scalars of the same kind. Anything else fails
    /// instead of coercing.
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering> {
        let ordering = match (self, other) {
            (Value::I64(l), Value::I64(r)) => Some(l.cmp(r)),
            (Value::Str(l), Value::Str(r)) => Some(l.cmp(r)),
            (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => None,
            },
        };
        ordering.ok_or_else(|| TemplateError::Incomparable {
            left: self.kind().to_string(),
            right: other.kind().to_string(),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I64(n) => write!(f, "{}", n),
            // Exponent form outside [1e-5, 1e16).
            Value::F64(n) if n.is_finite() && *n != 0.0 && !(1e-5..1e16).contains(&n.abs()) => {
                write!(f, "{:e}", n)
            }
            Value::F64(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{:.1}", n),
            Value::F64(n) => write!(f, "{}", n),
            Value::Str(s) => f.write_str(s),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(n) => serializer.serialize_i64(*n),
            Value::F64(n) => serializer.serialize_f64(*n),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for v in list {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($rust_type:ty, $variant:ident, $target:ty) => {
        impl From<$rust_type> for Value {
            fn from(v: $rust_type) -> Self {
                Value::$variant(<$target>::from(v))
            }
        }
    };
}

impl_from_primitive!(bool, Bool, bool);
impl_from_primitive!(i8, I64, i64);
impl_from_primitive!(i16, I64, i64);
impl_from_primitive!(i32, I64, i64);
impl_from_primitive!(i64, I64, i64);
impl_from_primitive!(u8, I64, i64);
impl_from_primitive!(u16, I64, i64);
impl_from_primitive!(u32, I64, i64);
impl_from_primitive!(f32, F64, f64);
impl_from_primitive!(f64, F64, f64);
impl_from_primitive!(String, Str, String);
impl_from_primitive!(&str, Str, String);

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Value::F64(v as f64), Value::I64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(v: HashMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(v: BTreeMap<String, T>) -> Self {
        Value::Map(v.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::I64(i),
                None => Value::F64(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => a.into(),
            serde_json::Value::Object(o) => {
                Value::Map(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}
