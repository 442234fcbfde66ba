//! Dynamically-typed SQL values.
//!
//! `Value` mirrors SQLite's five storage classes. Model fields move in and out
//! of it through [`ToValue`] and [`FromValue`], which the derive macro calls
//! for every persisted field.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TypeError};

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Storage class name, used in conversion errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the integer payload, if any.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the text payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way it would be compared as text
    /// (NULL renders as an empty string).
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(v) => v.to_string(),
            Value::Real(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Convert a Rust value into a [`Value`] without consuming it.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert a [`Value`] read from the database into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;

    /// Stand-in for a NULL stored in a column whose field is not an
    /// `Option`, such as rows that predate an added column. `None` keeps
    /// NULL an error.
    fn from_null() -> Option<Self> {
        None
    }
}

fn mismatch(expected: &'static str, value: &Value) -> crate::Error {
    TypeError::new(expected, value.type_name()).into()
}

macro_rules! impl_integer {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Integer(*self as i64)
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::Integer(v) => <$ty>::try_from(*v).map_err(|_| {
                            TypeError::new(stringify!($ty), format!("out-of-range integer {v}")).into()
                        }),
                        Value::Real(v) if v.fract() == 0.0 => Ok(*v as $ty),
                        Value::Text(s) => s.trim().parse::<$ty>().map_err(|_| mismatch(stringify!($ty), value)),
                        _ => Err(mismatch(stringify!($ty), value)),
                    }
                }

                fn from_null() -> Option<Self> {
                    Some(0)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.to_value()
                }
            }
        )+
    };
}

impl_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Real(f64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    match value {
                        Value::Real(v) => Ok(*v as $ty),
                        Value::Integer(v) => Ok(*v as $ty),
                        Value::Text(s) => s.trim().parse::<$ty>().map_err(|_| mismatch(stringify!($ty), value)),
                        _ => Err(mismatch(stringify!($ty), value)),
                    }
                }

                fn from_null() -> Option<Self> {
                    Some(0.0)
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.to_value()
                }
            }
        )+
    };
}

impl_float!(f32, f64);

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Integer(v) => Ok(*v != 0),
            Value::Real(v) => Ok(*v != 0.0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" | "" => Ok(false),
                _ => Err(mismatch("bool", value)),
            },
            _ => Err(mismatch("bool", value)),
        }
    }

    fn from_null() -> Option<Self> {
        Some(false)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        v.to_value()
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

// SQLite hands back whatever storage class was written; text columns read
// loosely so integer-typed legacy data still loads.
impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Integer(_) | Value::Real(_) => Ok(value.to_text()),
            Value::Blob(b) => String::from_utf8(b.clone()).map_err(|_| mismatch("String", value)),
            Value::Null => Err(mismatch("String", value)),
        }
    }

    fn from_null() -> Option<Self> {
        Some(String::new())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl ToValue for char {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for char {
    fn from_value(value: &Value) -> Result<Self> {
        let mut chars = match value {
            Value::Text(s) => s.chars(),
            _ => return Err(mismatch("char", value)),
        };
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(mismatch("char", value)),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }

    fn from_null() -> Option<Self> {
        Some(Vec::new())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => serde_json::from_str(s).map_err(|e| {
                TypeError::new("serde_json::Value", format!("invalid JSON text ({e})")).into()
            }),
            Value::Null => Ok(serde_json::Value::Null),
            _ => Err(mismatch("serde_json::Value", value)),
        }
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions() {
        assert_eq!(42_i32.to_value(), Value::Integer(42));
        assert_eq!(i32::from_value(&Value::Integer(42)).unwrap(), 42);
        assert_eq!(u8::from_value(&Value::Text("7".into())).unwrap(), 7);
        assert!(u8::from_value(&Value::Integer(300)).is_err());
        assert!(i64::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_bool_stored_as_integer() {
        assert_eq!(true.to_value(), Value::Integer(1));
        assert!(bool::from_value(&Value::Integer(1)).unwrap());
        assert!(!bool::from_value(&Value::Integer(0)).unwrap());
    }

    #[test]
    fn test_string_reads_loosely() {
        assert_eq!(String::from_value(&Value::Integer(5)).unwrap(), "5");
        assert!(String::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<i64>::None.to_value(), Value::Null);
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<String>::from_value(&Value::Text("x".into())).unwrap(),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_json_round_trips_through_text() {
        let doc = serde_json::json!({"tags": ["a", "b"]});
        let stored = doc.to_value();
        assert!(matches!(stored, Value::Text(_)));
        assert_eq!(serde_json::Value::from_value(&stored).unwrap(), doc);
    }

    #[test]
    fn test_from_null_zero_values() {
        assert_eq!(i32::from_null(), Some(0));
        assert_eq!(f64::from_null(), Some(0.0));
        assert_eq!(bool::from_null(), Some(false));
        assert_eq!(String::from_null(), Some(String::new()));
        assert_eq!(char::from_null(), None);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Null.to_text(), "");
        assert_eq!(Value::Integer(3).to_text(), "3");
        assert_eq!(Value::from("abc").to_text(), "abc");
    }
}
