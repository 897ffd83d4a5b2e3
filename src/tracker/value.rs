//! Dynamically-typed parameter and return values with loud typed recovery.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::TestkitError;

/// A captured parameter or return value.
///
/// Tagged variants instead of type erasure: recovery with the wrong type is a
/// reportable error carrying both tags, never a panic and never a coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer (sizes, ids, counts).
    Uint(u64),
    /// Floating-point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A span of time.
    Duration(Duration),
    /// No value (void returns).
    Unit,
}

impl Value {
    /// Tag name used in type-mismatch errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Duration(_) => "duration",
            Self::Unit => "unit",
        }
    }

    /// Recover the value as `T`, failing loudly on a tag mismatch.
    pub fn try_as<T: FromValue>(&self) -> Result<T, TestkitError> {
        T::from_value(self)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Unit
    }
}

/// Typed recovery from a [`Value`].
pub trait FromValue: Sized {
    /// Tag this type recovers from.
    const EXPECTED: &'static str;

    /// Extract `Self`, or report the mismatch.
    fn from_value(value: &Value) -> Result<Self, TestkitError>;
}

macro_rules! impl_from_value {
    ($ty:ty, $expected:literal, $variant:ident) => {
        impl FromValue for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_value(value: &Value) -> Result<Self, TestkitError> {
                match value {
                    #[allow(clippy::clone_on_copy)]
                    Value::$variant(inner) => Ok(inner.clone()),
                    other => Err(TestkitError::ValueType {
                        expected: Self::EXPECTED,
                        found: other.type_name(),
                    }),
                }
            }
        }
    };
}

impl_from_value!(bool, "bool", Bool);
impl_from_value!(i64, "int", Int);
impl_from_value!(u64, "uint", Uint);
impl_from_value!(f64, "float", Float);
impl_from_value!(String, "text", Text);
impl_from_value!(Vec<u8>, "bytes", Bytes);
impl_from_value!(Duration, "duration", Duration);

impl FromValue for () {
    const EXPECTED: &'static str = "unit";

    fn from_value(value: &Value) -> Result<Self, TestkitError> {
        match value {
            Value::Unit => Ok(()),
            other => Err(TestkitError::ValueType {
                expected: Self::EXPECTED,
                found: other.type_name(),
            }),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Uint(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Uint(u64::from(v))
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Self::Uint(v as u64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Self::Duration(v)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_values() {
        assert_eq!(Value::from(true).try_as::<bool>().unwrap(), true);
        assert_eq!(Value::from(-5i64).try_as::<i64>().unwrap(), -5);
        assert_eq!(Value::from(4096u64).try_as::<u64>().unwrap(), 4096);
        assert_eq!(Value::from(2.5f64).try_as::<f64>().unwrap(), 2.5);
        assert_eq!(
            Value::from("vertex_buffer").try_as::<String>().unwrap(),
            "vertex_buffer"
        );
        assert_eq!(
            Value::from(vec![1u8, 2, 3]).try_as::<Vec<u8>>().unwrap(),
            vec![1, 2, 3]
        );
        assert_eq!(
            Value::from(Duration::from_millis(16))
                .try_as::<Duration>()
                .unwrap(),
            Duration::from_millis(16)
        );
        Value::Unit.try_as::<()>().unwrap();
    }

    #[test]
    fn widening_conversions_land_in_expected_variants() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from(7u32), Value::Uint(7));
        assert_eq!(Value::from(7usize), Value::Uint(7));
    }

    #[test]
    fn mismatch_reports_both_tags() {
        let err = Value::from(42u64).try_as::<String>().unwrap_err();
        match err {
            TestkitError::ValueType { expected, found } => {
                assert_eq!(expected, "text");
                assert_eq!(found, "uint");
            }
            other => panic!("expected ValueType, got {other:?}"),
        }
    }

    #[test]
    fn mismatch_is_an_error_not_a_coercion() {
        // Int and Uint are distinct tags on purpose.
        assert!(Value::from(1i64).try_as::<u64>().is_err());
        assert!(Value::from(1u64).try_as::<i64>().is_err());
    }

    #[test]
    fn equality_is_tag_and_payload() {
        assert_eq!(Value::from(1u64), Value::from(1u64));
        assert_ne!(Value::from(1u64), Value::from(1i64));
        assert_ne!(Value::from("a"), Value::from("b"));
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_string(&Value::from("draw")).expect("serialize");
        let back: Value = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Value::from("draw"));
    }
}
