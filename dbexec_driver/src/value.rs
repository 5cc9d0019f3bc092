use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A dynamically typed column or parameter value
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Bytes(Vec<u8>),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Value::I8(_)
                | Value::I16(_)
                | Value::I32(_)
                | Value::I64(_)
                | Value::U8(_)
                | Value::U16(_)
                | Value::U32(_)
                | Value::U64(_)
                | Value::F32(_)
                | Value::F64(_)
        )
    }

    /// Name of the variant, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::String(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Bytes(bytes) => write!(f, "{}", STANDARD.encode(bytes)),
            Value::I8(value) => write!(f, "{value}"),
            Value::I16(value) => write!(f, "{value}"),
            Value::I32(value) => write!(f, "{value}"),
            Value::I64(value) => write!(f, "{value}"),
            Value::U8(value) => write!(f, "{value}"),
            Value::U16(value) => write!(f, "{value}"),
            Value::U32(value) => write!(f, "{value}"),
            Value::U64(value) => write!(f, "{value}"),
            Value::F32(value) => write!(f, "{value}"),
            Value::F64(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value}"),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(value) => value.hash(state),
            Value::Bytes(value) => value.hash(state),
            Value::I8(value) => value.hash(state),
            Value::I16(value) => value.hash(state),
            Value::I32(value) => value.hash(state),
            Value::I64(value) => value.hash(state),
            Value::U8(value) => value.hash(state),
            Value::U16(value) => value.hash(state),
            Value::U32(value) => value.hash(state),
            Value::U64(value) => value.hash(state),
            Value::F32(value) => value.to_bits().hash(state),
            Value::F64(value) => value.to_bits().hash(state),
            Value::String(value) => value.hash(state),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(value) => serializer.serialize_bool(value),
            Value::Bytes(ref value) => serializer.serialize_bytes(value),
            Value::I8(value) => serializer.serialize_i8(value),
            Value::I16(value) => serializer.serialize_i16(value),
            Value::I32(value) => serializer.serialize_i32(value),
            Value::I64(value) => serializer.serialize_i64(value),
            Value::U8(value) => serializer.serialize_u8(value),
            Value::U16(value) => serializer.serialize_u16(value),
            Value::U32(value) => serializer.serialize_u32(value),
            Value::U64(value) => serializer.serialize_u64(value),
            Value::F32(value) => serializer.serialize_f32(value),
            Value::F64(value) => serializer.serialize_f64(value),
            Value::String(ref value) => serializer.serialize_str(value),
        }
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    Vec<u8> => Bytes,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Null.is_numeric());
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::default(), Value::Null);
        assert_eq!(json!(Value::Null), json!(serde_json::Value::Null));
    }

    #[test]
    fn test_bool() {
        assert!(!Value::Bool(true).is_null());
        assert!(!Value::Bool(true).is_numeric());
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(json!(Value::Bool(true)), json!(true));
    }

    #[test]
    fn test_bytes() {
        let value = Value::Bytes(vec![114, 117, 115, 116]);
        assert!(!value.is_numeric());
        assert_eq!(value.to_string(), "cnVzdA==");
        assert_eq!(value.type_name(), "bytes");
    }

    #[test]
    fn test_integers() {
        assert!(Value::I64(i64::MIN).is_numeric());
        assert_eq!(Value::I64(i64::MIN).to_string(), "-9223372036854775808");
        assert_eq!(Value::U64(u64::MAX).to_string(), "18446744073709551615");
        assert_eq!(json!(Value::I32(i32::MAX)), json!(i32::MAX));
        assert_eq!(json!(Value::U8(u8::MAX)), json!(u8::MAX));
    }

    #[test]
    fn test_floats() {
        assert!(Value::F64(12_345.678_90).is_numeric());
        assert!(Value::F64(12_345.678_90).to_string().starts_with("12345."));
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_eq!(json!(Value::F64(12_345.678_90)), json!(12_345.678_90));
    }

    #[test]
    fn test_string() {
        let value = Value::String("foo".to_string());
        assert!(!value.is_numeric());
        assert_eq!(value.to_string(), "foo");
        assert_eq!(json!(value), json!("foo"));
    }

    #[test]
    fn test_variants_are_distinct() {
        assert_ne!(Value::I32(1), Value::I64(1));
        assert_ne!(Value::Null, Value::String(String::new()));
    }

    #[test]
    fn test_from() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(vec![42u8]), Value::Bytes(vec![42]));
        assert_eq!(Value::from(&[42u8][..]), Value::Bytes(vec![42]));
        assert_eq!(Value::from(7i32), Value::I32(7));
        assert_eq!(Value::from(7u64), Value::U64(7));
        assert_eq!(Value::from(42.1f64), Value::F64(42.1));
        assert_eq!(Value::from("foo"), Value::String("foo".to_string()));
        assert_eq!(Value::from(Some(7i64)), Value::I64(7));
        assert_eq!(Value::from(None::<String>), Value::Null);
    }
}
