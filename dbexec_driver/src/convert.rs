use crate::Error::ScalarConversionError;
use crate::Value;
use crate::error::{Error, Result};

/// Conversion of a driver [`Value`] into a Rust type.
///
/// Conversions follow the usual scalar rules: integers convert between widths when the value
/// is in range, floats convert to integers by rounding half to even, numbers and booleans
/// convert to each other, and strings are parsed.  `Null` only converts to [`Value`] and
/// [`Option`]; callers that treat null as "absent" check for it before converting.
pub trait FromValue: Sized {
    /// Name of the target type, used in diagnostics
    const TYPE_NAME: &'static str;

    /// Convert the value into this type
    ///
    /// # Errors
    /// * [`ScalarConversionError`](Error::ScalarConversionError) if the value cannot be converted
    fn from_value(value: Value) -> Result<Self>;
}

fn conversion_error<T: FromValue>(value: &Value) -> Error {
    ScalarConversionError {
        value: value.to_string(),
        target: T::TYPE_NAME,
    }
}

fn as_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Bool(value) => Some(i128::from(*value)),
        Value::I8(value) => Some(i128::from(*value)),
        Value::I16(value) => Some(i128::from(*value)),
        Value::I32(value) => Some(i128::from(*value)),
        Value::I64(value) => Some(i128::from(*value)),
        Value::U8(value) => Some(i128::from(*value)),
        Value::U16(value) => Some(i128::from(*value)),
        Value::U32(value) => Some(i128::from(*value)),
        Value::U64(value) => Some(i128::from(*value)),
        Value::F32(value) => float_to_integer(f64::from(*value)),
        Value::F64(value) => float_to_integer(*value),
        _ => None,
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_integer(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    let rounded = value.round_ties_even();
    if rounded < i128::MIN as f64 || rounded > i128::MAX as f64 {
        return None;
    }
    Some(rounded as i128)
}

#[expect(clippy::cast_precision_loss)]
fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(value) => Some(f64::from(u8::from(*value))),
        Value::I8(value) => Some(f64::from(*value)),
        Value::I16(value) => Some(f64::from(*value)),
        Value::I32(value) => Some(f64::from(*value)),
        Value::I64(value) => Some(*value as f64),
        Value::U8(value) => Some(f64::from(*value)),
        Value::U16(value) => Some(f64::from(*value)),
        Value::U32(value) => Some(f64::from(*value)),
        Value::U64(value) => Some(*value as f64),
        Value::F32(value) => Some(f64::from(*value)),
        Value::F64(value) => Some(*value),
        _ => None,
    }
}

macro_rules! impl_integer {
    ($($target:ty),* $(,)?) => {
        $(
            impl FromValue for $target {
                const TYPE_NAME: &'static str = stringify!($target);

                fn from_value(value: Value) -> Result<Self> {
                    if let Value::String(text) = &value {
                        return text
                            .trim()
                            .parse::<$target>()
                            .map_err(|_| conversion_error::<Self>(&value));
                    }
                    as_integer(&value)
                        .and_then(|integer| <$target>::try_from(integer).ok())
                        .ok_or_else(|| conversion_error::<Self>(&value))
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: Value) -> Result<Self> {
        if let Value::String(text) = &value {
            return text
                .trim()
                .parse::<f64>()
                .map_err(|_| conversion_error::<Self>(&value));
        }
        as_float(&value).ok_or_else(|| conversion_error::<Self>(&value))
    }
}

impl FromValue for f32 {
    const TYPE_NAME: &'static str = "f32";

    #[expect(clippy::cast_possible_truncation)]
    fn from_value(value: Value) -> Result<Self> {
        if let Value::F32(value) = value {
            return Ok(value);
        }
        let double = f64::from_value(value.clone()).map_err(|_| conversion_error::<Self>(&value))?;
        if double.is_finite() && double.abs() > f64::from(f32::MAX) {
            return Err(conversion_error::<Self>(&value));
        }
        Ok(double as f32)
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Bool(value) => Ok(*value),
            Value::String(text) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(conversion_error::<Self>(&value))
                }
            }
            other => as_float(other)
                .map(|number| number != 0.0)
                .ok_or_else(|| conversion_error::<Self>(&value)),
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "String";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(value) => Ok(value),
            other @ (Value::Null | Value::Bytes(_)) => Err(conversion_error::<Self>(&other)),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    const TYPE_NAME: &'static str = "Vec<u8>";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(conversion_error::<Self>(&other)),
        }
    }
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "Value";

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}
