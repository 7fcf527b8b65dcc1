use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A value that can be kept in a store.
///
/// Single-precision floats have no variant of their own: they are widened
/// to `Double`, which is exact, so narrowing them back yields the original.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 text.
    String(String),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// Boolean flag.
    Boolean(bool),
    /// Opaque byte blob.
    Data(Vec<u8>),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Nested key-value mapping.
    Dictionary(HashMap<String, Value>),
    /// Ordered list.
    Array(Vec<Value>),
}

/// A boxed number of any numeric kind.
///
/// Unlike [`Value`], a `Number` converts leniently between kinds: a boolean
/// reads back as `0`/`1`, an integral double reads back as an integer, and
/// any non-zero number reads back as `true`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double-precision float.
    Double(f64),
    /// Fixed-point decimal.
    Decimal(Decimal),
    /// Boolean flag.
    Boolean(bool),
}

impl Number {
    /// Returns the number as an integer, if it is integral and in range.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Number::Integer(i) => Some(i),
            Number::Double(d) => integral_f64(d),
            Number::Decimal(d) => d.fract().is_zero().then(|| d.to_i64()).flatten(),
            Number::Boolean(b) => Some(i64::from(b)),
        }
    }

    /// Returns the number as a double.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Number::Integer(i) => Some(i as f64),
            Number::Double(d) => Some(d),
            Number::Decimal(d) => d.to_f64(),
            Number::Boolean(b) => Some(if b { 1.0 } else { 0.0 }),
        }
    }

    /// Returns the number as a single-precision float.
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|d| d as f32)
    }

    /// Returns the number as a decimal.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match *self {
            Number::Integer(i) => Some(Decimal::from(i)),
            Number::Double(d) => Decimal::from_f64(d),
            Number::Decimal(d) => Some(d),
            Number::Boolean(b) => Some(Decimal::from(i64::from(b))),
        }
    }

    /// Returns `true` for any non-zero number.
    pub fn as_bool(&self) -> bool {
        match *self {
            Number::Integer(i) => i != 0,
            Number::Double(d) => d != 0.0,
            Number::Decimal(d) => !d.is_zero(),
            Number::Boolean(b) => b,
        }
    }
}

impl Value {
    /// Returns the text if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// Integral doubles and decimals within range are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Double(d) => integral_f64(*d),
            Value::Decimal(d) => d.fract().is_zero().then(|| d.to_i64()).flatten(),
            _ => None,
        }
    }

    /// Returns the value as a double. Integers and decimals are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Returns the value as a single-precision float.
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|d| d as f32)
    }

    /// Returns the value as a decimal.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(d) => Some(*d),
            Value::Integer(i) => Some(Decimal::from(*i)),
            Value::Double(d) => Decimal::from_f64(*d),
            _ => None,
        }
    }

    /// Returns the flag if this is a `Boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value boxed as a [`Number`] if it is numeric.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(i) => Some(Number::Integer(*i)),
            Value::Double(d) => Some(Number::Double(*d)),
            Value::Decimal(d) => Some(Number::Decimal(*d)),
            Value::Boolean(b) => Some(Number::Boolean(*b)),
            _ => None,
        }
    }

    /// Returns the bytes if this is a `Data` blob.
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Value::Data(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Returns the point in time if this is a `Date`.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    /// Returns the nested mapping if this is a `Dictionary`.
    pub fn as_dictionary(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Dictionary(dict) => Some(dict),
            _ => None,
        }
    }

    /// Returns the elements if this is an `Array`.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl Value {
    /// Returns `true` if no double inside this value is NaN or infinite.
    pub(crate) fn is_finite(&self) -> bool {
        match self {
            Value::Double(d) => d.is_finite(),
            Value::Dictionary(dict) => dict.values().all(Value::is_finite),
            Value::Array(items) => items.iter().all(Value::is_finite),
            _ => true,
        }
    }
}

impl Number {
    /// Returns `true` unless this is a NaN or infinite double.
    pub(crate) fn is_finite(&self) -> bool {
        match self {
            Number::Double(d) => d.is_finite(),
            _ => true,
        }
    }
}

fn integral_f64(d: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if d.fract() == 0.0 && d >= i64::MIN as f64 && d < i64::MAX as f64 {
        Some(d as i64)
    } else {
        None
    }
}

impl From<Number> for Value {
    fn from(number: Number) -> Self {
        match number {
            Number::Integer(i) => Value::Integer(i),
            Number::Double(d) => Value::Double(d),
            Number::Decimal(d) => Value::Decimal(d),
            Number::Boolean(b) => Value::Boolean(b),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Double(f64::from(f))
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Data(bytes)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Value::Date(date)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(dict: HashMap<String, Value>) -> Self {
        Value::Dictionary(dict)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Data(bytes) => {
                write!(f, "<")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, ">")
            }
            Value::Date(date) => write!(f, "{}", date.to_rfc3339()),
            Value::Dictionary(dict) => {
                let mut keys: Vec<&String> = dict.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key} = {}", dict[key])?;
                }
                write!(f, "}}")
            }
            Value::Array(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
