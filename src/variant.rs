//! Tagged argument values stored on measure steps and step results.

use crate::error::{ErrorCode, OswError, Result};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Tag of a [`Variant`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Boolean,
    Double,
    Integer,
    String,
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VariantType::Boolean => "Boolean",
            VariantType::Double => "Double",
            VariantType::Integer => "Integer",
            VariantType::String => "String",
        };
        f.write_str(name)
    }
}

/// A boolean, integer, double or string value.
///
/// The tag is fixed at construction. `value_as_double` also reads an
/// `Integer`; every other accessor requires its own tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Boolean(bool),
    Integer(i32),
    Double(f64),
    String(String),
}

impl Variant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Boolean(_) => VariantType::Boolean,
            Variant::Integer(_) => VariantType::Integer,
            Variant::Double(_) => VariantType::Double,
            Variant::String(_) => VariantType::String,
        }
    }

    pub fn value_as_boolean(&self) -> Result<bool> {
        match self {
            Variant::Boolean(b) => Ok(*b),
            other => Err(other.mismatch(VariantType::Boolean)),
        }
    }

    pub fn value_as_integer(&self) -> Result<i32> {
        match self {
            Variant::Integer(i) => Ok(*i),
            other => Err(other.mismatch(VariantType::Integer)),
        }
    }

    pub fn value_as_double(&self) -> Result<f64> {
        match self {
            Variant::Double(d) => Ok(*d),
            Variant::Integer(i) => Ok(f64::from(*i)),
            other => Err(other.mismatch(VariantType::Double)),
        }
    }

    pub fn value_as_string(&self) -> Result<&str> {
        match self {
            Variant::String(s) => Ok(s),
            other => Err(other.mismatch(VariantType::String)),
        }
    }

    /// False for a NaN or infinite `Double`; JSON has no encoding for those
    pub fn is_finite(&self) -> bool {
        match self {
            Variant::Double(d) => d.is_finite(),
            _ => true,
        }
    }

    /// Error unless the value can be written to JSON and read back
    pub fn ensure_finite(&self, name: &str) -> Result<()> {
        if self.is_finite() {
            return Ok(());
        }
        Err(OswError::validation_with_code(
            ErrorCode::VALIDATION_INVALID_INPUT,
            format!("Value '{}' of '{}' is not a finite number", self, name),
            Some(name.to_string()),
        ))
    }

    /// Convert to the equivalent JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Variant::Boolean(b) => serde_json::Value::Bool(*b),
            Variant::Integer(i) => serde_json::Value::from(*i),
            Variant::Double(d) => serde_json::Value::from(*d),
            Variant::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Infer a variant from a JSON scalar.
    ///
    /// Integral numbers that fit in an `i32` become `Integer`, other numbers
    /// become `Double`. Arrays, objects and null are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Bool(b) => Ok(Variant::Boolean(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                    Ok(Variant::Integer(i))
                } else if let Some(d) = n.as_f64() {
                    Ok(Variant::Double(d))
                } else {
                    Err(OswError::parse_with_code(
                        ErrorCode::PARSE_INVALID_VALUE,
                        format!("Number {} cannot be represented", n),
                    ))
                }
            }
            serde_json::Value::String(s) => Ok(Variant::String(s.clone())),
            other => Err(OswError::parse_with_code(
                ErrorCode::PARSE_INVALID_VALUE,
                format!("Unsupported argument value {}", other),
            )),
        }
    }

    fn mismatch(&self, requested: VariantType) -> OswError {
        OswError::validation_with_code(
            ErrorCode::VALIDATION_VARIANT_MISMATCH,
            format!(
                "Cannot read {} variant '{}' as {}",
                self.variant_type(),
                self,
                requested
            ),
            None,
        )
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Variant::Integer(i) => write!(f, "{}", i),
            Variant::Double(d) => write!(f, "{}", d),
            Variant::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Boolean(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Integer(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Double(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl Serialize for Variant {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Variant::Boolean(b) => serializer.serialize_bool(*b),
            Variant::Integer(i) => serializer.serialize_i32(*i),
            Variant::Double(d) => serializer.serialize_f64(*d),
            Variant::String(s) => serializer.serialize_str(s),
        }
    }
}

struct VariantVisitor;

impl<'de> Visitor<'de> for VariantVisitor {
    type Value = Variant;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, number or string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Variant, E> {
        Ok(Variant::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Variant, E> {
        Ok(i32::try_from(v)
            .map(Variant::Integer)
            .unwrap_or(Variant::Double(v as f64)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Variant, E> {
        Ok(i32::try_from(v)
            .map(Variant::Integer)
            .unwrap_or(Variant::Double(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Variant, E> {
        Ok(Variant::Double(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Variant, E> {
        Ok(Variant::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<Variant, E> {
        Ok(Variant::String(v))
    }
}

impl<'de> Deserialize<'de> for Variant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(VariantVisitor)
    }
}
