//! JSON text helpers shared by the OSW document types.

use crate::error::{ErrorCode, OswError, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;

const INDENT: &[u8] = b"   ";

/// Pretty-print with three-space indentation, the layout used by `.osw` files
pub fn to_pretty_string(value: &Value) -> String {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    match value.serialize(&mut ser) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Parse text that must hold a JSON object
pub fn parse_object(text: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(OswError::parse_with_code(
            ErrorCode::PARSE_NOT_AN_OBJECT,
            format!("Expected a JSON object, found {}", kind_name(&other)),
        )),
    }
}

pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_three_space_indent() {
        let text = to_pretty_string(&json!({"a": [1]}));
        assert_eq!(text, "{\n   \"a\": [\n      1\n   ]\n}");
    }

    #[test]
    fn test_parse_object_rejects_other_kinds() {
        assert!(parse_object("{\"steps\": []}").is_ok());
        let err = parse_object("[1, 2]").unwrap_err();
        assert_eq!(err.code(), ErrorCode::PARSE_NOT_AN_OBJECT);
        assert!(parse_object("not json").unwrap_err().is_parse());
    }
}
