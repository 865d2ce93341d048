// Defensive parsing of model replies.
//
// Replies are loosely shaped: fenced, wrapped in prose, sometimes an object
// where an array was asked for. Every parse returns either a validated value
// or a classified ParseFailure; nothing here panics on model output.

use ai_client::util::embedded_json;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use painpoint_common::PainPointError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no JSON payload in response")]
    NoPayload,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("unexpected shape: {0}")]
    Shape(String),
}

impl From<ParseFailure> for PainPointError {
    fn from(failure: ParseFailure) -> Self {
        PainPointError::Parse(failure.to_string())
    }
}

fn payload(response: &str) -> Result<Value, ParseFailure> {
    let json = embedded_json(response).ok_or(ParseFailure::NoPayload)?;
    serde_json::from_str(json).map_err(|e| ParseFailure::Malformed(e.to_string()))
}

/// Parse a reply expected to hold a list. A bare array is taken as-is; an
/// object is searched for its first array-valued field (`{"results": [...]}`).
pub fn parse_list<T: DeserializeOwned>(response: &str) -> Result<Vec<T>, ParseFailure> {
    let items = match payload(response)? {
        Value::Array(items) => items,
        Value::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| ParseFailure::Shape("object without an array field".to_string()))?,
        other => {
            return Err(ParseFailure::Shape(format!(
                "expected array, got {}",
                type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(|e| ParseFailure::Shape(e.to_string())))
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Read a list index the model may have written as a number or a numeric string.
pub fn as_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().trim_start_matches('#').parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        relevant: bool,
    }

    #[test]
    fn bare_array_parses() {
        let items: Vec<Item> = parse_list("[{\"relevant\": true}, {\"relevant\": false}]").unwrap();
        assert_eq!(items, vec![Item { relevant: true }, Item { relevant: false }]);
    }

    #[test]
    fn fenced_array_with_prose_parses() {
        let reply = "Here are the results:\n```json\n[{\"relevant\": true}]\n```\nDone.";
        let items: Vec<Item> = parse_list(reply).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn object_wrapper_is_unwrapped() {
        let items: Vec<Item> = parse_list("{\"results\": [{\"relevant\": true}]}").unwrap();
        assert_eq!(items, vec![Item { relevant: true }]);
    }

    #[test]
    fn bracketed_note_after_array_is_ignored() {
        let reply = "[{\"relevant\": false}, {\"relevant\": true}]\n\nNote: item [1] is about something else.";
        let items: Vec<Item> = parse_list(reply).unwrap();
        assert_eq!(items, vec![Item { relevant: false }, Item { relevant: true }]);
    }

    #[test]
    fn bracketed_label_before_array_is_skipped() {
        let reply = "Here is the result [JSON]:\n[{\"relevant\": true}]";
        let items: Vec<Item> = parse_list(reply).unwrap();
        assert_eq!(items, vec![Item { relevant: true }]);
    }

    #[test]
    fn prose_only_is_no_payload() {
        let err = parse_list::<Item>("Sorry, I can't do that.").unwrap_err();
        assert_eq!(err, ParseFailure::NoPayload);
    }

    #[test]
    fn truncated_json_is_malformed() {
        let err = parse_list::<Item>("[{\"relevant\": true}, {\"relev]").unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed(_)));
    }

    #[test]
    fn wrong_item_shape_is_classified() {
        let err = parse_list::<Item>("[{\"relevant\": \"maybe\"}]").unwrap_err();
        assert!(matches!(err, ParseFailure::Shape(_)));
    }

    #[test]
    fn indices_accept_numbers_and_strings() {
        assert_eq!(as_index(&serde_json::json!(3)), Some(3));
        assert_eq!(as_index(&serde_json::json!("4")), Some(4));
        assert_eq!(as_index(&serde_json::json!("#5")), Some(5));
        assert_eq!(as_index(&serde_json::json!(-1)), None);
        assert_eq!(as_index(&serde_json::json!("five")), None);
    }

    #[test]
    fn failure_converts_to_parse_error() {
        let err: PainPointError = ParseFailure::NoPayload.into();
        assert!(matches!(err, PainPointError::Parse(_)));
    }
}
