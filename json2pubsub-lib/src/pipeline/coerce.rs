use super::{Rejection, Stage};
use crate::expr::{Dynamic, cel_to_json, map_to_json};
use serde_json::Value as JsonValue;

/// What the caller receives after a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Status 200 without a body.
    Empty,

    /// A string result, written verbatim.
    Text(String),

    /// A mapping or sequence result, JSON-encoded.
    Json(Vec<u8>),
}

/// Converts the extraction result into the message payload.
///
/// Strings are decoded as JSON, mappings and sequences are converted structurally, and
/// anything else cannot become a message.
pub fn coerce_message(value: Dynamic) -> Result<JsonValue, Rejection> {
    match value {
        Dynamic::String(text) => match serde_json::from_str::<JsonValue>(&text) {
            Ok(JsonValue::Null) => Err(Rejection::client(Stage::Extraction, "message expression produced a JSON null")),
            Ok(decoded) => Ok(decoded),
            Err(e) => Err(Rejection::client(
                Stage::Extraction,
                format!("invalid JSON string from message expression: {e}"),
            )),
        },

        Dynamic::Mapping(map) => map_to_json(&map)
            .map(JsonValue::Object)
            .map_err(|e| Rejection::service(Stage::Extraction, format!("unable to convert message to JSON: {e}"))),

        Dynamic::Sequence(items) => items
            .iter()
            .map(cel_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array)
            .map_err(|e| Rejection::service(Stage::Extraction, format!("unable to convert message to JSON: {e}"))),

        other => Err(Rejection::client(
            Stage::Extraction,
            format!("could not turn request into a message: expression produced a {}", other.kind()),
        )),
    }
}

/// Converts the response result into a response body.
///
/// Unlike [`coerce_message`], strings are passed through untouched.
pub fn coerce_response(value: Dynamic) -> Result<ResponseBody, Rejection> {
    let json = match value {
        Dynamic::Null => return Err(Rejection::service(Stage::Response, "response expression produced null")),
        Dynamic::String(text) => return Ok(ResponseBody::Text(text.to_string())),
        Dynamic::Mapping(map) => map_to_json(&map).map(JsonValue::Object),
        Dynamic::Sequence(items) => items.iter().map(cel_to_json).collect::<Result<Vec<_>, _>>().map(JsonValue::Array),
        other => {
            log::warn!(
                target: super::LOG_TARGET,
                "Response expression produced a {}, sending an empty body",
                other.kind()
            );
            return Ok(ResponseBody::Empty);
        }
    };

    let json = json.map_err(|e| Rejection::service(Stage::Response, format!("unable to convert response to JSON: {e}")))?;
    serde_json::to_vec(&json)
        .map(ResponseBody::Json)
        .map_err(|e| Rejection::service(Stage::Response, format!("unable to encode response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RejectKind;
    use cel_interpreter::Value;
    use cel_interpreter::objects::Map;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn string(s: &str) -> Dynamic {
        Dynamic::String(Arc::new(s.to_string()))
    }

    fn mapping(entries: &[(&str, Value)]) -> Dynamic {
        let map: HashMap<String, Value> = entries.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
        Dynamic::Mapping(Map::from(map))
    }

    #[test]
    fn test_message_string_is_decoded() {
        assert_eq!(coerce_message(string(r#"{"foo":"bar"}"#)).unwrap(), json!({"foo": "bar"}));
        assert_eq!(coerce_message(string("42")).unwrap(), json!(42));
    }

    #[test]
    fn test_message_invalid_json_string_is_client_error() {
        let err = coerce_message(string("not json")).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ClientError);
    }

    #[test]
    fn test_message_null_string_is_client_error() {
        let err = coerce_message(string("null")).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ClientError);
    }

    #[test]
    fn test_message_mapping_and_sequence() {
        let value = mapping(&[("type", Value::String(Arc::new("x".into())))]);
        assert_eq!(coerce_message(value).unwrap(), json!({"type": "x"}));

        let value = Dynamic::Sequence(Arc::new(vec![Value::Int(1), Value::Bool(false)]));
        assert_eq!(coerce_message(value).unwrap(), json!([1, false]));
    }

    #[test]
    fn test_message_scalars_are_client_errors() {
        for value in [Dynamic::Null, Dynamic::Bool(true), Dynamic::Int(3), Dynamic::Float(1.5)] {
            let err = coerce_message(value).unwrap_err();
            assert_eq!(err.kind(), RejectKind::ClientError);
            assert!(err.cause().contains("could not turn request into a message"));
        }
    }

    #[test]
    fn test_message_unconvertible_nested_value_is_service_error() {
        let value = mapping(&[("ratio", Value::Float(f64::NAN))]);
        let err = coerce_message(value).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ServiceError);
    }

    #[test]
    fn test_response_string_is_verbatim() {
        let body = coerce_response(string(r#"{"not":"decoded"}"#)).unwrap();
        assert_eq!(body, ResponseBody::Text(r#"{"not":"decoded"}"#.to_string()));
    }

    #[test]
    fn test_response_mapping_is_json() {
        let body = coerce_response(mapping(&[("challenge", Value::String(Arc::new("abc".into())))])).unwrap();
        assert_eq!(body, ResponseBody::Json(br#"{"challenge":"abc"}"#.to_vec()));
    }

    #[test]
    fn test_response_null_is_service_error() {
        let err = coerce_response(Dynamic::Null).unwrap_err();
        assert_eq!(err.kind(), RejectKind::ServiceError);
        assert_eq!(err.stage(), Stage::Response);
    }

    #[test]
    fn test_response_other_scalars_are_empty() {
        assert_eq!(coerce_response(Dynamic::Int(7)).unwrap(), ResponseBody::Empty);
        assert_eq!(coerce_response(Dynamic::Bool(true)).unwrap(), ResponseBody::Empty);
    }
}
