//! Turning response text into records

use serde::Deserialize;

use crate::error::DecodeError;
use crate::types::ResponseRecord;

/// Wire shape of a record; servers report failures through `error`
#[derive(Deserialize)]
struct WireRecord {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    record: ResponseRecord,
}

/// Decode one line (or a whole non-streaming body) into a record
///
/// # Errors
///
/// Returns [`DecodeError::Json`] for malformed text and
/// [`DecodeError::Server`] when the object carries an `error` field
pub fn decode_record(text: &str) -> Result<ResponseRecord, DecodeError> {
    let wire: WireRecord = serde_json::from_str(text).map_err(|e| DecodeError::json(e, text))?;

    match wire.error {
        Some(message) => Err(DecodeError::Server(message)),
        None => Ok(wire.record),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_record_line() {
        let record = decode_record(r#"{"model":"llama3.2","response":"Hello","done":false}"#).unwrap();
        assert_eq!(record.model, "llama3.2");
        assert_eq!(record.response, "Hello");
    }

    #[test]
    fn ignores_unknown_fields() {
        let record = decode_record(r#"{"response":"a","done":false,"thinking":"hmm"}"#).unwrap();
        assert_eq!(record.response, "a");
    }

    #[test]
    fn malformed_json_keeps_excerpt() {
        let err = decode_record(r#"{"response":"trunc"#).unwrap_err();
        let DecodeError::Json { excerpt, .. } = err else {
            panic!("expected JSON error, got {err:?}");
        };
        assert_eq!(excerpt, r#"{"response":"trunc"#);
    }

    #[test]
    fn wrong_field_type_is_rejected() {
        assert!(matches!(
            decode_record(r#"{"response":"a","done":"yes"}"#),
            Err(DecodeError::Json { .. })
        ));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(decode_record("42").is_err());
        assert!(decode_record("keep-alive").is_err());
    }

    #[test]
    fn server_error_field_is_surfaced() {
        let err = decode_record(r#"{"error":"model runner crashed"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Server(ref m) if m == "model runner crashed"));
    }
}
