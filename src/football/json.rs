//! JSON decode diagnostics for upstream responses.

use serde::de::DeserializeOwned;

/// Deserialize JSON, and on failure report the serde path to the offending
/// field along with the line/column, instead of the bare serde message.
pub fn decode_with_path<T: DeserializeOwned>(body: &str) -> Result<T, String> {
    let deserializer = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(deserializer).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.inner();
        if path.is_empty() || path == "." {
            format!("{inner}")
        } else {
            format!("at path '{path}': {inner}")
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Envelope {
        #[allow(dead_code)]
        results: i64,
    }

    #[test]
    fn reports_path_of_offending_field() {
        let err = decode_with_path::<Envelope>(r#"{"results": "ten"}"#).unwrap_err();
        assert!(err.contains("results"), "{err}");
    }

    #[test]
    fn valid_body_decodes() {
        let envelope: Envelope = decode_with_path(r#"{"results": 3}"#).unwrap();
        assert_eq!(envelope.results, 3);
    }

    #[test]
    fn truncated_body_fails_with_message() {
        let err = decode_with_path::<serde_json::Value>(r#"{"results":"#).unwrap_err();
        assert!(!err.is_empty());
    }
}
