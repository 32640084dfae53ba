//! Cache key derivation for upstream requests.
//!
//! Identity is `(endpoint, canonical params)`. Parameters are kept in a
//! `BTreeMap` so serialization order never depends on insertion order, and
//! absent values are excluded before they ever reach the map.

use std::collections::BTreeMap;

/// Canonical serialization of a parameter set: JSON of the map with keys in
/// lexicographic order. Used as the `params_key` column of the cache store.
pub fn params_key(params: &BTreeMap<String, String>) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in params.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::Value::from(key.as_str()).to_string());
        out.push(':');
        out.push_str(&serde_json::Value::from(value.as_str()).to_string());
    }
    out.push('}');
    out
}

/// Full request identity: `endpoint:{canonical params}`. Also the key the
/// request deduplicator coalesces on.
pub fn build_key(endpoint: &str, params: &BTreeMap<String, String>) -> String {
    format!("{endpoint}:{}", params_key(params))
}

/// Collect `(name, value)` pairs into a parameter map, dropping pairs whose
/// value is absent so they never participate in the identity.
pub fn params_from<I>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'static str, Option<String>)>,
{
    pairs
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.to_owned(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_insertion_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("league".to_owned(), "39".to_owned());
        a.insert("season".to_owned(), "2026".to_owned());

        let mut b = BTreeMap::new();
        b.insert("season".to_owned(), "2026".to_owned());
        b.insert("league".to_owned(), "39".to_owned());

        assert_eq!(build_key("fixtures", &a), build_key("fixtures", &b));
    }

    #[test]
    fn key_distinguishes_endpoint_and_params() {
        let mut params = BTreeMap::new();
        params.insert("id".to_owned(), "12345".to_owned());

        assert_ne!(build_key("fixtures", &params), build_key("standings", &params));

        let mut other = BTreeMap::new();
        other.insert("id".to_owned(), "12346".to_owned());
        assert_ne!(build_key("fixtures", &params), build_key("fixtures", &other));
    }

    #[test]
    fn canonical_form_sorts_keys() {
        let mut params = BTreeMap::new();
        params.insert("b".to_owned(), "2".to_owned());
        params.insert("a".to_owned(), "1".to_owned());
        assert_eq!(params_key(&params), r#"{"a":"1","b":"2"}"#);
        assert_eq!(params_key(&BTreeMap::new()), "{}");
    }

    #[test]
    fn canonical_form_escapes_values() {
        let mut params = BTreeMap::new();
        params.insert("q".to_owned(), "a\"b".to_owned());
        assert_eq!(params_key(&params), r#"{"q":"a\"b"}"#);
    }

    #[test]
    fn absent_values_are_excluded() {
        let params = params_from([
            ("league", Some("39".to_owned())),
            ("season", None),
            ("team", Some("42".to_owned())),
        ]);

        assert_eq!(params.len(), 2);
        assert!(!params.contains_key("season"));
        assert_eq!(params_key(&params), r#"{"league":"39","team":"42"}"#);
    }
}
