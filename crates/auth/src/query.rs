//! Canonical query-string serialization.
//!
//! The serialized string is the exact byte sequence that gets signed, so the
//! ordering must be stable: parameters are emitted in insertion order.

use std::fmt;
use url::form_urlencoded;

/// Ordered request parameters.
///
/// Setting a key that already exists replaces its value in place, so the
/// key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace a parameter.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Remove a parameter, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize as `k1=v1&k2=v2` in insertion order.
    ///
    /// Values are form-url-encoded; an empty set yields an empty string.
    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, encode_component(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

/// Percent-encode a single query component.
pub(crate) fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_params_serialize_to_empty_string() {
        assert_eq!(QueryParams::new().to_query_string(), "");
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let params = QueryParams::new()
            .with("symbol", "BTCUSDT")
            .with("side", "BUY")
            .with("type", "LIMIT")
            .with("quantity", "0.001");

        assert_eq!(
            params.to_query_string(),
            "symbol=BTCUSDT&side=BUY&type=LIMIT&quantity=0.001"
        );
    }

    #[test]
    fn test_replacing_a_key_keeps_its_position() {
        let mut params = QueryParams::new().with("a", 1).with("b", 2);
        params.set("a", 3);

        assert_eq!(params.len(), 2);
        assert_eq!(params.to_query_string(), "a=3&b=2");
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let params: QueryParams = [("zeta", "1"), ("alpha", "2"), ("mid", "3")]
            .into_iter()
            .collect();

        let first = params.to_query_string();
        let second = params.clone().to_query_string();
        assert_eq!(first, second);
        assert_eq!(first, "zeta=1&alpha=2&mid=3");
    }

    #[test]
    fn test_values_are_encoded() {
        let params = QueryParams::new().with("symbols", "[\"BTCUSDT\"]");
        assert_eq!(params.to_query_string(), "symbols=%5B%22BTCUSDT%22%5D");
    }

    #[test]
    fn test_remove() {
        let mut params = QueryParams::new().with("price", "1").with("side", "BUY");
        assert_eq!(params.remove("price").as_deref(), Some("1"));
        assert_eq!(params.remove("price"), None);
        assert!(!params.contains("price"));
        assert_eq!(params.to_query_string(), "side=BUY");
    }
}
