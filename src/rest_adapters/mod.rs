//! Transport abstraction used by [`crate::DbHydroApi`].
//!
//! The client never talks HTTP directly; it hands a URL and query parameters to a
//! [`RestAdapter`] and interprets the [`RawResponse`] it gets back. Swap the adapter to
//! change the transport or to test without a network.

pub mod reqwest_adapter;

#[cfg(test)]
pub(crate) mod mock;

use serde_json::Value;
use std::sync::Arc;

/// Ordered query parameters for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter, replacing any earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Same as [`QueryParams::insert`], skipping `None`.
    pub fn insert_opt<V: ToString>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What an adapter hands back for every request, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    /// HTTP status, or `0` when no response was received at all.
    pub status_code: u16,
    /// Reason phrase, or a description of the transport failure.
    pub message: String,
    /// Decoded JSON body; `Value::Null` when the body was empty or not JSON.
    pub data: Value,
}

impl RawResponse {
    pub fn new(status_code: u16, message: impl Into<String>, data: Value) -> Self {
        Self {
            status_code,
            message: message.into(),
            data,
        }
    }

    /// A response for a request that never completed.
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::new(0, message, Value::Null)
    }

    pub fn is_transport_failure(&self) -> bool {
        self.status_code == 0
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Performs GET requests on behalf of the client.
///
/// Implementations must not fail: transport problems are reported as a [`RawResponse`]
/// with `status_code == 0` and HTTP errors as a response with that status. Deciding what
/// counts as an error is left to the client.
pub trait RestAdapter {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse;
}

impl<A: RestAdapter + ?Sized> RestAdapter for &A {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse {
        (**self).get(url, params)
    }
}

impl<A: RestAdapter + ?Sized> RestAdapter for Box<A> {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse {
        (**self).get(url, params)
    }
}

impl<A: RestAdapter + ?Sized> RestAdapter for Arc<A> {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse {
        (**self).get(url, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_keep_insertion_order() {
        let mut params = QueryParams::new();
        params.insert("names", "S79-E");
        params.insert("format", "json");
        params.insert_opt("calculation", None::<&str>);
        params.insert_opt("timespanValue", Some(1));

        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(
            pairs,
            vec![("names", "S79-E"), ("format", "json"), ("timespanValue", "1")]
        );
        assert!(!params.contains_key("calculation"));
    }

    #[test]
    fn test_query_params_insert_replaces() {
        let mut params = QueryParams::new();
        params.insert("format", "xml");
        params.insert("format", "json");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("format"), Some("json"));
    }

    #[test]
    fn test_raw_response_status_helpers() {
        assert!(RawResponse::transport_failure("timed out").is_transport_failure());
        assert!(RawResponse::new(204, "No Content", Value::Null).is_success());
        assert!(!RawResponse::new(404, "Not Found", Value::Null).is_success());
    }
}
