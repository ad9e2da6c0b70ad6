use crate::rest_adapters::{QueryParams, RawResponse, RestAdapter};
use serde_json::Value;
use std::sync::Mutex;

/// Replays a canned response and records every call it receives.
pub(crate) struct MockAdapter {
    response: RawResponse,
    calls: Mutex<Vec<(String, QueryParams)>>,
}

impl MockAdapter {
    pub(crate) fn new(response: RawResponse) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn ok(data: Value) -> Self {
        Self::new(RawResponse::new(200, "OK", data))
    }

    pub(crate) fn calls(&self) -> Vec<(String, QueryParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn last_params(&self) -> QueryParams {
        self.calls()
            .pop()
            .map(|(_, params)| params)
            .expect("no request was made")
    }
}

impl RestAdapter for MockAdapter {
    fn get(&self, url: &str, params: &QueryParams) -> RawResponse {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), params.clone()));
        self.response.clone()
    }
}
