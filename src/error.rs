use crate::types::error::ValidationError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbHydroError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to parse {model} payload")]
    Parse {
        model: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected '{endpoint}' response payload: expected a JSON object, found {found}")]
    UnexpectedPayload { endpoint: String, found: String },

    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[cfg(feature = "dataframe")]
    #[error("Failed building DataFrame: {0}")]
    DataFrame(#[from] polars::error::PolarsError),
}

/// A request that reached the transport layer but did not succeed.
///
/// Covers three situations: the request never got a response (`http_status_code` is
/// `None`), the server answered with a non-2xx status, or the payload carried an
/// error status of its own, which happens even on HTTP 200.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub message: String,
    pub http_status_code: Option<u16>,
    pub api_status_code: Option<i64>,
    pub api_status_message: Option<String>,
    pub elapsed_time: Option<f64>,
}

impl ApiError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            http_status_code: None,
            api_status_code: None,
            api_status_message: None,
            elapsed_time: None,
        }
    }

    pub(crate) fn http_status(status: u16) -> Self {
        Self {
            message: format!("HTTP request failed with status {}", status),
            http_status_code: Some(status),
            ..Self::transport("")
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(message) = self.api_status_message.as_deref().filter(|m| !m.is_empty()) {
            write!(f, " | API Error: {}", message)?;
        }
        if let Some(status) = self.http_status_code {
            write!(f, " | HTTP Status: {}", status)?;
        }
        if let Some(status) = self.api_status_code {
            if self.http_status_code.map(i64::from) != Some(status) {
                write!(f, " | API Status: {}", status)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_all_distinct_parts() {
        let err = ApiError {
            message: "API request failed: Invalid station".to_string(),
            http_status_code: Some(200),
            api_status_code: Some(400),
            api_status_message: Some("Invalid station".to_string()),
            elapsed_time: Some(0.05),
        };
        assert_eq!(
            err.to_string(),
            "API request failed: Invalid station | API Error: Invalid station | HTTP Status: 200 | API Status: 400"
        );
    }

    #[test]
    fn test_display_skips_duplicate_status() {
        let err = ApiError {
            api_status_code: Some(404),
            ..ApiError::http_status(404)
        };
        assert_eq!(
            err.to_string(),
            "HTTP request failed with status 404 | HTTP Status: 404"
        );
    }

    #[test]
    fn test_transport_error_has_message_only() {
        let err = ApiError::transport("Request failed: connection refused");
        assert_eq!(err.http_status_code, None);
        assert_eq!(err.to_string(), "Request failed: connection refused");
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err = DbHydroError::from(ValidationError::MissingSearchParameter);
        assert_eq!(
            err.to_string(),
            "At least one search parameter is required: project_code, test_number, or station"
        );
    }
}
