//! Typed views over the JSON payloads returned by each endpoint.

pub mod aggregate;
pub mod interpolate;
pub mod point;
pub mod synchronize;
pub mod time_series;
pub mod water_quality;

use crate::error::DbHydroError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversion between a model and its JSON payload.
///
/// `from_dict` is lenient: missing or `null` fields fall back to empty values, so a
/// partially populated payload still parses. `to_dict` produces the payload shape the
/// service sends, and `from_dict(&to_dict()?)` gives back an equal value for anything
/// `from_dict` produced. A hand-built [`SynchronizeResponse`](synchronize::SynchronizeResponse)
/// comes back normalized instead: stations without values are dropped and values are put
/// in time order.
pub trait ResponseModel: Sized + Serialize + DeserializeOwned {
    /// Used in parse errors.
    const MODEL: &'static str;

    fn from_dict(data: &Value) -> Result<Self, DbHydroError> {
        Self::deserialize(data).map_err(|source| DbHydroError::Parse {
            model: Self::MODEL,
            source,
        })
    }

    fn to_dict(&self) -> Result<Value, DbHydroError> {
        serde_json::to_value(self).map_err(|source| DbHydroError::Parse {
            model: Self::MODEL,
            source,
        })
    }

    /// Whether the payload carried any observations.
    fn has_data(&self) -> bool;
}

/// Status block attached to time series and point payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Status {
    pub status_code: Option<i64>,
    pub status_message: Option<String>,
    pub elapsed_time: Option<f64>,
}
