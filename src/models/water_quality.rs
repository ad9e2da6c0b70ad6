use crate::models::ResponseModel;
use crate::utils::unique_sorted;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Record fields that name the sampling station, in lookup order.
const STATION_FIELDS: [&str; 4] = ["station", "stationId", "stationName", "site"];

/// Payload of the `waterquality` endpoint.
///
/// The service does not publish this payload's schema, so the JSON is kept as delivered.
/// Records are the top-level array, or else the first array-valued field of the top-level
/// object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaterQualityResponse {
    pub data: Value,
}

impl ResponseModel for WaterQualityResponse {
    const MODEL: &'static str = "water quality";

    fn has_data(&self) -> bool {
        !self.records().is_empty()
    }
}

impl WaterQualityResponse {
    pub fn records(&self) -> &[Value] {
        match &self.data {
            Value::Array(records) => records,
            Value::Object(fields) => fields
                .values()
                .find_map(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _ => &[],
        }
    }

    /// Distinct station names over all records, sorted.
    pub fn get_stations(&self) -> Vec<String> {
        unique_sorted(self.records().iter().filter_map(|record| {
            STATION_FIELDS
                .iter()
                .find_map(|field| record.get(*field).and_then(Value::as_str))
        }))
    }

    pub fn get_data_count(&self) -> usize {
        self.records().len()
    }
}
