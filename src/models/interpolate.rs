use crate::models::aggregate::Tag;
use crate::models::ResponseModel;
use crate::utils::{count_by, lenient_string, mean, min_max, null_default, unique_sorted};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Values interpolated at a single instant by the `interpolate` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolateResponse {
    #[serde(rename = "list", deserialize_with = "null_default")]
    pub entries: Vec<InterpolateEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterpolateEntry {
    #[serde(deserialize_with = "lenient_string")]
    pub origin: String,
    #[serde(deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(deserialize_with = "lenient_string")]
    pub key_type: String,
    #[serde(deserialize_with = "null_default")]
    pub ms_since_epoch: i64,
    pub value: Option<f64>,
    #[serde(deserialize_with = "null_default")]
    pub tag: Tag,
    #[serde(deserialize_with = "lenient_string")]
    pub quality_code: String,
    pub percent_available: Option<f64>,
    #[serde(deserialize_with = "null_default")]
    pub time: i64,
    #[serde(deserialize_with = "null_default")]
    pub date: i64,
}

impl ResponseModel for InterpolateResponse {
    const MODEL: &'static str = "interpolate";

    fn has_data(&self) -> bool {
        !self.entries.is_empty()
    }
}

impl InterpolateResponse {
    pub fn get_keys(&self) -> Vec<String> {
        unique_sorted(self.entries.iter().map(|e| e.key.as_str()))
    }

    pub fn get_values(&self) -> Vec<f64> {
        self.entries.iter().filter_map(|e| e.value).collect()
    }

    pub fn get_quality_codes(&self) -> Vec<String> {
        unique_sorted(self.entries.iter().map(|e| e.quality_code.as_str()))
    }

    pub fn get_origins(&self) -> Vec<String> {
        unique_sorted(self.entries.iter().map(|e| e.origin.as_str()))
    }

    pub fn get_key_types(&self) -> Vec<String> {
        unique_sorted(self.entries.iter().map(|e| e.key_type.as_str()))
    }

    /// Sorted milliseconds since the epoch, duplicates kept.
    pub fn get_timestamps(&self) -> Vec<i64> {
        let mut timestamps: Vec<i64> = self.entries.iter().map(|e| e.ms_since_epoch).collect();
        timestamps.sort_unstable();
        timestamps
    }

    pub fn get_value_range(&self) -> Option<(f64, f64)> {
        min_max(self.get_values())
    }

    pub fn get_timestamp_range(&self) -> Option<(i64, i64)> {
        min_max(self.entries.iter().map(|e| e.ms_since_epoch))
    }

    pub fn get_entries_for_key(&self, key: &str) -> Vec<&InterpolateEntry> {
        self.entries.iter().filter(|e| e.key == key).collect()
    }

    pub fn get_latest_value_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|entries| {
            entries
                .iter()
                .rev()
                .max_by_key(|e| e.ms_since_epoch)
                .and_then(|e| e.value)
        })
    }

    pub fn get_earliest_value_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|entries| {
            entries
                .iter()
                .min_by_key(|e| e.ms_since_epoch)
                .and_then(|e| e.value)
        })
    }

    pub fn get_average_values_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|entries| mean(entries.iter().filter_map(|e| e.value)))
    }

    pub fn get_value_ranges_by_key(&self) -> BTreeMap<String, (f64, f64)> {
        self.per_key(|entries| min_max(entries.iter().filter_map(|e| e.value)))
    }

    pub fn get_quality_summary(&self) -> BTreeMap<String, usize> {
        count_by(self.entries.iter().map(|e| e.quality_code.as_str()))
    }

    pub fn get_data_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_data_counts_by_key(&self) -> BTreeMap<String, usize> {
        count_by(self.entries.iter().map(|e| e.key.as_str()))
    }

    /// key -> quality code -> entries, in payload order.
    pub fn get_entries_by_key_and_quality(
        &self,
    ) -> BTreeMap<String, BTreeMap<String, Vec<&InterpolateEntry>>> {
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<&InterpolateEntry>>> =
            BTreeMap::new();
        for entry in &self.entries {
            grouped
                .entry(entry.key.clone())
                .or_default()
                .entry(entry.quality_code.clone())
                .or_default()
                .push(entry);
        }
        grouped
    }

    pub fn get_tagged_entries(&self) -> Vec<&InterpolateEntry> {
        self.entries.iter().filter(|e| e.tag.is_set()).collect()
    }

    pub fn filter_by_key(&self, keys: &[&str]) -> Self {
        self.filter(|e| keys.contains(&e.key.as_str()))
    }

    pub fn filter_by_quality(&self, quality_codes: &[&str]) -> Self {
        self.filter(|e| quality_codes.contains(&e.quality_code.as_str()))
    }

    pub fn filter_by_origin(&self, origins: &[&str]) -> Self {
        self.filter(|e| origins.contains(&e.origin.as_str()))
    }

    fn filter(&self, keep: impl Fn(&InterpolateEntry) -> bool) -> Self {
        Self {
            entries: self.entries.iter().filter(|e| keep(*e)).cloned().collect(),
        }
    }

    fn per_key<T>(&self, reduce: impl Fn(&[&InterpolateEntry]) -> Option<T>) -> BTreeMap<String, T> {
        let mut grouped: BTreeMap<&str, Vec<&InterpolateEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.key.as_str()).or_default().push(entry);
        }
        grouped
            .into_iter()
            .filter_map(|(key, entries)| Some((key.to_string(), reduce(&entries)?)))
            .collect()
    }

    /// One row per entry, in payload order.
    ///
    /// Columns: `key`, `value`, `quality_code`, `origin`; `include_metadata` adds
    /// `key_type`, `datetime`, `percent_available`, `time`, `date` and `tag`.
    #[cfg(feature = "dataframe")]
    pub fn to_dataframe(
        &self,
        include_metadata: bool,
    ) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use crate::utils::datetime_column;
        use polars::prelude::*;

        let entries = &self.entries;
        let mut columns = vec![
            Column::new(
                "key".into(),
                entries.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            ),
            Column::new("value".into(), entries.iter().map(|e| e.value).collect::<Vec<_>>()),
            Column::new(
                "quality_code".into(),
                entries.iter().map(|e| e.quality_code.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "origin".into(),
                entries.iter().map(|e| e.origin.as_str()).collect::<Vec<_>>(),
            ),
        ];
        if include_metadata {
            columns.extend([
                Column::new(
                    "key_type".into(),
                    entries.iter().map(|e| e.key_type.as_str()).collect::<Vec<_>>(),
                ),
                datetime_column(
                    "datetime",
                    entries.iter().map(|e| Some(e.ms_since_epoch)).collect(),
                )?,
                Column::new(
                    "percent_available".into(),
                    entries.iter().map(|e| e.percent_available).collect::<Vec<_>>(),
                ),
                Column::new("time".into(), entries.iter().map(|e| e.time).collect::<Vec<_>>()),
                Column::new("date".into(), entries.iter().map(|e| e.date).collect::<Vec<_>>()),
                Column::new(
                    "tag".into(),
                    entries.iter().map(|e| e.tag.tag.as_deref()).collect::<Vec<_>>(),
                ),
            ]);
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MS: i64 = 1_387_972_800_000;

    fn entry(key: &str, ms: i64, value: f64, quality: &str, origin: &str) -> serde_json::Value {
        json!({
            "origin": origin,
            "key": key,
            "keyType": "station_id",
            "msSinceEpoch": ms,
            "value": value,
            "tag": {"tag": null},
            "qualityCode": quality,
            "percentAvailable": 75.0,
            "time": ms,
            "date": ms
        })
    }

    fn sample() -> InterpolateResponse {
        let mut tagged = entry("S124-R", MS, 3.0, "P", "MANIPULATED");
        tagged["tag"] = json!({"tag": "flow"});
        InterpolateResponse::from_dict(&json!({
            "status": {"statusCode": 200, "statusMessage": "request successful", "elapsedTime": 0},
            "list": [
                entry("S123-R", MS + 1000, 14.5, "A", "MANIPULATED"),
                entry("S123-R", MS, 12.5, "A", "RAW"),
                tagged,
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_single_entry() {
        let response = InterpolateResponse::from_dict(&json!({
            "list": [entry("S123-R", MS, 12.5, "A", "MANIPULATED")]
        }))
        .unwrap();
        let entry = &response.entries[0];
        assert_eq!(entry.key, "S123-R");
        assert_eq!(entry.key_type, "station_id");
        assert_eq!(entry.ms_since_epoch, MS);
        assert_eq!(entry.value, Some(12.5));
        assert_eq!(entry.tag.tag, None);
        assert_eq!(entry.percent_available, Some(75.0));
        assert_eq!(entry.date, MS);
    }

    #[test]
    fn test_missing_list_is_empty() {
        let response = InterpolateResponse::from_dict(&json!({"status": {}})).unwrap();
        assert!(!response.has_data());
        assert_eq!(response.get_timestamp_range(), None);
        assert!(response.get_latest_value_by_key().is_empty());
    }

    #[test]
    fn test_accessors() {
        let response = sample();
        assert_eq!(response.get_keys(), vec!["S123-R", "S124-R"]);
        assert_eq!(response.get_key_types(), vec!["station_id"]);
        assert_eq!(response.get_origins(), vec!["MANIPULATED", "RAW"]);
        assert_eq!(response.get_timestamps(), vec![MS, MS, MS + 1000]);
        assert_eq!(response.get_timestamp_range(), Some((MS, MS + 1000)));
        assert_eq!(response.get_value_range(), Some((3.0, 14.5)));
        assert_eq!(response.get_entries_for_key("S123-R").len(), 2);

        assert_eq!(response.get_latest_value_by_key()["S123-R"], 14.5);
        assert_eq!(response.get_earliest_value_by_key()["S123-R"], 12.5);
        assert_eq!(response.get_average_values_by_key()["S123-R"], 13.5);
        assert_eq!(response.get_value_ranges_by_key()["S124-R"], (3.0, 3.0));
        assert_eq!(response.get_quality_summary()["A"], 2);
        assert_eq!(response.get_data_counts_by_key()["S124-R"], 1);

        let grouped = response.get_entries_by_key_and_quality();
        assert_eq!(grouped["S123-R"]["A"].len(), 2);
        assert_eq!(grouped["S124-R"]["P"].len(), 1);

        let tagged = response.get_tagged_entries();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].key, "S124-R");
    }

    #[test]
    fn test_latest_value_prefers_first_on_tie() {
        let response = InterpolateResponse::from_dict(&json!({
            "list": [
                entry("S123-R", MS, 12.5, "A", "RAW"),
                entry("S123-R", MS, 14.5, "A", "RAW"),
            ]
        }))
        .unwrap();
        assert_eq!(response.get_latest_value_by_key()["S123-R"], 12.5);
    }

    #[test]
    fn test_filters() {
        let response = sample();
        let before = response.clone();
        assert_eq!(response.filter_by_key(&["S123-R"]).get_data_count(), 2);
        assert_eq!(response.filter_by_quality(&["P"]).get_keys(), vec!["S124-R"]);
        assert_eq!(response.filter_by_origin(&["RAW"]).get_values(), vec![12.5]);
        assert_eq!(response, before);
    }

    #[test]
    fn test_round_trip_uses_list_key() {
        let response = sample();
        let dict = response.to_dict().unwrap();
        assert_eq!(dict["list"].as_array().map(Vec::len), Some(3));
        assert_eq!(dict["list"][0]["msSinceEpoch"], MS + 1000);
        assert_eq!(InterpolateResponse::from_dict(&dict).unwrap(), response);
    }

    #[cfg(feature = "dataframe")]
    #[test]
    fn test_to_dataframe() -> Result<(), Box<dyn std::error::Error>> {
        let response = sample();
        assert_eq!(response.to_dataframe(false)?.shape(), (3, 4));
        assert_eq!(response.to_dataframe(true)?.shape(), (3, 10));
        assert_eq!(InterpolateResponse::default().to_dataframe(false)?.height(), 0);
        Ok(())
    }
}
