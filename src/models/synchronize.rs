use crate::models::ResponseModel;
use crate::utils::{count_by, lenient_string, mean, min_max, null_default, unique_sorted};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Several stations sampled at shared timestamps by the `synchronize` endpoint.
///
/// The service keys its payload by timestamp first and station second. Parsing regroups the
/// readings per station, with each station's values in time order, and serializing writes
/// the timestamp-keyed shape back out.
///
/// The wire shape cannot hold a station without readings or an order within a station, so
/// a hand-built value only survives `from_dict(&to_dict()?)` unchanged when every station
/// has values and each station's values are sorted by `ms_since_epoch`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynchronizeResponse {
    pub stations: BTreeMap<String, SynchronizeEntry>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynchronizeEntry {
    pub station_id: String,
    pub key: String,
    pub values: Vec<SynchronizeValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynchronizeValue {
    #[serde(deserialize_with = "null_default")]
    pub ms_since_epoch: i64,
    pub value: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub quality_code: String,
    pub percent_available: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub origin: String,
    #[serde(deserialize_with = "lenient_string")]
    pub key_type: String,
    #[serde(deserialize_with = "null_default")]
    pub tag: Map<String, Value>,
}

#[derive(Serialize)]
struct WireValue<'a> {
    key: &'a str,
    #[serde(flatten)]
    value: &'a SynchronizeValue,
}

impl Serialize for SynchronizeResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut by_timestamp: BTreeMap<String, BTreeMap<&str, WireValue>> = BTreeMap::new();
        for (station_id, entry) in &self.stations {
            for value in &entry.values {
                by_timestamp
                    .entry(value.ms_since_epoch.to_string())
                    .or_default()
                    .insert(
                        station_id,
                        WireValue {
                            key: &entry.key,
                            value,
                        },
                    );
            }
        }
        by_timestamp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SynchronizeResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();

        let mut stations: BTreeMap<String, SynchronizeEntry> = BTreeMap::new();
        for at_timestamp in wire.values() {
            let Value::Object(at_timestamp) = at_timestamp else {
                continue;
            };
            for (station_id, data) in at_timestamp {
                if !data.is_object() {
                    continue;
                }
                let value = SynchronizeValue::deserialize(data).map_err(D::Error::custom)?;
                let entry = stations
                    .entry(station_id.clone())
                    .or_insert_with(|| SynchronizeEntry {
                        station_id: station_id.clone(),
                        key: data
                            .get("key")
                            .and_then(Value::as_str)
                            .unwrap_or(station_id)
                            .to_string(),
                        values: Vec::new(),
                    });
                entry.values.push(value);
            }
        }
        for entry in stations.values_mut() {
            entry.values.sort_by_key(|v| v.ms_since_epoch);
        }
        Ok(Self { stations })
    }
}

impl ResponseModel for SynchronizeResponse {
    const MODEL: &'static str = "synchronize";

    fn has_data(&self) -> bool {
        self.stations.values().any(|e| !e.values.is_empty())
    }
}

impl SynchronizeResponse {
    pub fn get_station_ids(&self) -> Vec<&str> {
        self.stations.keys().map(String::as_str).collect()
    }

    /// Distinct timestamps across every station, sorted.
    pub fn get_timestamps(&self) -> Vec<i64> {
        self.all_values()
            .map(|v| v.ms_since_epoch)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn get_station_data(&self, station_id: &str) -> Option<&SynchronizeEntry> {
        self.stations.get(station_id)
    }

    /// The reading of every station that has one at `ms_since_epoch`.
    pub fn get_values_at_timestamp(&self, ms_since_epoch: i64) -> BTreeMap<String, &SynchronizeValue> {
        self.stations
            .iter()
            .filter_map(|(station_id, entry)| {
                let value = entry.values.iter().find(|v| v.ms_since_epoch == ms_since_epoch)?;
                Some((station_id.clone(), value))
            })
            .collect()
    }

    /// Values for one station; empty when the station is absent.
    pub fn get_station_values(&self, station_id: &str) -> &[SynchronizeValue] {
        self.stations
            .get(station_id)
            .map(|e| e.values.as_slice())
            .unwrap_or_default()
    }

    pub fn get_quality_codes(&self) -> Vec<String> {
        unique_sorted(self.all_values().map(|v| v.quality_code.as_str()))
    }

    pub fn get_origins(&self) -> Vec<String> {
        unique_sorted(self.all_values().map(|v| v.origin.as_str()))
    }

    pub fn get_value_ranges(&self) -> BTreeMap<String, (f64, f64)> {
        self.per_station(|values| min_max(values.iter().filter_map(|v| v.value)))
    }

    pub fn get_latest_values(&self) -> BTreeMap<String, f64> {
        self.per_station(|values| values.iter().rev().max_by_key(|v| v.ms_since_epoch)?.value)
    }

    pub fn get_earliest_values(&self) -> BTreeMap<String, f64> {
        self.per_station(|values| values.iter().min_by_key(|v| v.ms_since_epoch)?.value)
    }

    pub fn get_average_values(&self) -> BTreeMap<String, f64> {
        self.per_station(|values| mean(values.iter().filter_map(|v| v.value)))
    }

    pub fn get_timestamp_range(&self) -> Option<(i64, i64)> {
        min_max(self.all_values().map(|v| v.ms_since_epoch))
    }

    pub fn get_quality_summary(&self) -> BTreeMap<String, usize> {
        count_by(self.all_values().map(|v| v.quality_code.as_str()))
    }

    pub fn get_data_count(&self) -> usize {
        self.stations.values().map(|e| e.values.len()).sum()
    }

    pub fn get_data_counts_by_station(&self) -> BTreeMap<String, usize> {
        self.stations
            .iter()
            .map(|(station_id, entry)| (station_id.clone(), entry.values.len()))
            .collect()
    }

    /// station -> quality code -> non-null values. Stations without any value are left out.
    pub fn get_values_by_station_and_quality(&self) -> BTreeMap<String, BTreeMap<String, Vec<f64>>> {
        self.per_station(|values| {
            let mut by_quality: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for v in values {
                if let Some(value) = v.value {
                    by_quality.entry(v.quality_code.clone()).or_default().push(value);
                }
            }
            (!by_quality.is_empty()).then_some(by_quality)
        })
    }

    /// Stations left without values are dropped.
    pub fn filter_by_quality(&self, quality_codes: &[&str]) -> Self {
        self.filter(|v| quality_codes.contains(&v.quality_code.as_str()))
    }

    /// Stations left without values are dropped.
    pub fn filter_by_origin(&self, origins: &[&str]) -> Self {
        self.filter(|v| origins.contains(&v.origin.as_str()))
    }

    fn filter(&self, keep: impl Fn(&SynchronizeValue) -> bool) -> Self {
        let stations = self
            .stations
            .iter()
            .filter_map(|(station_id, entry)| {
                let values: Vec<_> = entry.values.iter().filter(|v| keep(*v)).cloned().collect();
                (!values.is_empty()).then(|| {
                    (
                        station_id.clone(),
                        SynchronizeEntry {
                            values,
                            ..entry.clone()
                        },
                    )
                })
            })
            .collect();
        Self { stations }
    }

    fn all_values(&self) -> impl Iterator<Item = &SynchronizeValue> {
        self.stations.values().flat_map(|e| e.values.iter())
    }

    fn per_station<T>(&self, reduce: impl Fn(&[SynchronizeValue]) -> Option<T>) -> BTreeMap<String, T> {
        self.stations
            .iter()
            .filter_map(|(station_id, entry)| Some((station_id.clone(), reduce(&entry.values)?)))
            .collect()
    }

    /// One row per reading, grouped by station.
    ///
    /// Columns: `station_id`, `datetime`, `value`, `quality_code`; `include_metadata` adds
    /// `key`, `origin`, `key_type`, `tag` (as JSON text) and `percent_available`.
    #[cfg(feature = "dataframe")]
    pub fn to_dataframe(
        &self,
        include_metadata: bool,
    ) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use crate::utils::datetime_column;
        use polars::prelude::*;

        let rows: Vec<(&SynchronizeEntry, &SynchronizeValue)> = self
            .stations
            .values()
            .flat_map(|entry| entry.values.iter().map(move |v| (entry, v)))
            .collect();

        let mut columns = vec![
            Column::new(
                "station_id".into(),
                rows.iter().map(|(e, _)| e.station_id.as_str()).collect::<Vec<_>>(),
            ),
            datetime_column(
                "datetime",
                rows.iter().map(|(_, v)| Some(v.ms_since_epoch)).collect(),
            )?,
            Column::new("value".into(), rows.iter().map(|(_, v)| v.value).collect::<Vec<_>>()),
            Column::new(
                "quality_code".into(),
                rows.iter().map(|(_, v)| v.quality_code.as_str()).collect::<Vec<_>>(),
            ),
        ];
        if include_metadata {
            columns.extend([
                Column::new(
                    "key".into(),
                    rows.iter().map(|(e, _)| e.key.as_str()).collect::<Vec<_>>(),
                ),
                Column::new(
                    "origin".into(),
                    rows.iter().map(|(_, v)| v.origin.as_str()).collect::<Vec<_>>(),
                ),
                Column::new(
                    "key_type".into(),
                    rows.iter().map(|(_, v)| v.key_type.as_str()).collect::<Vec<_>>(),
                ),
                Column::new(
                    "tag".into(),
                    rows.iter()
                        .map(|(_, v)| Value::Object(v.tag.clone()).to_string())
                        .collect::<Vec<_>>(),
                ),
                Column::new(
                    "percent_available".into(),
                    rows.iter().map(|(_, v)| v.percent_available).collect::<Vec<_>>(),
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

    const T0: i64 = 1_449_794_818_000;
    const T1: i64 = 1_449_794_819_000;

    fn reading(key: &str, ms: i64, value: Option<f64>, quality: &str) -> Value {
        json!({
            "origin": "MANIPULATED",
            "key": key,
            "keyType": "station_id",
            "msSinceEpoch": ms,
            "value": value,
            "tag": {},
            "qualityCode": quality,
            "percentAvailable": 0
        })
    }

    fn payload() -> Value {
        // Later timestamp first, so parsing has to restore time order.
        json!({
            T1.to_string(): {
                "S6-H": reading("S6-H", T1, Some(7.75), "A"),
                "S6P-3": reading("S6P-3", T1, Some(8.11), "P"),
            },
            T0.to_string(): {
                "S6-H": reading("S6-H", T0, Some(7.76), "A"),
                "S6P-3": reading("S6P-3", T0, None, "A"),
            },
        })
    }

    #[test]
    fn test_regroups_by_station() {
        let response = SynchronizeResponse::from_dict(&payload()).unwrap();
        assert!(response.has_data());
        assert_eq!(response.get_station_ids(), vec!["S6-H", "S6P-3"]);

        let s6 = response.get_station_data("S6-H").unwrap();
        assert_eq!(s6.station_id, "S6-H");
        assert_eq!(s6.key, "S6-H");
        let times: Vec<i64> = s6.values.iter().map(|v| v.ms_since_epoch).collect();
        assert_eq!(times, vec![T0, T1]);
        assert!(response.get_station_values("missing").is_empty());
    }

    #[test]
    fn test_skips_non_object_entries() {
        let response = SynchronizeResponse::from_dict(&json!({
            "status": "ignored",
            T0.to_string(): {"S6-H": reading("S6-H", T0, Some(1.0), "A"), "junk": 5}
        }))
        .unwrap();
        assert_eq!(response.get_station_ids(), vec!["S6-H"]);

        let empty = SynchronizeResponse::from_dict(&Value::Null).unwrap();
        assert!(!empty.has_data());
        assert_eq!(empty.get_timestamp_range(), None);
    }

    #[test]
    fn test_accessors() {
        let response = SynchronizeResponse::from_dict(&payload()).unwrap();
        assert_eq!(response.get_timestamps(), vec![T0, T1]);
        assert_eq!(response.get_timestamp_range(), Some((T0, T1)));
        assert_eq!(response.get_data_count(), 4);
        assert_eq!(response.get_data_counts_by_station()["S6P-3"], 2);
        assert_eq!(response.get_quality_codes(), vec!["A", "P"]);
        assert_eq!(response.get_origins(), vec!["MANIPULATED"]);
        assert_eq!(response.get_quality_summary()["A"], 3);

        let at_t0 = response.get_values_at_timestamp(T0);
        assert_eq!(at_t0.len(), 2);
        assert_eq!(at_t0["S6-H"].value, Some(7.76));

        assert_eq!(response.get_latest_values()["S6P-3"], 8.11);
        // Earliest S6P-3 reading is null.
        assert!(!response.get_earliest_values().contains_key("S6P-3"));
        assert_eq!(response.get_value_ranges()["S6-H"], (7.75, 7.76));
        assert_eq!(response.get_average_values()["S6P-3"], 8.11);

        let grouped = response.get_values_by_station_and_quality();
        assert_eq!(grouped["S6-H"]["A"], vec![7.76, 7.75]);
        assert_eq!(grouped["S6P-3"]["P"], vec![8.11]);
        assert!(!grouped["S6P-3"].contains_key("A"));
    }

    #[test]
    fn test_filters_drop_empty_stations() {
        let response = SynchronizeResponse::from_dict(&payload()).unwrap();
        let before = response.clone();

        let provisional = response.filter_by_quality(&["P"]);
        assert_eq!(provisional.get_station_ids(), vec!["S6P-3"]);
        assert_eq!(provisional.get_data_count(), 1);

        assert!(!response.filter_by_origin(&["RAW"]).has_data());
        assert_eq!(response.filter_by_origin(&["MANIPULATED"]), response);
        assert_eq!(response, before);
    }

    #[test]
    fn test_round_trip_restores_wire_shape() {
        let response = SynchronizeResponse::from_dict(&payload()).unwrap();
        let dict = response.to_dict().unwrap();
        assert_eq!(dict[T0.to_string()]["S6-H"]["key"], "S6-H");
        assert_eq!(dict[T1.to_string()]["S6P-3"]["qualityCode"], "P");
        assert_eq!(SynchronizeResponse::from_dict(&dict).unwrap(), response);
    }

    #[test]
    fn test_round_trip_normalizes_hand_built_value() {
        let value = |ms: i64| SynchronizeValue {
            ms_since_epoch: ms,
            value: Some(ms as f64),
            ..Default::default()
        };
        let entry = |id: &str, values: Vec<SynchronizeValue>| SynchronizeEntry {
            station_id: id.to_string(),
            key: id.to_string(),
            values,
        };
        let built = SynchronizeResponse {
            stations: BTreeMap::from([
                ("S1".to_string(), entry("S1", vec![value(2), value(1)])),
                ("S2".to_string(), entry("S2", Vec::new())),
            ]),
        };

        let back = SynchronizeResponse::from_dict(&built.to_dict().unwrap()).unwrap();
        assert_eq!(back.get_station_ids(), vec!["S1"]);
        let times: Vec<i64> = back.stations["S1"].values.iter().map(|v| v.ms_since_epoch).collect();
        assert_eq!(times, vec![1, 2]);
    }

    #[test]
    fn test_latest_value_prefers_first_on_tie() {
        let response = SynchronizeResponse::from_dict(&json!({
            T0.to_string(): {"S6-H": reading("S6-H", T0, Some(1.0), "A")}
        }))
        .unwrap();
        let mut tied = response.clone();
        let s6 = tied.stations.get_mut("S6-H").unwrap();
        let mut second = s6.values[0].clone();
        second.value = Some(2.0);
        s6.values.push(second);
        assert_eq!(tied.get_latest_values()["S6-H"], 1.0);
    }

    #[cfg(feature = "dataframe")]
    #[test]
    fn test_to_dataframe() -> Result<(), Box<dyn std::error::Error>> {
        let response = SynchronizeResponse::from_dict(&payload())?;
        let df = response.to_dataframe(true)?;
        assert_eq!(df.shape(), (4, 9));
        assert_eq!(df.column("tag")?.str()?.get(0), Some("{}"));
        assert_eq!(SynchronizeResponse::default().to_dataframe(false)?.width(), 4);
        Ok(())
    }
}
