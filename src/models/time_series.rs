//! Models for the `timeseries`, `dailydata`, `realtime` and `nexrad` endpoints, which all
//! answer with the same `timeSeriesResponse` structure, plus the `por` period of record.

use crate::models::{ResponseModel, Status};
use crate::types::api_datetime::{normalize_range, ApiDateTime, DateInput};
use crate::types::error::ValidationError;
use crate::utils::{count_by, lenient_string, min_max, null_default};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesResponse {
    #[serde(deserialize_with = "null_default")]
    pub status: Status,
    #[serde(deserialize_with = "null_default")]
    pub time_series: Vec<TimeSeriesEntry>,
}

/// One series: a single site and parameter with its observations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSeriesEntry {
    #[serde(deserialize_with = "null_default")]
    pub source_info: SourceInfo,
    #[serde(deserialize_with = "null_default")]
    pub period_of_record: PeriodOfRecord,
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    pub application_name: Option<String>,
    pub recorder_class: Option<String>,
    pub current_status: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub time_series_id: String,
    #[serde(deserialize_with = "null_default")]
    pub reference_elevation: ReferenceElevation,
    #[serde(deserialize_with = "null_default")]
    pub parameter: Parameter,
    /// Observations in the order the service delivered them, oldest first.
    #[serde(deserialize_with = "null_default")]
    pub values: Vec<ObservationValue>,
    /// Only present on real-time responses.
    pub summary: Option<Summary>,
}

impl TimeSeriesEntry {
    pub fn site_code(&self) -> &str {
        &self.source_info.site_code.value
    }

    /// Copy of this entry carrying a different set of observations.
    fn with_values(&self, values: Vec<ObservationValue>) -> Self {
        Self {
            values,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceInfo {
    #[serde(deserialize_with = "lenient_string")]
    pub site_name: String,
    #[serde(deserialize_with = "null_default")]
    pub site_code: SiteCode,
    #[serde(deserialize_with = "null_default")]
    pub geo_location: GeoLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SiteCode {
    #[serde(deserialize_with = "lenient_string")]
    pub network: String,
    #[serde(deserialize_with = "lenient_string")]
    pub agency_code: String,
    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeoLocation {
    #[serde(deserialize_with = "null_default")]
    pub geog_location: GeogLocation,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeogLocation {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub location_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub srs: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Dates bounding the available data. Each may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodOfRecord {
    pub por_begin_date: Option<String>,
    pub por_last_date: Option<String>,
    pub provisional_begin_date: Option<String>,
    pub provisional_last_date: Option<String>,
    pub approved_begin_date: Option<String>,
    pub approved_last_date: Option<String>,
}

impl PeriodOfRecord {
    pub fn por_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        parse_pair(&self.por_begin_date, &self.por_last_date)
    }

    pub fn provisional_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        parse_pair(&self.provisional_begin_date, &self.provisional_last_date)
    }

    pub fn approved_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        parse_pair(&self.approved_begin_date, &self.approved_last_date)
    }
}

impl ResponseModel for PeriodOfRecord {
    const MODEL: &'static str = "period of record";

    fn has_data(&self) -> bool {
        self.por_begin_date.is_some() || self.por_last_date.is_some()
    }
}

fn parse_pair(
    begin: &Option<String>,
    end: &Option<String>,
) -> Option<(NaiveDateTime, NaiveDateTime)> {
    Some((
        parse_timestamp(begin.as_deref()?)?,
        parse_timestamp(end.as_deref()?)?,
    ))
}

/// Reads timestamps as the service writes them; RFC 3339 is accepted as a fallback.
pub(crate) fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ApiDateTime::parse(value)
        .map(|dt| dt.naive())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceElevation {
    #[serde(deserialize_with = "null_default")]
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Parameter {
    #[serde(deserialize_with = "null_default")]
    pub parameter_code: ParameterCode,
    #[serde(deserialize_with = "lenient_string")]
    pub parameter_name: String,
    #[serde(deserialize_with = "lenient_string")]
    pub parameter_description: String,
    #[serde(deserialize_with = "null_default")]
    pub unit: Unit,
    pub no_data_value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterCode {
    #[serde(rename = "parameterID", deserialize_with = "lenient_string")]
    pub parameter_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Unit {
    #[serde(deserialize_with = "lenient_string")]
    pub unit_code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationValue {
    pub qualifier: Option<String>,
    pub quality_code: Option<String>,
    /// Raw timestamp, e.g. `2023-01-01T00:00:00:000`.
    #[serde(deserialize_with = "lenient_string")]
    pub date_time: String,
    pub value: Option<f64>,
    pub percent_available: Option<f64>,
}

impl ObservationValue {
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.date_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub stddev: Option<f64>,
    pub num_of_records: Option<i64>,
}

impl ResponseModel for TimeSeriesResponse {
    const MODEL: &'static str = "time series";

    fn has_data(&self) -> bool {
        self.time_series.iter().any(|ts| !ts.values.is_empty())
    }
}

impl TimeSeriesResponse {
    pub fn get_site_codes(&self) -> Vec<&str> {
        self.time_series.iter().map(|ts| ts.site_code()).collect()
    }

    pub fn get_site_names(&self) -> Vec<&str> {
        self.time_series
            .iter()
            .map(|ts| ts.source_info.site_name.as_str())
            .collect()
    }

    pub fn get_parameter_codes(&self) -> Vec<&str> {
        self.time_series
            .iter()
            .map(|ts| ts.parameter.parameter_code.value.as_str())
            .collect()
    }

    pub fn get_parameter_names(&self) -> Vec<&str> {
        self.time_series
            .iter()
            .map(|ts| ts.parameter.parameter_name.as_str())
            .collect()
    }

    pub fn get_data_for_site(&self, site_code: &str) -> Option<&TimeSeriesEntry> {
        self.time_series.iter().find(|ts| ts.site_code() == site_code)
    }

    /// Last observation of each site, skipped when its value is missing.
    pub fn get_latest_values(&self) -> BTreeMap<String, f64> {
        self.time_series
            .iter()
            .filter_map(|ts| {
                let value = ts.values.last()?.value?;
                Some((ts.site_code().to_string(), value))
            })
            .collect()
    }

    pub fn get_value_ranges(&self) -> BTreeMap<String, (f64, f64)> {
        self.time_series
            .iter()
            .filter_map(|ts| {
                let range = min_max(ts.values.iter().filter_map(|obs| obs.value))?;
                Some((ts.site_code().to_string(), range))
            })
            .collect()
    }

    /// Earliest and latest raw timestamps across all series.
    pub fn get_date_range(&self) -> Option<(&str, &str)> {
        let dates = self
            .time_series
            .iter()
            .flat_map(|ts| ts.values.iter())
            .map(|obs| obs.date_time.as_str())
            .filter(|d| !d.is_empty());
        min_max(dates)
    }

    /// Counts of quality codes per site. Sites without any coded observation are left out.
    pub fn get_quality_summary(&self) -> BTreeMap<String, BTreeMap<String, usize>> {
        self.time_series
            .iter()
            .filter_map(|ts| {
                let counts = count_by(ts.values.iter().filter_map(|obs| obs.quality_code.as_deref()));
                (!counts.is_empty()).then(|| (ts.site_code().to_string(), counts))
            })
            .collect()
    }

    pub fn get_data_count(&self) -> usize {
        self.time_series.iter().map(|ts| ts.values.len()).sum()
    }

    pub fn get_data_counts_by_site(&self) -> BTreeMap<String, usize> {
        self.time_series
            .iter()
            .map(|ts| (ts.site_code().to_string(), ts.values.len()))
            .collect()
    }

    /// Keeps observations whose quality code is listed. Series left empty are dropped.
    pub fn filter_by_quality(&self, quality_codes: &[&str]) -> Self {
        self.filter_values(|obs| {
            obs.quality_code
                .as_deref()
                .is_some_and(|code| quality_codes.contains(&code))
        })
    }

    pub fn filter_by_sites(&self, site_codes: &[&str]) -> Self {
        Self {
            status: self.status.clone(),
            time_series: self
                .time_series
                .iter()
                .filter(|ts| site_codes.contains(&ts.site_code()))
                .cloned()
                .collect(),
        }
    }

    /// Keeps observations between `start` and `end`, both inclusive. Observations whose
    /// timestamp can't be read are dropped, as are series left empty.
    pub fn filter_by_date_range(
        &self,
        start: impl Into<DateInput>,
        end: impl Into<DateInput>,
    ) -> Result<Self, ValidationError> {
        let (start, end) = normalize_range(&start.into(), &end.into())?;
        let (start, end) = (start.naive(), end.naive());
        Ok(self.filter_values(|obs| {
            obs.timestamp()
                .is_some_and(|ts| start <= ts && ts <= end)
        }))
    }

    fn filter_values(&self, keep: impl Fn(&ObservationValue) -> bool) -> Self {
        let time_series = self
            .time_series
            .iter()
            .filter_map(|ts| {
                let values: Vec<_> = ts.values.iter().filter(|obs| keep(*obs)).cloned().collect();
                (!values.is_empty()).then(|| ts.with_values(values))
            })
            .collect();
        Self {
            status: self.status.clone(),
            time_series,
        }
    }

    /// One row per observation, ordered by time.
    ///
    /// Columns: `datetime`, `value`, `site_code`, `quality_code`, `qualifier`, plus
    /// `site_name`, `parameter_code`, `parameter_name` and `unit_code` when
    /// `include_metadata` is set.
    #[cfg(feature = "dataframe")]
    pub fn to_dataframe(
        &self,
        include_metadata: bool,
    ) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use crate::utils::datetime_column;
        use polars::prelude::*;

        let mut rows: Vec<(&TimeSeriesEntry, &ObservationValue, Option<i64>)> = self
            .time_series
            .iter()
            .flat_map(|ts| ts.values.iter().map(move |obs| (ts, obs)))
            .map(|(ts, obs)| (ts, obs, obs.timestamp().map(|t| t.and_utc().timestamp_millis())))
            .collect();
        // Stable sort; unreadable timestamps go last.
        rows.sort_by_key(|(_, _, millis)| (millis.is_none(), *millis));

        let mut columns = vec![
            datetime_column("datetime", rows.iter().map(|r| r.2).collect())?,
            Column::new("value".into(), rows.iter().map(|r| r.1.value).collect::<Vec<_>>()),
            Column::new(
                "site_code".into(),
                rows.iter().map(|r| r.0.site_code()).collect::<Vec<_>>(),
            ),
            Column::new(
                "quality_code".into(),
                rows.iter()
                    .map(|r| r.1.quality_code.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "qualifier".into(),
                rows.iter().map(|r| r.1.qualifier.as_deref()).collect::<Vec<_>>(),
            ),
        ];
        if include_metadata {
            columns.extend([
                Column::new(
                    "site_name".into(),
                    rows.iter()
                        .map(|r| r.0.source_info.site_name.as_str())
                        .collect::<Vec<_>>(),
                ),
                Column::new(
                    "parameter_code".into(),
                    rows.iter()
                        .map(|r| r.0.parameter.parameter_code.value.as_str())
                        .collect::<Vec<_>>(),
                ),
                Column::new(
                    "parameter_name".into(),
                    rows.iter()
                        .map(|r| r.0.parameter.parameter_name.as_str())
                        .collect::<Vec<_>>(),
                ),
                Column::new(
                    "unit_code".into(),
                    rows.iter()
                        .map(|r| r.0.parameter.unit.unit_code.as_str())
                        .collect::<Vec<_>>(),
                ),
            ]);
        }
        DataFrame::new(columns)
    }
}
