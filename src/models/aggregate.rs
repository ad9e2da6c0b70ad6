use crate::models::ResponseModel;
use crate::utils::{count_by, lenient_string, mean, min_max, null_default, unique_sorted};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Statistics computed per interval by the `aggregate` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateResponse {
    #[serde(deserialize_with = "null_default")]
    pub intervals: Vec<AggregateInterval>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregateInterval {
    #[serde(rename = "endMilliSinceEpoch", deserialize_with = "null_default")]
    pub end_millis_since_epoch: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub statistic_type: String,
    #[serde(deserialize_with = "null_default")]
    pub timespan: Timespan,
    #[serde(rename = "startMilliSinceEpoch", deserialize_with = "null_default")]
    pub start_millis_since_epoch: i64,
    pub value: Option<f64>,
    /// Station or site the interval belongs to.
    #[serde(deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(deserialize_with = "null_default")]
    pub tag: Tag,
    #[serde(deserialize_with = "lenient_string")]
    pub end_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub start_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub key_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub quality_code: String,
    pub percent_available: Option<f64>,
    #[serde(deserialize_with = "lenient_string")]
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timespan {
    #[serde(deserialize_with = "null_default")]
    pub scalar: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub unit_of_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub tag: Option<String>,
}

impl Tag {
    pub fn is_set(&self) -> bool {
        self.tag.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl ResponseModel for AggregateResponse {
    const MODEL: &'static str = "aggregate";

    fn has_data(&self) -> bool {
        !self.intervals.is_empty()
    }
}

impl AggregateResponse {
    pub fn get_keys(&self) -> Vec<String> {
        unique_sorted(self.intervals.iter().map(|i| i.key.as_str()))
    }

    pub fn get_statistic_types(&self) -> Vec<String> {
        unique_sorted(self.intervals.iter().map(|i| i.statistic_type.as_str()))
    }

    /// Every non-null value, in payload order.
    pub fn get_values(&self) -> Vec<f64> {
        self.intervals.iter().filter_map(|i| i.value).collect()
    }

    pub fn get_quality_codes(&self) -> Vec<String> {
        unique_sorted(self.intervals.iter().map(|i| i.quality_code.as_str()))
    }

    pub fn get_origins(&self) -> Vec<String> {
        unique_sorted(self.intervals.iter().map(|i| i.origin.as_str()))
    }

    /// Distinct `(scalar, unit_of_time)` pairs, sorted.
    pub fn get_timespans(&self) -> Vec<(i64, String)> {
        self.intervals
            .iter()
            .map(|i| (i.timespan.scalar, i.timespan.unit_of_time.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Earliest interval start and latest interval end, in milliseconds since the epoch.
    pub fn get_timestamp_range(&self) -> Option<(i64, i64)> {
        coverage(self.intervals.iter())
    }

    pub fn get_value_range(&self) -> Option<(f64, f64)> {
        min_max(self.get_values())
    }

    /// Intervals for one key, ordered by start time.
    pub fn get_intervals_for_key(&self, key: &str) -> Vec<&AggregateInterval> {
        let mut intervals: Vec<_> = self.intervals.iter().filter(|i| i.key == key).collect();
        intervals.sort_by_key(|i| i.start_millis_since_epoch);
        intervals
    }

    pub fn get_intervals_by_statistic(&self, statistic_type: &str) -> Vec<&AggregateInterval> {
        self.intervals
            .iter()
            .filter(|i| i.statistic_type == statistic_type)
            .collect()
    }

    /// Value of the interval ending last, per key. The first of tied intervals wins.
    pub fn get_latest_values_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|intervals| {
            intervals
                .iter()
                .rev()
                .max_by_key(|i| i.end_millis_since_epoch)
                .and_then(|i| i.value)
        })
    }

    /// Value of the interval starting first, per key.
    pub fn get_earliest_values_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|intervals| {
            intervals
                .iter()
                .min_by_key(|i| i.start_millis_since_epoch)
                .and_then(|i| i.value)
        })
    }

    pub fn get_value_ranges_by_key(&self) -> BTreeMap<String, (f64, f64)> {
        self.per_key(|intervals| min_max(intervals.iter().filter_map(|i| i.value)))
    }

    pub fn get_average_values_by_key(&self) -> BTreeMap<String, f64> {
        self.per_key(|intervals| mean(intervals.iter().filter_map(|i| i.value)))
    }

    pub fn get_quality_summary(&self) -> BTreeMap<String, usize> {
        count_by(self.intervals.iter().map(|i| i.quality_code.as_str()))
    }

    pub fn get_statistic_summary(&self) -> BTreeMap<String, usize> {
        count_by(self.intervals.iter().map(|i| i.statistic_type.as_str()))
    }

    pub fn get_data_count(&self) -> usize {
        self.intervals.len()
    }

    pub fn get_data_counts_by_key(&self) -> BTreeMap<String, usize> {
        count_by(self.intervals.iter().map(|i| i.key.as_str()))
    }

    /// key -> statistic type -> intervals, each list ordered by start time.
    pub fn get_intervals_by_key_and_statistic(
        &self,
    ) -> BTreeMap<String, BTreeMap<String, Vec<&AggregateInterval>>> {
        let mut grouped: BTreeMap<String, BTreeMap<String, Vec<&AggregateInterval>>> =
            BTreeMap::new();
        for (key, intervals) in self.grouped_by_key() {
            let by_statistic = grouped.entry(key.to_string()).or_default();
            for interval in intervals {
                by_statistic
                    .entry(interval.statistic_type.clone())
                    .or_default()
                    .push(interval);
            }
        }
        grouped
    }

    pub fn get_tagged_intervals(&self) -> Vec<&AggregateInterval> {
        self.intervals.iter().filter(|i| i.tag.is_set()).collect()
    }

    /// Earliest start and latest end per key.
    pub fn get_time_coverage_by_key(&self) -> BTreeMap<String, (i64, i64)> {
        self.per_key(|intervals| coverage(intervals.iter().copied()))
    }

    pub fn filter_by_key(&self, keys: &[&str]) -> Self {
        self.filter(|i| keys.contains(&i.key.as_str()))
    }

    pub fn filter_by_statistic(&self, statistic_types: &[&str]) -> Self {
        self.filter(|i| statistic_types.contains(&i.statistic_type.as_str()))
    }

    pub fn filter_by_quality(&self, quality_codes: &[&str]) -> Self {
        self.filter(|i| quality_codes.contains(&i.quality_code.as_str()))
    }

    pub fn filter_by_origin(&self, origins: &[&str]) -> Self {
        self.filter(|i| origins.contains(&i.origin.as_str()))
    }

    fn filter(&self, keep: impl Fn(&AggregateInterval) -> bool) -> Self {
        Self {
            intervals: self.intervals.iter().filter(|i| keep(*i)).cloned().collect(),
        }
    }

    fn grouped_by_key(&self) -> BTreeMap<&str, Vec<&AggregateInterval>> {
        let mut grouped: BTreeMap<&str, Vec<&AggregateInterval>> = BTreeMap::new();
        for interval in &self.intervals {
            grouped.entry(interval.key.as_str()).or_default().push(interval);
        }
        for intervals in grouped.values_mut() {
            intervals.sort_by_key(|i| i.start_millis_since_epoch);
        }
        grouped
    }

    fn per_key<T>(
        &self,
        reduce: impl Fn(&[&AggregateInterval]) -> Option<T>,
    ) -> BTreeMap<String, T> {
        self.grouped_by_key()
            .into_iter()
            .filter_map(|(key, intervals)| Some((key.to_string(), reduce(&intervals)?)))
            .collect()
    }

    /// One row per interval, ordered by start time.
    ///
    /// Columns: `start_datetime`, `end_datetime`, `statistic_type`, `value`, `key`,
    /// `quality_code`; `include_metadata` adds `start_date`, `end_date`, `key_type`,
    /// `percent_available`, `origin`, `timespan_scalar`, `timespan_unit`, `tag`,
    /// `start_millis` and `end_millis`.
    #[cfg(feature = "dataframe")]
    pub fn to_dataframe(
        &self,
        include_metadata: bool,
    ) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use crate::utils::datetime_column;
        use polars::prelude::*;

        let mut rows: Vec<&AggregateInterval> = self.intervals.iter().collect();
        rows.sort_by_key(|i| i.start_millis_since_epoch);

        let strings = |name: &str, f: fn(&AggregateInterval) -> &str| {
            Column::new(name.into(), rows.iter().map(|i| f(*i)).collect::<Vec<_>>())
        };
        let mut columns = vec![
            datetime_column(
                "start_datetime",
                rows.iter().map(|i| Some(i.start_millis_since_epoch)).collect(),
            )?,
            datetime_column(
                "end_datetime",
                rows.iter().map(|i| Some(i.end_millis_since_epoch)).collect(),
            )?,
            strings("statistic_type", |i| i.statistic_type.as_str()),
            Column::new("value".into(), rows.iter().map(|i| i.value).collect::<Vec<_>>()),
            strings("key", |i| i.key.as_str()),
            strings("quality_code", |i| i.quality_code.as_str()),
        ];
        if include_metadata {
            columns.extend([
                strings("start_date", |i| i.start_date.as_str()),
                strings("end_date", |i| i.end_date.as_str()),
                strings("key_type", |i| i.key_type.as_str()),
                Column::new(
                    "percent_available".into(),
                    rows.iter().map(|i| i.percent_available).collect::<Vec<_>>(),
                ),
                strings("origin", |i| i.origin.as_str()),
                Column::new(
                    "timespan_scalar".into(),
                    rows.iter().map(|i| i.timespan.scalar).collect::<Vec<_>>(),
                ),
                strings("timespan_unit", |i| i.timespan.unit_of_time.as_str()),
                Column::new(
                    "tag".into(),
                    rows.iter().map(|i| i.tag.tag.as_deref()).collect::<Vec<_>>(),
                ),
                Column::new(
                    "start_millis".into(),
                    rows.iter()
                        .map(|i| i.start_millis_since_epoch)
                        .collect::<Vec<_>>(),
                ),
                Column::new(
                    "end_millis".into(),
                    rows.iter().map(|i| i.end_millis_since_epoch).collect::<Vec<_>>(),
                ),
            ]);
        }
        DataFrame::new(columns)
    }
}

fn coverage<'a>(intervals: impl Iterator<Item = &'a AggregateInterval> + Clone) -> Option<(i64, i64)> {
    let start = intervals.clone().map(|i| i.start_millis_since_epoch).min()?;
    let end = intervals.map(|i| i.end_millis_since_epoch).max()?;
    Some((start, end))
}
