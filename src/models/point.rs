use crate::models::{ResponseModel, Status};
use crate::utils::{count_by, mean, min_max, null_default, unique_sorted};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of the `tsarithmetic` endpoint. Null points are kept in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointResponse {
    #[serde(deserialize_with = "null_default")]
    pub status: Status,
    #[serde(deserialize_with = "null_default")]
    pub points: Vec<Option<Point>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Point {
    pub value: Option<f64>,
    pub timestamp: Option<i64>,
    pub ms_since_epoch: Option<i64>,
    pub quality_code: Option<String>,
}

impl Point {
    /// `timestamp`, falling back to `ms_since_epoch`.
    pub fn instant(&self) -> Option<i64> {
        self.timestamp.or(self.ms_since_epoch)
    }
}

impl ResponseModel for PointResponse {
    const MODEL: &'static str = "point";

    fn has_data(&self) -> bool {
        self.points.iter().any(Option::is_some)
    }
}

impl PointResponse {
    pub fn get_valid_points(&self) -> Vec<&Point> {
        self.points.iter().flatten().collect()
    }

    pub fn get_values(&self) -> Vec<f64> {
        self.points.iter().flatten().filter_map(|p| p.value).collect()
    }

    pub fn get_quality_codes(&self) -> Vec<String> {
        unique_sorted(self.points.iter().flatten().filter_map(|p| p.quality_code.as_deref()))
    }

    /// Sorted instants of the points that carry one.
    pub fn get_timestamps(&self) -> Vec<i64> {
        let mut timestamps: Vec<i64> = self.points.iter().flatten().filter_map(Point::instant).collect();
        timestamps.sort_unstable();
        timestamps
    }

    pub fn get_value_range(&self) -> Option<(f64, f64)> {
        min_max(self.get_values())
    }

    pub fn get_timestamp_range(&self) -> Option<(i64, i64)> {
        min_max(self.points.iter().flatten().filter_map(Point::instant))
    }

    pub fn get_average_value(&self) -> Option<f64> {
        mean(self.get_values())
    }

    pub fn get_quality_summary(&self) -> BTreeMap<String, usize> {
        count_by(self.points.iter().flatten().filter_map(|p| p.quality_code.as_deref()))
    }

    /// Number of non-null points.
    pub fn get_data_count(&self) -> usize {
        self.points.iter().flatten().count()
    }

    pub fn get_null_count(&self) -> usize {
        self.points.iter().filter(|p| p.is_none()).count()
    }

    pub fn has_null_points(&self) -> bool {
        self.points.iter().any(Option::is_none)
    }

    /// Value of the latest point. Points without an instant sort as the epoch; on a tie the
    /// first point wins.
    pub fn get_latest_value(&self) -> Option<f64> {
        self.points
            .iter()
            .flatten()
            .rev()
            .max_by_key(|p| p.instant().unwrap_or(0))?
            .value
    }

    /// Value of the earliest point. Points without an instant sort last.
    pub fn get_earliest_value(&self) -> Option<f64> {
        self.points
            .iter()
            .flatten()
            .min_by_key(|p| p.instant().unwrap_or(i64::MAX))?
            .value
    }

    pub fn get_points_by_quality(&self) -> BTreeMap<String, Vec<&Point>> {
        let mut grouped: BTreeMap<String, Vec<&Point>> = BTreeMap::new();
        for point in self.points.iter().flatten() {
            if let Some(code) = &point.quality_code {
                grouped.entry(code.clone()).or_default().push(point);
            }
        }
        grouped
    }

    /// Keeps the status. Null points are dropped.
    pub fn filter_by_quality(&self, quality_codes: &[&str]) -> Self {
        Self {
            status: self.status.clone(),
            points: self
                .points
                .iter()
                .flatten()
                .filter(|p| {
                    p.quality_code
                        .as_deref()
                        .is_some_and(|code| quality_codes.contains(&code))
                })
                .cloned()
                .map(Some)
                .collect(),
        }
    }

    /// One row per non-null point.
    ///
    /// Columns: `value`, `timestamp`; `include_metadata` adds `ms_since_epoch` and
    /// `quality_code`.
    #[cfg(feature = "dataframe")]
    pub fn to_dataframe(
        &self,
        include_metadata: bool,
    ) -> polars::prelude::PolarsResult<polars::prelude::DataFrame> {
        use crate::utils::datetime_column;
        use polars::prelude::*;

        let points = self.get_valid_points();
        let mut columns = vec![
            Column::new("value".into(), points.iter().map(|p| p.value).collect::<Vec<_>>()),
            datetime_column("timestamp", points.iter().map(|p| p.instant()).collect())?,
        ];
        if include_metadata {
            columns.push(Column::new(
                "ms_since_epoch".into(),
                points.iter().map(|p| p.ms_since_epoch).collect::<Vec<_>>(),
            ));
            columns.push(Column::new(
                "quality_code".into(),
                points
                    .iter()
                    .map(|p| p.quality_code.as_deref())
                    .collect::<Vec<_>>(),
            ));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{json, Value};

    pub(crate) fn point_payload() -> Value {
        json!({
            "status": {"statusCode": 200, "statusMessage": "Success", "elapsedTime": 0.045123},
            "points": [
                {"value": 15.75, "timestamp": 1672574400000i64, "msSinceEpoch": 1672574400000i64, "qualityCode": "A"},
                null,
                {"value": 20.25, "msSinceEpoch": 1672574460000i64, "qualityCode": "B"},
                {"value": null, "timestamp": 1672574520000i64, "qualityCode": "A"}
            ]
        })
    }

    #[test]
    fn test_parse_keeps_null_points() {
        let response = PointResponse::from_dict(&point_payload()).unwrap();
        assert_eq!(response.status.status_code, Some(200));
        assert_eq!(response.status.elapsed_time, Some(0.045123));
        assert_eq!(response.points.len(), 4);
        assert!(response.points[1].is_none());
        assert_eq!(response.points[0].as_ref().and_then(|p| p.value), Some(15.75));
        assert!(response.has_data());
        assert!(response.has_null_points());
        assert_eq!(response.get_null_count(), 1);
        assert_eq!(response.get_data_count(), 3);
    }

    #[test]
    fn test_missing_points() {
        let response =
            PointResponse::from_dict(&json!({"status": {"statusCode": 200}})).unwrap();
        assert!(response.points.is_empty());
        assert!(!response.has_data());

        let only_nulls = PointResponse::from_dict(&json!({"points": [null, null]})).unwrap();
        assert!(!only_nulls.has_data());
        assert_eq!(only_nulls.get_latest_value(), None);
    }

    #[test]
    fn test_accessors() {
        let response = PointResponse::from_dict(&point_payload()).unwrap();
        assert_eq!(response.get_values(), vec![15.75, 20.25]);
        assert_eq!(response.get_quality_codes(), vec!["A", "B"]);
        assert_eq!(
            response.get_timestamps(),
            vec![1672574400000, 1672574460000, 1672574520000]
        );
        assert_eq!(
            response.get_timestamp_range(),
            Some((1672574400000, 1672574520000))
        );
        assert_eq!(response.get_value_range(), Some((15.75, 20.25)));
        assert_eq!(response.get_average_value(), Some(18.0));
        assert_eq!(response.get_quality_summary()["A"], 2);
        // The latest point has no value.
        assert_eq!(response.get_latest_value(), None);
        assert_eq!(response.get_earliest_value(), Some(15.75));
        assert_eq!(response.get_points_by_quality()["B"].len(), 1);
    }

    #[test]
    fn test_latest_and_earliest_prefer_first_on_tie() {
        let response = PointResponse::from_dict(&json!({
            "points": [
                {"value": 1.0, "timestamp": 100},
                null,
                {"value": 2.0, "timestamp": 100}
            ]
        }))
        .unwrap();
        assert_eq!(response.get_latest_value(), Some(1.0));
        assert_eq!(response.get_earliest_value(), Some(1.0));
    }

    #[test]
    fn test_filter_by_quality() {
        let response = PointResponse::from_dict(&point_payload()).unwrap();
        let filtered = response.filter_by_quality(&["B"]);
        assert_eq!(filtered.status, response.status);
        assert_eq!(filtered.get_values(), vec![20.25]);
        assert!(!filtered.has_null_points());
        assert_eq!(response.points.len(), 4);
    }

    #[test]
    fn test_round_trip() {
        let response = PointResponse::from_dict(&point_payload()).unwrap();
        let dict = response.to_dict().unwrap();
        assert!(dict["points"][1].is_null());
        assert_eq!(PointResponse::from_dict(&dict).unwrap(), response);
    }

    #[cfg(feature = "dataframe")]
    #[test]
    fn test_to_dataframe() -> Result<(), Box<dyn std::error::Error>> {
        let response = PointResponse::from_dict(&point_payload())?;
        assert_eq!(response.to_dataframe(false)?.shape(), (3, 2));
        assert_eq!(response.to_dataframe(true)?.shape(), (3, 4));
        Ok(())
    }
}
