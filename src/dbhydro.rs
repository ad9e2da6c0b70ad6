//! The DBHYDRO client: one builder method per data service endpoint.
//!
//! Every method validates its inputs first, so a bad parameter never costs a round trip.
//! The request then goes through the configured [`RestAdapter`], and the payload is checked
//! for transport, HTTP and API-level errors before it is parsed into a response model.

use crate::error::{ApiError, DbHydroError};
use crate::models::aggregate::AggregateResponse;
use crate::models::interpolate::InterpolateResponse;
use crate::models::point::PointResponse;
use crate::models::synchronize::SynchronizeResponse;
use crate::models::time_series::{PeriodOfRecord, TimeSeriesResponse};
use crate::models::water_quality::WaterQualityResponse;
use crate::models::ResponseModel;
use crate::rest_adapters::reqwest_adapter::ReqwestAdapter;
use crate::rest_adapters::{QueryParams, RawResponse, RestAdapter};
use crate::types::api_datetime::{normalize_range, ApiDateTime, DateInput};
use crate::types::error::ValidationError;
use crate::types::params::{
    join_identifiers, require_identifier, ApiParam, Calculation, CalculationParams, Choice,
    DailyIdentifierType, Datum, NexradFrequency, PolygonIdentifierType, RealTimeIdentifierType,
    TimespanUnit,
};
use bon::bon;
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_API_VERSION: u32 = 1;

pub const ENV_CLIENT_ID: &str = "DBHYDRO_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DBHYDRO_CLIENT_SECRET";
pub const ENV_API_VERSION: &str = "DBHYDRO_API_VERSION";

/// Base URL of the public data service for an API version.
pub fn default_base_url(api_version: u32) -> String {
    format!("https://dataservice-proxy.api.sfwmd.gov/v{api_version}/ext/data/")
}

/// Client for the South Florida Water Management District's DBHYDRO data service.
///
/// The client is immutable once built and holds no connection state of its own, so one
/// instance can serve any number of requests. Requests are blocking.
///
/// # Examples
///
/// ```no_run
/// use dbhydro::{DbHydroApi, DbHydroError};
///
/// # fn main() -> Result<(), DbHydroError> {
/// let api = DbHydroApi::with_default_adapter("my-client-id", "my-client-secret")?;
/// let response = api
///     .get_time_series()
///     .site_ids(&["S79-E"])
///     .date_start("2023-01-01")
///     .date_end("2023-01-02")
///     .call()?;
///
/// for (site, value) in response.get_latest_values() {
///     println!("{site}: {value}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DbHydroApi<A: RestAdapter = ReqwestAdapter> {
    adapter: A,
    client_id: String,
    client_secret: String,
    api_version: u32,
    base_url: String,
}

impl<A: RestAdapter + fmt::Debug> fmt::Debug for DbHydroApi<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbHydroApi")
            .field("adapter", &self.adapter)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl DbHydroApi<ReqwestAdapter> {
    /// Creates a client backed by a [`ReqwestAdapter`] with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbHydroError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_default_adapter(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, DbHydroError> {
        let adapter = ReqwestAdapter::builder().build()?;
        Ok(Self::new(adapter, client_id, client_secret))
    }

    /// Reads credentials from `DBHYDRO_CLIENT_ID` and `DBHYDRO_CLIENT_SECRET`, and the API
    /// version from the optional `DBHYDRO_API_VERSION`.
    ///
    /// # Errors
    ///
    /// Returns [`DbHydroError::MissingConfig`] if a credential is unset or empty, or if the
    /// API version is not a positive integer.
    pub fn from_env() -> Result<Self, DbHydroError> {
        let client_id = required_env(ENV_CLIENT_ID)?;
        let client_secret = required_env(ENV_CLIENT_SECRET)?;
        let api_version = match std::env::var(ENV_API_VERSION) {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    DbHydroError::MissingConfig(format!(
                        "{ENV_API_VERSION} must be a positive integer, got '{raw}'"
                    ))
                })?,
            Err(_) => DEFAULT_API_VERSION,
        };
        Ok(Self::with_default_adapter(client_id, client_secret)?.with_api_version(api_version))
    }
}

fn required_env(name: &str) -> Result<String, DbHydroError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DbHydroError::MissingConfig(format!("{name} is not set")))
}

impl<A: RestAdapter> DbHydroApi<A> {
    /// Creates a client for API version 1 that sends requests through `adapter`.
    pub fn new(adapter: A, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            adapter,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            api_version: DEFAULT_API_VERSION,
            base_url: default_base_url(DEFAULT_API_VERSION),
        }
    }

    /// Targets another API version. This resets the base URL to that version's default.
    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self.base_url = default_base_url(api_version);
        self
    }

    /// Sends requests to another host, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// Sends a request and returns the payload once it is known to be free of errors.
    fn perform_request(&self, endpoint: &str, mut params: QueryParams) -> Result<Value, DbHydroError> {
        params.insert("client_id", &self.client_id);
        params.insert("client_secret", &self.client_secret);
        params.insert("format", "json");

        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Requesting '{}' with {} parameters", endpoint, params.len());
        let response = self.adapter.get(&url, &params);
        check_response(response)
    }

    /// Runs a request and parses the payload, unwrapping `wrapper` when given.
    fn fetch<M: ResponseModel>(
        &self,
        endpoint: &str,
        params: QueryParams,
        wrapper: Option<&str>,
    ) -> Result<M, DbHydroError> {
        let data = self.perform_request(endpoint, params)?;
        let payload = extract_payload(endpoint, data, wrapper)?;
        let model = M::from_dict(&payload)?;
        info!(
            "Parsed {} response from '{}' (has data: {})",
            M::MODEL,
            endpoint,
            model.has_data()
        );
        Ok(model)
    }
}

#[bon]
impl<A: RestAdapter> DbHydroApi<A> {
    /// Fetches time series for one or more sites.
    ///
    /// # Arguments
    ///
    /// * `.site_ids(&[&str])`: **Required.** Site identifiers, e.g. `["S79-E"]`.
    /// * `.date_start(..)` / `.date_end(..)`: **Required.** Anything convertible into a
    ///   [`DateInput`]: a `"YYYY-MM-DD[ HH:MM[:SS[:mmm]]]"` string, a `NaiveDate`, a
    ///   `NaiveDateTime` or a `DateTime`.
    /// * `.calculation(..)`: Optional. `MEAN`, `MAX`, `MIN` or `SUM`. Requires `.timespan_unit(..)`.
    /// * `.timespan_unit(..)`: Optional. `YEAR` down to `SECOND`. Requires `.calculation(..)`.
    /// * `.timespan_value(u32)`: Optional. Number of units per timespan. Defaults to `1`.
    ///
    /// # Errors
    ///
    /// [`DbHydroError::Validation`] for bad parameters, raised before any request is made.
    /// [`DbHydroError::Api`] when the request fails or the service reports an error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use dbhydro::{Calculation, DbHydroApi, DbHydroError, TimespanUnit};
    /// # fn main() -> Result<(), DbHydroError> {
    /// let api = DbHydroApi::from_env()?;
    /// let daily_means = api
    ///     .get_time_series()
    ///     .site_ids(&["S79-E", "S80"])
    ///     .date_start("2023-01-01")
    ///     .date_end("2023-01-31")
    ///     .calculation(Calculation::Mean)
    ///     .timespan_unit(TimespanUnit::Day)
    ///     .call()?;
    /// println!("{:?}", daily_means.get_value_ranges());
    /// # Ok(())
    /// # }
    /// ```
    #[builder]
    pub fn get_time_series(
        &self,
        site_ids: &[&str],
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into)] calculation: Option<Choice<Calculation>>,
        #[builder(into)] timespan_unit: Option<Choice<TimespanUnit>>,
        #[builder(default = 1)] timespan_value: u32,
    ) -> Result<TimeSeriesResponse, DbHydroError> {
        let names = join_identifiers("site_ids", site_ids)?;
        let (begin, end) = normalize_range(&date_start, &date_end)?;
        let calculation = CalculationParams::validate(
            calculation.as_ref(),
            timespan_unit.as_ref(),
            timespan_value,
            Calculation::TIME_SERIES,
        )?;

        let mut params = QueryParams::new();
        params.insert("names", names);
        insert_range(&mut params, begin, end);
        insert_calculation(&mut params, calculation);
        self.fetch("timeseries", params, Some("timeSeriesResponse"))
    }

    /// Fetches daily values.
    ///
    /// `identifier_type` decides how `identifiers` are read: `timeseries`, `station` or `id`.
    /// `requested_datum` defaults to `NGVD29`.
    ///
    /// The service currently answers `includeSummary=Y` with a 503, so `include_summary(true)`
    /// is logged and sent as `N`.
    #[builder]
    pub fn get_daily_data(
        &self,
        identifiers: &[&str],
        #[builder(into)] identifier_type: Choice<DailyIdentifierType>,
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into, default = Choice::Known(Datum::Ngvd29))] requested_datum: Choice<Datum>,
        #[builder(default)] include_summary: bool,
    ) -> Result<TimeSeriesResponse, DbHydroError> {
        let joined = join_identifiers("identifiers", identifiers)?;
        let identifier_type = identifier_type.resolve()?;
        let requested_datum = requested_datum.resolve()?;
        let (begin, end) = normalize_range(&date_start, &date_end)?;

        if include_summary {
            warn!("includeSummary=Y currently makes the service fail with 503; sending N instead");
        }

        let mut params = QueryParams::new();
        params.insert(identifier_type.as_param(), joined);
        insert_range(&mut params, begin, end);
        params.insert("requestedDatum", requested_datum);
        params.insert("includeSummary", yes_no(false));
        self.fetch("dailydata", params, Some("timeSeriesResponse"))
    }

    /// Fetches the latest real-time readings.
    ///
    /// `status` filters by station status, e.g. `A`, `I` or `D`, and is ignored upstream
    /// for `timeseries` identifiers.
    #[builder]
    pub fn get_real_time(
        &self,
        identifiers: &[&str],
        #[builder(into)] identifier_type: Choice<RealTimeIdentifierType>,
        #[builder(into)] status: Option<String>,
    ) -> Result<TimeSeriesResponse, DbHydroError> {
        let joined = join_identifiers("identifiers", identifiers)?;
        let identifier_type = identifier_type.resolve()?;

        let mut params = QueryParams::new();
        params.insert(identifier_type.as_param(), joined);
        params.insert_opt("status", status);
        self.fetch("realtime", params, Some("timeSeriesResponse"))
    }

    /// Fetches statistics per interval for one station. Unlike
    /// [`get_time_series`](Self::get_time_series), the median (`MEDI`) is accepted.
    #[builder]
    pub fn get_aggregate(
        &self,
        station_id: &str,
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into)] calculation: Option<Choice<Calculation>>,
        #[builder(into)] timespan_unit: Option<Choice<TimespanUnit>>,
        #[builder(default = 1)] timespan_value: u32,
    ) -> Result<AggregateResponse, DbHydroError> {
        require_identifier("station_id", station_id)?;
        let (begin, end) = normalize_range(&date_start, &date_end)?;
        let calculation = CalculationParams::validate(
            calculation.as_ref(),
            timespan_unit.as_ref(),
            timespan_value,
            Calculation::all(),
        )?;

        let mut params = QueryParams::new();
        params.insert("stationId", station_id);
        insert_range(&mut params, begin, end);
        insert_calculation(&mut params, calculation);
        self.fetch("aggregate", params, None)
    }

    /// Fetches the value of a station interpolated at `date_time`.
    #[builder]
    pub fn get_interpolate(
        &self,
        station_id: &str,
        #[builder(into)] date_time: DateInput,
    ) -> Result<InterpolateResponse, DbHydroError> {
        require_identifier("station_id", station_id)?;
        let date_time = date_time.normalize()?;

        let mut params = QueryParams::new();
        params.insert("stationId", station_id);
        params.insert("dateTime", date_time);
        self.fetch("interpolate", params, None)
    }

    /// Fetches NEXRAD rainfall for radar pixels.
    ///
    /// `frequency` must be hourly or coarser (`H`, `D`, `M`, `Y` or `E`); 15 minute data is
    /// only published for polygons.
    #[builder]
    pub fn get_nexrad_pixel_data(
        &self,
        pixel_ids: &[&str],
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into)] frequency: Choice<NexradFrequency>,
        #[builder(default)] include_zero: bool,
    ) -> Result<TimeSeriesResponse, DbHydroError> {
        let joined = join_identifiers("pixel_ids", pixel_ids)?;
        let (begin, end) = normalize_range(&date_start, &date_end)?;
        let frequency = frequency.resolve_within(NexradFrequency::PIXEL)?;

        let mut params = QueryParams::new();
        params.insert("pixelId", joined);
        params.insert("polygonType", 0);
        insert_range(&mut params, begin, end);
        params.insert("frequency", frequency);
        params.insert("incZero", yes_no(include_zero));
        self.fetch("nexrad", params, Some("timeSeriesResponse"))
    }

    /// Fetches NEXRAD rainfall for polygons such as basins or water conservation areas.
    ///
    /// `polygon_type` selects the polygon layer and must be between 1 and 9.
    #[builder]
    pub fn get_nexrad_polygon_data(
        &self,
        identifiers: &[&str],
        #[builder(into)] identifier_type: Choice<PolygonIdentifierType>,
        polygon_type: u8,
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into)] frequency: Choice<NexradFrequency>,
        #[builder(default)] include_zero: bool,
    ) -> Result<TimeSeriesResponse, DbHydroError> {
        let joined = join_identifiers("identifiers", identifiers)?;
        let identifier_type = identifier_type.resolve()?;
        if !(1..=9).contains(&polygon_type) {
            return Err(ValidationError::PolygonTypeOutOfRange(polygon_type).into());
        }
        let (begin, end) = normalize_range(&date_start, &date_end)?;
        let frequency = frequency.resolve()?;

        let mut params = QueryParams::new();
        params.insert(identifier_type.as_param(), joined);
        params.insert("polygonType", polygon_type);
        insert_range(&mut params, begin, end);
        params.insert("frequency", frequency);
        params.insert("incZero", yes_no(include_zero));
        self.fetch("nexrad", params, Some("timeSeriesResponse"))
    }

    /// Fetches several time series aligned on shared timestamps.
    #[builder]
    pub fn get_synchronize(
        &self,
        time_series_names: &[&str],
        #[builder(into)] date_start: DateInput,
        #[builder(into)] date_end: DateInput,
        #[builder(into)] requested_datum: Option<Choice<Datum>>,
    ) -> Result<SynchronizeResponse, DbHydroError> {
        let joined = join_identifiers("time_series_names", time_series_names)?;
        let (begin, end) = normalize_range(&date_start, &date_end)?;
        let requested_datum = requested_datum.map(|d| d.resolve()).transpose()?;

        let mut params = QueryParams::new();
        params.insert("timeseries", joined);
        insert_range(&mut params, begin, end);
        params.insert_opt("requestedDatum", requested_datum);
        self.fetch("synchronize", params, None)
    }

    /// Searches water quality samples.
    ///
    /// At least one of `project_code`, `test_number` and `station` is required. A date range
    /// is optional, but `date_start` and `date_end` must be given together.
    #[builder]
    pub fn get_water_quality(
        &self,
        #[builder(into)] project_code: Option<String>,
        test_number: Option<i64>,
        #[builder(into)] station: Option<String>,
        #[builder(into)] date_start: Option<DateInput>,
        #[builder(into)] date_end: Option<DateInput>,
        #[builder(default)] exclude_flagged_results: bool,
    ) -> Result<WaterQualityResponse, DbHydroError> {
        let project_code = project_code.filter(|c| !c.trim().is_empty());
        let station = station.filter(|s| !s.trim().is_empty());
        if project_code.is_none() && test_number.is_none() && station.is_none() {
            return Err(ValidationError::MissingSearchParameter.into());
        }
        let range = match (&date_start, &date_end) {
            (Some(start), Some(end)) => Some(normalize_range(start, end)?),
            (None, None) => None,
            _ => return Err(ValidationError::UnpairedDates.into()),
        };

        let mut params = QueryParams::new();
        params.insert_opt("projectCode", project_code);
        params.insert_opt("testNumber", test_number);
        params.insert_opt("station", station);
        if let Some((begin, end)) = range {
            insert_range(&mut params, begin, end);
        }
        if exclude_flagged_results {
            params.insert("excludeFlaggedResults", yes_no(true));
        }
        self.fetch("waterquality", params, None)
    }

    /// Fetches the dates bounding a station's data.
    #[builder]
    pub fn get_period_of_record(&self, station_id: &str) -> Result<PeriodOfRecord, DbHydroError> {
        require_identifier("station_id", station_id)?;

        let mut params = QueryParams::new();
        params.insert("stationId", station_id);
        self.fetch("por", params, Some("periodOfRecord"))
    }

    /// Evaluates a computed time series at a single timestamp.
    #[builder]
    pub fn get_time_series_arithmetic(
        &self,
        id: &str,
        #[builder(into)] timestamp: DateInput,
    ) -> Result<PointResponse, DbHydroError> {
        require_identifier("id", id)?;
        let timestamp = timestamp.normalize()?;

        let mut params = QueryParams::new();
        params.insert("id", id);
        params.insert("timestamp", timestamp);
        self.fetch("tsarithmetic", params, Some("pointResponse"))
    }
}

fn insert_range(params: &mut QueryParams, begin: ApiDateTime, end: ApiDateTime) {
    params.insert("beginDateTime", begin);
    params.insert("endDateTime", end);
}

fn insert_calculation(params: &mut QueryParams, calculation: CalculationParams) {
    params.insert_opt("calculation", calculation.calculation);
    params.insert_opt("timespanUnit", calculation.timespan_unit);
    params.insert("timespanValue", calculation.timespan_value);
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Y"
    } else {
        "N"
    }
}

/// Turns a raw adapter response into the payload, or the error it represents.
///
/// API-level status blocks are checked before the HTTP status, since the service reports
/// some failures with a status block inside an HTTP 200.
fn check_response(response: RawResponse) -> Result<Value, DbHydroError> {
    if response.is_transport_failure() {
        return Err(ApiError::transport(response.message).into());
    }
    if let Some(error) = api_status_error(&response.data, response.status_code) {
        warn!("Service reported an error: {}", error);
        return Err(error.into());
    }
    if !response.is_success() {
        return Err(ApiError::http_status(response.status_code).into());
    }
    Ok(response.data)
}

/// Looks for a failing `status` block at the top level or inside a response wrapper.
fn api_status_error(data: &Value, http_status: u16) -> Option<ApiError> {
    let fields = data.as_object()?;
    let candidates = fields
        .get("status")
        .into_iter()
        .chain(fields.values().filter_map(|v| v.get("status")));

    candidates.filter_map(Value::as_object).find_map(|status| {
        let code = status.get("statusCode").and_then(Value::as_i64);
        let message = status
            .get("statusMessage")
            .and_then(Value::as_str)
            .unwrap_or_default();
        // A code of 0 means "not set", not failure.
        let failed_code = code.is_some_and(|c| c != 0 && !(200..300).contains(&c));
        if !failed_code && !message.to_lowercase().contains("error") {
            return None;
        }
        Some(ApiError {
            message: format!("API request failed: {message}"),
            http_status_code: Some(http_status),
            api_status_code: code,
            api_status_message: Some(message.to_string()),
            elapsed_time: status.get("elapsedTime").and_then(Value::as_f64),
        })
    })
}

/// Picks the part of the payload a model is parsed from.
///
/// A missing or `null` wrapper yields an empty object, which parses into an empty model.
fn extract_payload(endpoint: &str, data: Value, wrapper: Option<&str>) -> Result<Value, DbHydroError> {
    let unexpected = |found: &Value| DbHydroError::UnexpectedPayload {
        endpoint: endpoint.to_string(),
        found: json_kind(found).to_string(),
    };
    match (data, wrapper) {
        (Value::Object(mut fields), Some(wrapper)) => {
            match fields.remove(wrapper) {
                None | Some(Value::Null) => Ok(Value::Object(Map::new())),
                Some(payload) => Ok(payload),
            }
        }
        (data @ Value::Object(_), None) => Ok(data),
        (data @ Value::Array(_), None) => Ok(data),
        (other, _) => Err(unexpected(&other)),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
