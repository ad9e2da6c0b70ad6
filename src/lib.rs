mod dbhydro;
mod error;
mod models;
mod rest_adapters;
mod types;
mod utils;

pub use dbhydro::*;
pub use error::{ApiError, DbHydroError};

pub use models::aggregate::*;
pub use models::interpolate::*;
pub use models::point::*;
pub use models::synchronize::*;
pub use models::time_series::*;
pub use models::water_quality::*;
pub use models::{ResponseModel, Status};

pub use rest_adapters::reqwest_adapter::{default_user_agent, ReqwestAdapter, DEFAULT_TIMEOUT};
pub use rest_adapters::{QueryParams, RawResponse, RestAdapter};

pub use types::api_datetime::{normalize_range, ApiDateTime, DateInput, API_DATETIME_FORMAT};
pub use types::error::ValidationError;
pub use types::params::{
    ApiParam, Calculation, Choice, DailyIdentifierType, Datum, NexradFrequency,
    PolygonIdentifierType, RealTimeIdentifierType, TimespanUnit,
};
