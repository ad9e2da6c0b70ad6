pub mod api_datetime;
pub mod error;
pub mod params;
