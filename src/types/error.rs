use thiserror::Error;

/// Raised while checking request parameters, before anything is sent upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The '{parameter}' list cannot be empty")]
    EmptyList { parameter: &'static str },

    #[error("Invalid {parameter}: '{value}'. Each value must be a non-empty string")]
    BlankIdentifier {
        parameter: &'static str,
        value: String,
    },

    #[error(
        "Invalid date format: '{value}'. Expected 'YYYY-MM-DD', 'YYYY-MM-DD HH:MM', \
         'YYYY-MM-DDTHH:MM', 'YYYY-MM-DDHH:MM', 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD HH:MM:SS:SSS'"
    )]
    InvalidDate { value: String },

    #[error("The 'date_start' ({start}) must be earlier or equal to 'date_end' ({end})")]
    DateRangeReversed { start: String, end: String },

    #[error("Invalid {parameter}: '{value}'. Must be one of: {}", .allowed.join(", "))]
    InvalidOption {
        parameter: &'static str,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("If 'calculation' is provided, 'timespan_unit' must also be provided")]
    MissingTimespanUnit,

    #[error("If 'calculation' is None, 'timespan_unit' must also be None")]
    TimespanUnitWithoutCalculation,

    #[error("Invalid timespan_value: {0}. Must be a positive integer")]
    InvalidTimespanValue(u32),

    #[error("Invalid polygon_type: {0}. Must be an integer between 1 and 9 inclusive")]
    PolygonTypeOutOfRange(u8),

    #[error("At least one search parameter is required: project_code, test_number, or station")]
    MissingSearchParameter,

    #[error("Both date_start and date_end must be provided together")]
    UnpairedDates,
}
