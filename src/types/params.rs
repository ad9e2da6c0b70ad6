//! Enumerated request parameters and the checks shared by the endpoint methods.

use crate::types::error::ValidationError;
use std::fmt;
use std::str::FromStr;

/// A fixed set of values the data service accepts for one query parameter.
pub trait ApiParam: Copy + PartialEq + fmt::Debug + 'static {
    /// Name of the parameter as the caller knows it, used in error messages.
    const PARAMETER: &'static str;

    /// Every accepted value, in declaration order.
    fn all() -> &'static [Self];

    /// The literal sent upstream.
    fn as_param(&self) -> &'static str;
}

/// A parameter value that is either already typed or still raw text from the caller.
///
/// Endpoint builders accept both, so `"MEAN"` and `Calculation::Mean` are interchangeable.
/// Raw text is checked before any request is made.
#[derive(Debug, Clone, PartialEq)]
pub enum Choice<T> {
    Known(T),
    Raw(String),
}

impl<T: ApiParam + FromStr<Err = ValidationError>> Choice<T> {
    pub fn resolve(&self) -> Result<T, ValidationError> {
        match self {
            Choice::Known(value) => Ok(*value),
            Choice::Raw(raw) => raw.parse(),
        }
    }

    /// Resolves and then checks the value against a narrower set than the type allows.
    pub fn resolve_within(&self, allowed: &[T]) -> Result<T, ValidationError> {
        let value = self.resolve()?;
        if allowed.contains(&value) {
            Ok(value)
        } else {
            Err(invalid_option::<T>(value.as_param(), allowed))
        }
    }
}

impl<T> From<&str> for Choice<T> {
    fn from(value: &str) -> Self {
        Choice::Raw(value.to_string())
    }
}

impl<T> From<String> for Choice<T> {
    fn from(value: String) -> Self {
        Choice::Raw(value)
    }
}

fn invalid_option<T: ApiParam>(value: &str, allowed: &[T]) -> ValidationError {
    ValidationError::InvalidOption {
        parameter: T::PARAMETER,
        value: value.to_string(),
        allowed: allowed.iter().map(|v| v.as_param()).collect(),
    }
}

macro_rules! api_param {
    (
        $(#[$meta:meta])*
        $name:ident, $parameter:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl ApiParam for $name {
            const PARAMETER: &'static str = $parameter;

            fn all() -> &'static [Self] {
                &[$( $name::$variant ),+]
            }

            fn as_param(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::all()
                    .iter()
                    .find(|v| v.as_param() == s)
                    .copied()
                    .ok_or_else(|| invalid_option::<Self>(s, Self::all()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_param())
            }
        }

        impl From<$name> for Choice<$name> {
            fn from(value: $name) -> Self {
                Choice::Known(value)
            }
        }
    };
}

api_param! {
    /// Statistic computed over each timespan.
    Calculation, "calculation" {
        Mean => "MEAN",
        Max => "MAX",
        Min => "MIN",
        Sum => "SUM",
        /// Only accepted by the aggregate endpoint.
        Median => "MEDI",
    }
}

impl Calculation {
    /// Calculations the `timeseries` endpoint supports.
    pub const TIME_SERIES: &'static [Calculation] = &[
        Calculation::Mean,
        Calculation::Max,
        Calculation::Min,
        Calculation::Sum,
    ];
}

api_param! {
    TimespanUnit, "timespan_unit" {
        Year => "YEAR",
        Month => "MONTH",
        Week => "WEEK",
        Day => "DAY",
        Hour => "HOUR",
        Minute => "MINUTE",
        Second => "SECOND",
    }
}

api_param! {
    /// How the identifiers passed to the daily data endpoint are interpreted.
    /// The wire value doubles as the query parameter name.
    DailyIdentifierType, "identifier_type" {
        Timeseries => "timeseries",
        Station => "station",
        Id => "id",
    }
}

api_param! {
    RealTimeIdentifierType, "identifier_type" {
        Sites => "sites",
        Timeseries => "timeseries",
    }
}

api_param! {
    PolygonIdentifierType, "identifier_type" {
        PolygonId => "polygonId",
        PolygonName => "polygonName",
    }
}

api_param! {
    /// Vertical reference for elevation values.
    Datum, "requested_datum" {
        Ngvd29 => "NGVD29",
        Navd88 => "NAVD88",
    }
}

api_param! {
    /// Aggregation period for NEXRAD rainfall.
    NexradFrequency, "frequency" {
        /// Only available for polygon requests.
        FifteenMinutes => "15",
        Hourly => "H",
        Daily => "D",
        Monthly => "M",
        Yearly => "Y",
        Entire => "E",
    }
}

impl NexradFrequency {
    pub const PIXEL: &'static [NexradFrequency] = &[
        NexradFrequency::Hourly,
        NexradFrequency::Daily,
        NexradFrequency::Monthly,
        NexradFrequency::Yearly,
        NexradFrequency::Entire,
    ];
}

/// Checks a list of identifiers and joins it the way the service expects.
pub(crate) fn join_identifiers(
    parameter: &'static str,
    identifiers: &[&str],
) -> Result<String, ValidationError> {
    if identifiers.is_empty() {
        return Err(ValidationError::EmptyList { parameter });
    }
    for identifier in identifiers {
        require_identifier(parameter, identifier)?;
    }
    Ok(identifiers.join(","))
}

pub(crate) fn require_identifier(
    parameter: &'static str,
    identifier: &str,
) -> Result<(), ValidationError> {
    if identifier.trim().is_empty() {
        return Err(ValidationError::BlankIdentifier {
            parameter,
            value: identifier.to_string(),
        });
    }
    Ok(())
}

/// Validated statistic settings for the time series and aggregate endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CalculationParams {
    pub calculation: Option<Calculation>,
    pub timespan_unit: Option<TimespanUnit>,
    pub timespan_value: u32,
}

impl CalculationParams {
    /// A calculation and a timespan unit must be given together, and the timespan
    /// value must be positive.
    pub(crate) fn validate(
        calculation: Option<&Choice<Calculation>>,
        timespan_unit: Option<&Choice<TimespanUnit>>,
        timespan_value: u32,
        allowed: &[Calculation],
    ) -> Result<Self, ValidationError> {
        let (calculation, timespan_unit) = match (calculation, timespan_unit) {
            (None, Some(_)) => return Err(ValidationError::TimespanUnitWithoutCalculation),
            (None, None) => (None, None),
            (Some(calculation), unit) => {
                let calculation = calculation.resolve_within(allowed)?;
                let unit = unit
                    .ok_or(ValidationError::MissingTimespanUnit)?
                    .resolve()?;
                (Some(calculation), Some(unit))
            }
        };
        if timespan_value == 0 {
            return Err(ValidationError::InvalidTimespanValue(timespan_value));
        }
        Ok(Self {
            calculation,
            timespan_unit,
            timespan_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_wire_values() {
        for calculation in Calculation::all() {
            assert_eq!(calculation.as_param().parse::<Calculation>(), Ok(*calculation));
        }
        assert_eq!(
            "polygonName".parse::<PolygonIdentifierType>(),
            Ok(PolygonIdentifierType::PolygonName)
        );
        assert_eq!(
            "15".parse::<NexradFrequency>(),
            Ok(NexradFrequency::FifteenMinutes)
        );
        assert_eq!(Datum::Navd88.to_string(), "NAVD88");
    }

    #[test]
    fn test_invalid_option_names_allowed_set() {
        let err = "BOGUS".parse::<Calculation>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidOption {
                parameter: "calculation",
                value: "BOGUS".to_string(),
                allowed: vec!["MEAN", "MAX", "MIN", "SUM", "MEDI"],
            }
        );
        assert_eq!(
            err.to_string(),
            "Invalid calculation: 'BOGUS'. Must be one of: MEAN, MAX, MIN, SUM, MEDI"
        );
    }

    #[test]
    fn test_parsing_is_case_sensitive() {
        assert!("mean".parse::<Calculation>().is_err());
        assert!("Station".parse::<DailyIdentifierType>().is_err());
    }

    #[test]
    fn test_choice_resolve_within_subset() {
        let median: Choice<Calculation> = Calculation::Median.into();
        let err = median.resolve_within(Calculation::TIME_SERIES).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidOption {
                parameter: "calculation",
                value: "MEDI".to_string(),
                allowed: vec!["MEAN", "MAX", "MIN", "SUM"],
            }
        );

        let raw: Choice<NexradFrequency> = "15".into();
        assert!(raw.resolve().is_ok());
        assert!(raw.resolve_within(NexradFrequency::PIXEL).is_err());

        let raw: Choice<NexradFrequency> = "D".into();
        assert_eq!(
            raw.resolve_within(NexradFrequency::PIXEL),
            Ok(NexradFrequency::Daily)
        );
    }

    #[test]
    fn test_join_identifiers() {
        assert_eq!(join_identifiers("site_ids", &["S79-E", "S80"]), Ok("S79-E,S80".to_string()));
        assert_eq!(
            join_identifiers("site_ids", &[]),
            Err(ValidationError::EmptyList { parameter: "site_ids" })
        );
        assert_eq!(
            join_identifiers("site_ids", &["S79-E", "  "]),
            Err(ValidationError::BlankIdentifier {
                parameter: "site_ids",
                value: "  ".to_string()
            })
        );
    }

    #[test]
    fn test_calculation_pairing() {
        let mean: Choice<Calculation> = Calculation::Mean.into();
        let day: Choice<TimespanUnit> = TimespanUnit::Day.into();
        let all = Calculation::all();

        let params = CalculationParams::validate(Some(&mean), Some(&day), 1, all).unwrap();
        assert_eq!(params.calculation, Some(Calculation::Mean));
        assert_eq!(params.timespan_unit, Some(TimespanUnit::Day));

        let none = CalculationParams::validate(None, None, 1, all).unwrap();
        assert_eq!(none.calculation, None);

        assert_eq!(
            CalculationParams::validate(Some(&mean), None, 1, all),
            Err(ValidationError::MissingTimespanUnit)
        );
        assert_eq!(
            CalculationParams::validate(None, Some(&day), 1, all),
            Err(ValidationError::TimespanUnitWithoutCalculation)
        );
        assert_eq!(
            CalculationParams::validate(Some(&mean), Some(&day), 0, all),
            Err(ValidationError::InvalidTimespanValue(0))
        );

        let fortnight: Choice<TimespanUnit> = "FORTNIGHT".into();
        assert!(matches!(
            CalculationParams::validate(Some(&mean), Some(&fortnight), 1, all),
            Err(ValidationError::InvalidOption { parameter: "timespan_unit", .. })
        ));
    }
}
