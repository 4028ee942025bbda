use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A submitted lookup: a place name plus an optional region to narrow it down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub primary: String,
    #[serde(default)]
    pub disambiguator: String,
}

impl Query {
    pub fn new(primary: impl Into<String>, disambiguator: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            disambiguator: disambiguator.into(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disambiguator.is_empty() {
            write!(f, "{}", self.primary)
        } else {
            write!(f, "{}, {}", self.primary, self.disambiguator)
        }
    }
}

/// A stage-1 match. The payload is opaque to the orchestrator and only consumed by stage 2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate<P> {
    pub label: String,
    pub disambiguator: String,
    pub payload: P,
}

impl<P> Candidate<P> {
    pub fn new(label: impl Into<String>, disambiguator: impl Into<String>, payload: P) -> Self {
        Self {
            label: label.into(),
            disambiguator: disambiguator.into(),
            payload,
        }
    }
}

// Candidates are identified by what the user sees, never by payload.
impl<P> PartialEq for Candidate<P> {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.disambiguator == other.disambiguator
    }
}

impl<P> Eq for Candidate<P> {}

impl<P> fmt::Display for Candidate<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disambiguator.is_empty() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{}, {}", self.label, self.disambiguator)
        }
    }
}

/// Outcome of matching a query against the stage-1 candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<P> {
    NoMatch,
    UniqueMatch(Candidate<P>),
    Ambiguous(Vec<Candidate<P>>),
}

/// Monotonic tag assigned to every submission; completions carrying an older tag are stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Coordinates of a geocoded place, plus the fields shown when choosing between places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub value: f64,
    pub unit: String,
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // "71.4°F" and "100%", but "0.2 inch" and "990.1 hPa".
        if self.unit.starts_with(char::is_alphabetic) {
            write!(f, "{} {}", self.value, self.unit)
        } else {
            write!(f, "{}{}", self.value, self.unit)
        }
    }
}

/// Current conditions for one resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: String,
    pub region: String,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    /// Local observation time as reported by the API.
    pub observed_at: String,
    pub fetched_at_utc: String,
    pub temperature: Measurement,
    pub weather_code: u16,
    pub conditions: String,
    pub is_day: bool,
    pub cloud_cover: Measurement,
    pub precipitation: Measurement,
    pub surface_pressure: Measurement,
    pub wind_speed: Measurement,
    pub wind_direction: Measurement,
    pub wind_gusts: Measurement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindSpeedUnit {
    #[default]
    Mph,
    Kmh,
    Ms,
    Kn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrecipitationUnit {
    #[default]
    Inch,
    Mm,
}

impl TemperatureUnit {
    pub fn as_query_str(self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "fahrenheit",
            TemperatureUnit::Celsius => "celsius",
        }
    }
}

impl WindSpeedUnit {
    pub fn as_query_str(self) -> &'static str {
        match self {
            WindSpeedUnit::Mph => "mph",
            WindSpeedUnit::Kmh => "kmh",
            WindSpeedUnit::Ms => "ms",
            WindSpeedUnit::Kn => "kn",
        }
    }
}

impl PrecipitationUnit {
    pub fn as_query_str(self) -> &'static str {
        match self {
            PrecipitationUnit::Inch => "inch",
            PrecipitationUnit::Mm => "mm",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Units {
    pub temperature: TemperatureUnit,
    pub wind_speed: WindSpeedUnit,
    pub precipitation: PrecipitationUnit,
}

/// Events emitted by the controller and consumed by presentation layers.
#[derive(Debug, Clone)]
pub enum PipelineEvent<P, D> {
    Resolving {
        generation: Generation,
        query: Query,
    },
    Ambiguous {
        generation: Generation,
        candidates: Vec<Candidate<P>>,
    },
    NoMatch {
        generation: Generation,
        query: Query,
    },
    Fetching {
        generation: Generation,
        candidate: Candidate<P>,
    },
    Completed {
        generation: Generation,
        // Box to keep the event small; details tend to be large.
        detail: Box<D>,
    },
    Failed {
        generation: Generation,
        error: OrchestratorError,
    },
    /// A command was refused; the running pipeline is unaffected.
    Rejected { error: OrchestratorError },
}

pub type WeatherCandidate = Candidate<GeoPoint>;
pub type WeatherEvent = PipelineEvent<GeoPoint, Forecast>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_compare_by_label_and_region_only() {
        let a = Candidate::new("Springfield", "Illinois", 1u8);
        let b = Candidate::new("Springfield", "Illinois", 2u8);
        let c = Candidate::new("Springfield", "Missouri", 1u8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_omits_empty_region() {
        assert_eq!(Query::new("Paris", "").to_string(), "Paris");
        assert_eq!(Query::new("Paris", "Texas").to_string(), "Paris, Texas");
        assert_eq!(Candidate::new("Paris", "", ()).to_string(), "Paris");
    }

    #[test]
    fn units_map_to_api_values() {
        let u = Units::default();
        assert_eq!(u.temperature.as_query_str(), "fahrenheit");
        assert_eq!(u.wind_speed.as_query_str(), "mph");
        assert_eq!(u.precipitation.as_query_str(), "inch");
        assert_eq!(WindSpeedUnit::Ms.as_query_str(), "ms");
    }
}
