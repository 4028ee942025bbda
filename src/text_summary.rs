//! Text summary builder for CLI output.
//!
//! Formats forecasts and candidate lists as human-readable lines for text mode and the TUI.

use crate::model::{Forecast, WeatherCandidate};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass name for a bearing in degrees.
pub(crate) fn compass_point(degrees: f64) -> &'static str {
    let normalized = degrees.rem_euclid(360.0);
    let idx = ((normalized / 22.5).round() as usize) % COMPASS.len();
    COMPASS[idx]
}

pub(crate) fn location_title(forecast: &Forecast) -> String {
    let mut title = forecast.location.clone();
    if !forecast.region.is_empty() {
        title.push_str(", ");
        title.push_str(&forecast.region);
    }
    if let Some(country) = forecast.country.as_deref() {
        title.push_str(&format!(" ({country})"));
    }
    title
}

/// One line per candidate, used when asking the user to choose.
pub(crate) fn describe_candidate(candidate: &WeatherCandidate) -> String {
    let p = &candidate.payload;
    let mut line = candidate.to_string();
    if let Some(country) = p.country.as_deref() {
        line.push_str(&format!(" ({country})"));
    }
    line.push_str(&format!(" [{:.2}, {:.2}]", p.latitude, p.longitude));
    line
}

pub(crate) fn build_text_summary(forecast: &Forecast) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Current Weather for {}", location_title(forecast)));
    lines.push(format!(
        "Observed: {} ({})",
        forecast.observed_at, forecast.timezone
    ));
    lines.push(format!("Temperature: {}", forecast.temperature));
    lines.push(format!("Conditions: {}", forecast.conditions));
    lines.push(format!("Cloud Cover: {}", forecast.cloud_cover));
    lines.push(format!("Precipitation: {}", forecast.precipitation));
    lines.push(format!("Pressure: {}", forecast.surface_pressure));
    lines.push(format!(
        "Wind Speed: {} from {} ({})",
        forecast.wind_speed,
        compass_point(forecast.wind_direction.value),
        forecast.wind_direction
    ));
    lines.push(format!("Wind Gusts: {}", forecast.wind_gusts));
    lines.push(format!(
        "Daylight: {}",
        if forecast.is_day { "yes" } else { "no" }
    ));

    TextSummary { lines }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{GeoPoint, Measurement};

    pub(crate) fn sample_forecast() -> Forecast {
        let m = |value: f64, unit: &str| Measurement {
            value,
            unit: unit.into(),
        };
        Forecast {
            location: "Springfield".into(),
            region: "Illinois".into(),
            country: Some("United States".into()),
            latitude: 39.8,
            longitude: -89.64,
            timezone: "America/Chicago".into(),
            observed_at: "2024-05-01T14:45".into(),
            fetched_at_utc: "2024-05-01T19:47:12Z".into(),
            temperature: m(71.4, "°F"),
            weather_code: 3,
            conditions: "Overcast".into(),
            is_day: true,
            cloud_cover: m(100.0, "%"),
            precipitation: m(0.0, "inch"),
            surface_pressure: m(990.1, "hPa"),
            wind_speed: m(9.8, "mp/h"),
            wind_direction: m(205.0, "°"),
            wind_gusts: m(21.3, "mp/h"),
        }
    }

    #[test]
    fn summary_lines() {
        let s = build_text_summary(&sample_forecast());
        assert_eq!(
            s.lines,
            vec![
                "Current Weather for Springfield, Illinois (United States)",
                "Observed: 2024-05-01T14:45 (America/Chicago)",
                "Temperature: 71.4°F",
                "Conditions: Overcast",
                "Cloud Cover: 100%",
                "Precipitation: 0 inch",
                "Pressure: 990.1 hPa",
                "Wind Speed: 9.8 mp/h from SSW (205°)",
                "Wind Gusts: 21.3 mp/h",
                "Daylight: yes",
            ]
        );
    }

    #[test]
    fn compass_wraps_around() {
        assert_eq!(compass_point(0.0), "N");
        assert_eq!(compass_point(359.0), "N");
        assert_eq!(compass_point(90.0), "E");
        assert_eq!(compass_point(-90.0), "W");
        assert_eq!(compass_point(200.0), "SSW");
    }

    #[test]
    fn candidate_line_includes_country_and_coordinates() {
        let c = WeatherCandidate::new(
            "Springfield",
            "Missouri",
            GeoPoint {
                latitude: 37.21533,
                longitude: -93.29824,
                country: Some("United States".into()),
                timezone: None,
            },
        );
        assert_eq!(
            describe_candidate(&c),
            "Springfield, Missouri (United States) [37.22, -93.30]"
        );
    }
}
