use super::{weather_codes, DependentSource};
use crate::error::LookupError;
use crate::model::{Forecast, GeoPoint, Measurement, Query, Units, WeatherCandidate};
use crate::transport::JsonTransport;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;

const CURRENT_FIELDS: &str = "temperature_2m,is_day,precipitation,cloud_cover,wind_speed_10m,\
wind_direction_10m,surface_pressure,wind_gusts_10m,weather_code";

#[derive(Debug, Clone)]
pub struct OpenMeteoConfig {
    pub geocoding_url: Url,
    pub forecast_url: Url,
    pub result_count: u32,
    pub language: String,
    pub units: Units,
}

/// Geocoding (stage 1) and current-conditions forecast (stage 2) against Open-Meteo.
pub struct OpenMeteoSource {
    transport: Arc<dyn JsonTransport>,
    cfg: OpenMeteoConfig,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    // Open-Meteo omits the key entirely when nothing matches.
    #[serde(default)]
    results: Vec<GeocodingHit>,
}

#[derive(Debug, Deserialize)]
struct GeocodingHit {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    current: Option<CurrentValues>,
    #[serde(default)]
    current_units: Option<CurrentUnits>,
}

#[derive(Debug, Deserialize)]
struct CurrentValues {
    time: String,
    temperature_2m: f64,
    is_day: u8,
    precipitation: f64,
    cloud_cover: f64,
    wind_speed_10m: f64,
    wind_direction_10m: f64,
    surface_pressure: f64,
    wind_gusts_10m: f64,
    weather_code: u16,
}

#[derive(Debug, Deserialize)]
struct CurrentUnits {
    temperature_2m: String,
    precipitation: String,
    cloud_cover: String,
    wind_speed_10m: String,
    wind_direction_10m: String,
    surface_pressure: String,
    wind_gusts_10m: String,
}

impl OpenMeteoSource {
    pub fn new(transport: Arc<dyn JsonTransport>, cfg: OpenMeteoConfig) -> Self {
        Self { transport, cfg }
    }

    fn geocoding_url(&self, query: &Query) -> Url {
        let mut url = self.cfg.geocoding_url.clone();
        url.query_pairs_mut()
            .append_pair("name", &query.primary)
            .append_pair("count", &self.cfg.result_count.to_string())
            .append_pair("language", &self.cfg.language)
            .append_pair("format", "json");
        url
    }

    fn forecast_url(&self, point: &GeoPoint) -> Url {
        let units = self.cfg.units;
        let mut url = self.cfg.forecast_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &point.latitude.to_string())
            .append_pair("longitude", &point.longitude.to_string())
            .append_pair("current", CURRENT_FIELDS)
            .append_pair("timezone", "auto")
            .append_pair("forecast_days", "1")
            .append_pair("wind_speed_unit", units.wind_speed.as_query_str())
            .append_pair("temperature_unit", units.temperature.as_query_str())
            .append_pair("precipitation_unit", units.precipitation.as_query_str());
        url
    }
}

fn candidate_from_hit(hit: GeocodingHit) -> WeatherCandidate {
    WeatherCandidate::new(
        hit.name,
        hit.admin1.unwrap_or_default(),
        GeoPoint {
            latitude: hit.latitude,
            longitude: hit.longitude,
            country: hit.country,
            timezone: hit.timezone,
        },
    )
}

fn forecast_from_response(
    candidate: &WeatherCandidate,
    resp: ForecastResponse,
) -> Result<Forecast, LookupError> {
    let current = resp
        .current
        .ok_or_else(|| LookupError::Parse("response has no current conditions".into()))?;
    let units = resp
        .current_units
        .ok_or_else(|| LookupError::Parse("response has no current units".into()))?;

    let m = |value: f64, unit: String| Measurement { value, unit };

    Ok(Forecast {
        location: candidate.label.clone(),
        region: candidate.disambiguator.clone(),
        country: candidate.payload.country.clone(),
        latitude: candidate.payload.latitude,
        longitude: candidate.payload.longitude,
        timezone: resp
            .timezone
            .or_else(|| candidate.payload.timezone.clone())
            .unwrap_or_else(|| "GMT".into()),
        observed_at: current.time,
        fetched_at_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        temperature: m(current.temperature_2m, units.temperature_2m),
        weather_code: current.weather_code,
        conditions: weather_codes::description(current.weather_code),
        is_day: current.is_day != 0,
        cloud_cover: m(current.cloud_cover, units.cloud_cover),
        precipitation: m(current.precipitation, units.precipitation),
        surface_pressure: m(current.surface_pressure, units.surface_pressure),
        wind_speed: m(current.wind_speed_10m, units.wind_speed_10m),
        wind_direction: m(current.wind_direction_10m, units.wind_direction_10m),
        wind_gusts: m(current.wind_gusts_10m, units.wind_gusts_10m),
    })
}

#[async_trait]
impl DependentSource for OpenMeteoSource {
    type Payload = GeoPoint;
    type Detail = Forecast;

    async fn resolve(&self, query: &Query) -> Result<Vec<WeatherCandidate>, LookupError> {
        let reply = self.transport.get_json(self.geocoding_url(query)).await?;
        let parsed: GeocodingResponse = reply.decode()?;
        tracing::debug!(hits = parsed.results.len(), query = %query, "geocoding reply");
        Ok(parsed.results.into_iter().map(candidate_from_hit).collect())
    }

    async fn fetch_detail(&self, candidate: &WeatherCandidate) -> Result<Forecast, LookupError> {
        let reply = self
            .transport
            .get_json(self.forecast_url(&candidate.payload))
            .await?;
        let parsed: ForecastResponse = reply.decode()?;
        forecast_from_response(candidate, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TemperatureUnit, WindSpeedUnit};
    use crate::transport::{HttpReply, TransportError};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies in order and records every requested URL.
    struct CannedTransport {
        replies: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
        seen: Mutex<Vec<Url>>,
    }

    impl CannedTransport {
        fn new(replies: Vec<Result<HttpReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl JsonTransport for CannedTransport {
        async fn get_json(&self, url: Url) -> Result<HttpReply, TransportError> {
            self.seen.lock().unwrap().push(url);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extra request")
        }
    }

    fn ok(body: &str) -> Result<HttpReply, TransportError> {
        Ok(HttpReply {
            status: 200,
            body: body.to_string(),
        })
    }

    fn source(transport: Arc<CannedTransport>, units: Units) -> OpenMeteoSource {
        OpenMeteoSource::new(
            transport,
            OpenMeteoConfig {
                geocoding_url: Url::parse("https://geo.test/v1/search").unwrap(),
                forecast_url: Url::parse("https://wx.test/v1/forecast").unwrap(),
                result_count: 10,
                language: "en".into(),
                units,
            },
        )
    }

    const GEOCODING_BODY: &str = r#"{
        "results": [
            {"id": 1, "name": "Springfield", "latitude": 39.80, "longitude": -89.64,
             "country": "United States", "admin1": "Illinois", "timezone": "America/Chicago"},
            {"id": 2, "name": "Springfield", "latitude": 37.21, "longitude": -93.29,
             "country": "United States", "admin1": "Missouri"},
            {"id": 3, "name": "Springfield", "latitude": -43.33, "longitude": 171.92,
             "country": "New Zealand"}
        ],
        "generationtime_ms": 0.7
    }"#;

    const FORECAST_BODY: &str = r#"{
        "latitude": 39.8, "longitude": -89.64, "timezone": "America/Chicago",
        "current_units": {"time": "iso8601", "interval": "seconds", "temperature_2m": "°F",
            "is_day": "", "precipitation": "inch", "cloud_cover": "%", "wind_speed_10m": "mp/h",
            "wind_direction_10m": "°", "surface_pressure": "hPa", "wind_gusts_10m": "mp/h",
            "weather_code": "wmo code"},
        "current": {"time": "2024-05-01T14:45", "interval": 900, "temperature_2m": 71.4,
            "is_day": 1, "precipitation": 0.0, "cloud_cover": 100, "wind_speed_10m": 9.8,
            "wind_direction_10m": 205, "surface_pressure": 990.1, "wind_gusts_10m": 21.3,
            "weather_code": 3}
    }"#;

    #[tokio::test]
    async fn resolve_maps_hits_in_source_order() {
        let t = CannedTransport::new(vec![ok(GEOCODING_BODY)]);
        let src = source(t.clone(), Units::default());

        let got = src
            .resolve(&Query::new("Springfield", "Illinois"))
            .await
            .unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].disambiguator, "Illinois");
        assert_eq!(got[1].disambiguator, "Missouri");
        // Missing admin1 becomes an empty region.
        assert_eq!(got[2].disambiguator, "");
        assert_eq!(got[2].payload.country.as_deref(), Some("New Zealand"));

        let url = t.seen.lock().unwrap()[0].clone();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("name".into(), "Springfield".into())));
        assert!(pairs.contains(&("count".into(), "10".into())));
        assert!(pairs.contains(&("format".into(), "json".into())));
    }

    #[tokio::test]
    async fn resolve_without_results_key_is_empty() {
        let t = CannedTransport::new(vec![ok(r#"{"generationtime_ms": 0.3}"#)]);
        let got = source(t, Units::default())
            .resolve(&Query::new("Nowhereville", ""))
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn resolve_surfaces_http_status() {
        let t = CannedTransport::new(vec![Ok(HttpReply {
            status: 400,
            body: r#"{"error": true, "reason": "Parameter count must be between 1 and 100."}"#
                .into(),
        })]);
        let err = source(t, Units::default())
            .resolve(&Query::new("Springfield", ""))
            .await
            .unwrap_err();
        assert_eq!(err, LookupError::Http(400));
    }

    #[tokio::test]
    async fn query_text_is_url_encoded() {
        let t = CannedTransport::new(vec![ok("{}")]);
        source(t.clone(), Units::default())
            .resolve(&Query::new("Saint-Pierre & Miquelon", ""))
            .await
            .unwrap();
        let url = t.seen.lock().unwrap()[0].to_string();
        assert!(url.contains("name=Saint-Pierre+%26+Miquelon"), "{url}");
    }

    #[tokio::test]
    async fn fetch_detail_builds_forecast() {
        let t = CannedTransport::new(vec![ok(FORECAST_BODY)]);
        let units = Units {
            temperature: TemperatureUnit::Celsius,
            wind_speed: WindSpeedUnit::Kmh,
            ..Units::default()
        };
        let src = source(t.clone(), units);
        let candidate = WeatherCandidate::new(
            "Springfield",
            "Illinois",
            GeoPoint {
                latitude: 39.8,
                longitude: -89.64,
                country: Some("United States".into()),
                timezone: None,
            },
        );

        let f = src.fetch_detail(&candidate).await.unwrap();
        assert_eq!(f.location, "Springfield");
        assert_eq!(f.region, "Illinois");
        assert_eq!(f.conditions, "Overcast");
        assert_eq!(f.temperature.to_string(), "71.4°F");
        assert_eq!(f.cloud_cover.to_string(), "100%");
        assert_eq!(f.timezone, "America/Chicago");
        assert!(f.is_day);

        let url = t.seen.lock().unwrap()[0].clone();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("latitude".into(), "39.8".into())));
        assert!(pairs.contains(&("temperature_unit".into(), "celsius".into())));
        assert!(pairs.contains(&("wind_speed_unit".into(), "kmh".into())));
        assert!(pairs.contains(&("precipitation_unit".into(), "inch".into())));
        assert!(pairs.contains(&("forecast_days".into(), "1".into())));
    }

    #[tokio::test]
    async fn fetch_detail_without_current_block_is_parse_error() {
        let t = CannedTransport::new(vec![ok(r#"{"latitude": 1.0, "longitude": 2.0}"#)]);
        let candidate = WeatherCandidate::new(
            "X",
            "",
            GeoPoint {
                latitude: 1.0,
                longitude: 2.0,
                country: None,
                timezone: None,
            },
        );
        let err = source(t, Units::default())
            .fetch_detail(&candidate)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::Parse(_)));
    }
}
