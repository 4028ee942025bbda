//! Layered settings: built-in defaults, then an optional TOML file, then CLI flags
//! (which clap also fills from `FORECAST_*` environment variables).

use crate::model::{PrecipitationUnit, TemperatureUnit, Units, WindSpeedUnit};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub geocoding_url: String,
    pub forecast_url: String,
    pub result_count: u32,
    pub language: String,
    pub units: Units,
    pub bearer_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geocoding_url: DEFAULT_GEOCODING_URL.into(),
            forecast_url: DEFAULT_FORECAST_URL.into(),
            result_count: 10,
            language: "en".into(),
            units: Units::default(),
            bearer_token: None,
        }
    }
}

/// Shape of `config.toml`, also used for command-line overrides. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileSettings {
    pub geocoding_url: Option<String>,
    pub forecast_url: Option<String>,
    pub result_count: Option<u32>,
    pub language: Option<String>,
    pub temperature_unit: Option<TemperatureUnit>,
    pub wind_speed_unit: Option<WindSpeedUnit>,
    pub precipitation_unit: Option<PrecipitationUnit>,
    pub bearer_token: Option<String>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("forecast-cli").join("config.toml"))
}

impl Settings {
    fn apply(&mut self, file: FileSettings) {
        if let Some(v) = file.geocoding_url {
            self.geocoding_url = v;
        }
        if let Some(v) = file.forecast_url {
            self.forecast_url = v;
        }
        if let Some(v) = file.result_count {
            self.result_count = v;
        }
        if let Some(v) = file.language {
            self.language = v;
        }
        if let Some(v) = file.temperature_unit {
            self.units.temperature = v;
        }
        if let Some(v) = file.wind_speed_unit {
            self.units.wind_speed = v;
        }
        if let Some(v) = file.precipitation_unit {
            self.units.precipitation = v;
        }
        if file.bearer_token.is_some() {
            self.bearer_token = file.bearer_token;
        }
    }

    fn validate(&self) -> Result<()> {
        // Open-Meteo accepts 1..=100 results per geocoding request.
        if !(1..=100).contains(&self.result_count) {
            bail!(
                "result count must be between 1 and 100 (got {})",
                self.result_count
            );
        }
        if self.language.trim().is_empty() {
            bail!("language must not be empty");
        }
        Ok(())
    }
}

fn read_file_settings(path: &Path) -> Result<FileSettings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse config file {}", path.display()))
}

/// Resolve settings from all layers.
///
/// An explicit `config_path` must exist; the default location is used only when present.
pub(crate) fn load_settings(config_path: Option<&Path>, overrides: FileSettings) -> Result<Settings> {
    let file = match config_path {
        Some(p) => Some(read_file_settings(p)?),
        None => match default_config_path() {
            Some(p) if p.is_file() => Some(read_file_settings(&p)?),
            _ => None,
        },
    };
    resolve(file, overrides)
}

fn resolve(file: Option<FileSettings>, overrides: FileSettings) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(file) = file {
        settings.apply(file);
    }
    settings.apply(overrides);
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("temp file");
        f.write_all(contents.as_bytes()).expect("write");
        f
    }

    #[test]
    fn file_values_override_defaults() {
        let f = write_config(
            r#"
            forecast_url = "http://localhost:8080/v1/forecast"
            result_count = 25
            temperature_unit = "celsius"
            precipitation_unit = "mm"
            "#,
        );
        let s = load_settings(Some(f.path()), FileSettings::default()).unwrap();
        assert_eq!(s.forecast_url, "http://localhost:8080/v1/forecast");
        assert_eq!(s.geocoding_url, DEFAULT_GEOCODING_URL);
        assert_eq!(s.result_count, 25);
        assert_eq!(s.units.temperature, TemperatureUnit::Celsius);
        assert_eq!(s.units.precipitation, PrecipitationUnit::Mm);
        assert_eq!(s.units.wind_speed, WindSpeedUnit::Mph);
    }

    #[test]
    fn flags_override_file() {
        let f = write_config("language = \"de\"\nresult_count = 5\n");
        let s = load_settings(
            Some(f.path()),
            FileSettings {
                language: Some("fr".into()),
                wind_speed_unit: Some(WindSpeedUnit::Kn),
                bearer_token: Some("secret".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(s.language, "fr");
        assert_eq!(s.result_count, 5);
        assert_eq!(s.units.wind_speed, WindSpeedUnit::Kn);
        assert_eq!(s.bearer_token.as_deref(), Some("secret"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_settings(Some(&dir.path().join("nope.toml")), FileSettings::default())
            .unwrap_err();
        assert!(format!("{err:#}").contains("read config file"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let f = write_config("geocodeing_url = \"typo\"\n");
        let err = load_settings(Some(f.path()), FileSettings::default()).unwrap_err();
        assert!(format!("{err:#}").contains("parse config file"));
    }

    #[test]
    fn result_count_is_bounded() {
        let err = resolve(
            None,
            FileSettings {
                result_count: Some(0),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("between 1 and 100"));
        assert!(resolve(None, FileSettings::default()).is_ok());
    }
}
