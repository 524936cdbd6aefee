use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize, de};
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::ForecastError,
    fetcher::DEFAULT_BASE_URL,
    model::{ExtraValue, ForecastRequest},
};

const TIMEZONE_KEY: &str = "timezone";

/// Settings read from the config file.
///
/// Example TOML:
/// ```toml
/// latitude = 52.23
/// longitude = 21.01
/// hourly = ["temperature_2m", "precipitation"]
///
/// [extras]
/// timezone = "Europe/Warsaw"
/// forecast_days = 3
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub latitude: f64,
    pub longitude: f64,

    /// Either a list of field names, or the legacy `options_hourly` table of
    /// field name to `1`/`0` flags.
    #[serde(alias = "options_hourly")]
    pub hourly: HourlyFields,

    #[serde(default = "default_models")]
    pub models: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    #[serde(default = "default_decimal_places", alias = "decimal_places_in_the_table")]
    pub decimal_places: usize,

    /// Extra query parameters; must contain `timezone`.
    #[serde(default)]
    pub extras: BTreeMap<String, ExtraValue>,

    /// Where snapshots live. Relative paths resolve against the config file.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_models() -> String {
    "best_match".to_string()
}

fn default_timeout() -> f64 {
    10.0
}

fn default_decimal_places() -> usize {
    2
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Config {
    /// Load config from `path`. TOML unless the file name ends in `.json`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ForecastError::Config(format!(
                "configuration file '{}' not found",
                path.display()
            ))
            .into());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let cfg: Config = if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        };

        Ok(cfg)
    }

    /// Path to the default config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Snapshot directory, given the file this config was loaded from.
    pub fn backup_dir(&self, config_path: &Path) -> Result<PathBuf> {
        match &self.backup_dir {
            Some(dir) if dir.is_absolute() => Ok(dir.clone()),
            Some(dir) => {
                let base = config_path.parent().unwrap_or_else(|| Path::new(""));
                Ok(base.join(dir))
            }
            None => Ok(project_dirs()?.data_dir().join("backups")),
        }
    }

    pub fn timezone(&self) -> Option<String> {
        self.extras.get(TIMEZONE_KEY).map(ExtraValue::to_string)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ForecastError::Config(format!(
                "latitude {} is outside -90..=90",
                self.latitude
            )));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ForecastError::Config(format!(
                "longitude {} is outside -180..=180",
                self.longitude
            )));
        }
        if self.hourly.is_empty() {
            return Err(ForecastError::Config("no hourly fields selected".into()));
        }
        self.timeout_duration()?;

        match self.timezone() {
            Some(tz) if is_valid_timezone(&tz) => Ok(()),
            Some(tz) => Err(ForecastError::Timezone(tz)),
            None => Err(ForecastError::Timezone(String::new())),
        }
    }

    fn timeout_duration(&self) -> Result<Duration, ForecastError> {
        let invalid = || {
            ForecastError::Config(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout
            ))
        };
        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(invalid());
        }
        Duration::try_from_secs_f64(self.timeout).map_err(|_| invalid())
    }

    /// Validated, immutable request for this run.
    pub fn to_request(&self) -> Result<ForecastRequest, ForecastError> {
        self.validate()?;

        Ok(ForecastRequest {
            latitude: self.latitude,
            longitude: self.longitude,
            hourly: self.hourly.0.clone(),
            models: self.models.clone(),
            timezone: self.timezone().unwrap_or_default(),
            extras: self.extras.clone(),
            timeout: self.timeout_duration()?,
        })
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "terminal-weather", "forecast")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

/// `auto`, `GMT`, `UTC`, or an `Area/Location[/Sub]` name.
pub fn is_valid_timezone(name: &str) -> bool {
    if matches!(name, "auto" | "GMT" | "UTC") {
        return true;
    }

    let segments: Vec<&str> = name.split('/').collect();
    segments.len() >= 2
        && segments.iter().all(|seg| {
            seg.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                && seg.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
        })
}

/// Requested hourly field names, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HourlyFields(pub Vec<String>);

impl HourlyFields {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Flag {
    fn enabled(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Int(i) => *i == 1,
            Flag::Float(f) => *f == 1.0,
            Flag::Text(s) => s.trim() == "1",
        }
    }
}

impl<'de> Deserialize<'de> for HourlyFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> de::Visitor<'de> for FieldsVisitor {
            type Value = HourlyFields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of field names or a table of field flags")
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some(field) = seq.next_element::<String>()? {
                    fields.push(field);
                }
                Ok(HourlyFields(fields))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::new();
                while let Some((field, flag)) = map.next_entry::<String, Flag>()? {
                    if flag.enabled() {
                        fields.push(field);
                    }
                }
                Ok(HourlyFields(fields))
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}
