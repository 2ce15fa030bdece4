//! Episode configuration loaded from JSON and validated before `reset`.
use std::fmt;
use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::action::ActionLimits;
use crate::error::ConfigError;
use crate::inputs::{Crop, Cultivar, soil_id_for};
use crate::reward::{RewardConfig, RewardMode};

/// Longest season the observation schema can represent.
pub const MAX_SEASON_DAYS: u32 = 200;

/// Where the field is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Coordinates { latitude: f64, longitude: f64 },
    Station { id: String },
}

impl Location {
    #[must_use]
    pub const fn coordinates(latitude: f64, longitude: f64) -> Self {
        Self::Coordinates {
            latitude,
            longitude,
        }
    }

    /// Stable key used for file names and soil ids.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Coordinates {
                latitude,
                longitude,
            } => soil_id_for(*latitude, *longitude),
            Self::Station { id } => id.trim().to_ascii_uppercase(),
        }
    }

    #[must_use]
    pub const fn latitude(&self) -> Option<f64> {
        match self {
            Self::Coordinates { latitude, .. } => Some(*latitude),
            Self::Station { .. } => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinates {
                latitude,
                longitude,
            } => write!(f, "{latitude:.2},{longitude:.2}"),
            Self::Station { id } => write!(f, "station {id}"),
        }
    }
}

/// How weather and soil inputs are obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceMode {
    /// Served by a source registered on the environment.
    Download,
    /// JSON files under `local_data_dir`.
    Local,
    /// Deterministic synthetic inputs.
    #[default]
    Generated,
}

impl DataSourceMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Local => "local",
            Self::Generated => "generated",
        }
    }
}

/// Everything `reset` needs to start an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    #[serde(default)]
    pub crop: Crop,
    #[serde(default = "EpisodeConfig::default_cultivar")]
    pub cultivar: String,
    #[serde(default = "EpisodeConfig::default_location")]
    pub location: Location,
    #[serde(default = "EpisodeConfig::default_field_id")]
    pub field_id: String,
    #[serde(default = "EpisodeConfig::default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "EpisodeConfig::default_end_date")]
    pub end_date: NaiveDate,
    #[serde(default = "EpisodeConfig::default_planting_date")]
    pub planting_date: NaiveDate,
    #[serde(default)]
    pub data_source: DataSourceMode,
    #[serde(default)]
    pub local_data_dir: Option<PathBuf>,
    /// Step cap; the simulation window spans days `0..=season_length`.
    #[serde(default = "EpisodeConfig::default_season_length")]
    pub season_length: u32,
    /// Phenological stage at which the episode ends.
    #[serde(default = "EpisodeConfig::default_maturity_threshold")]
    pub maturity_threshold: f64,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub action: ActionLimits,
    #[serde(default)]
    pub simulator_timeout_ms: Option<u64>,
    #[serde(default = "EpisodeConfig::default_workspace_dir")]
    pub workspace_dir: PathBuf,
    /// Directory for per-episode CSV logs; disabled when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub seed: u64,
}

impl EpisodeConfig {
    fn default_cultivar() -> String {
        Crop::default().default_cultivar().to_string()
    }

    const fn default_location() -> Location {
        Location::coordinates(12.38, 78.93)
    }

    fn default_field_id() -> String {
        "REALTIME".to_string()
    }

    fn default_start_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default()
    }

    fn default_end_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 12, 31).unwrap_or_default()
    }

    fn default_planting_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 6, 2).unwrap_or_default()
    }

    const fn default_season_length() -> u32 {
        120
    }

    const fn default_maturity_threshold() -> f64 {
        1.0
    }

    fn default_workspace_dir() -> PathBuf {
        PathBuf::from("workspace")
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, or the first validation failure.
    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Generated-input configuration for one location, with a fixed seed.
    #[must_use]
    pub fn generated(latitude: f64, longitude: f64, seed: u64) -> Self {
        Self {
            location: Location::coordinates(latitude, longitude),
            data_source: DataSourceMode::Generated,
            seed,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_season_length(mut self, season_length: u32) -> Self {
        self.season_length = season_length;
        self
    }

    #[must_use]
    pub fn with_reward_mode(mut self, mode: RewardMode) -> Self {
        self.reward.mode = mode;
        self
    }

    /// Place the planting date on `year`/`day_of_year`, spanning the calendar year.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::RangeViolation`] when the day does not exist in that year.
    pub fn with_planting(mut self, year: i32, day_of_year: u32) -> Result<Self, ConfigError> {
        let planting = NaiveDate::from_yo_opt(year, day_of_year).ok_or(ConfigError::RangeViolation {
            field: "planting_day_of_year",
            min: 1.0,
            max: 366.0,
            value: f64::from(day_of_year),
        })?;
        self.start_date = NaiveDate::from_yo_opt(year, 1).unwrap_or(planting);
        self.end_date = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(planting);
        self.planting_date = planting;
        Ok(self)
    }

    /// Last simulated calendar date.
    #[must_use]
    pub fn season_end(&self) -> NaiveDate {
        self.planting_date + Duration::days(i64::from(self.season_length))
    }

    /// Calendar span the weather inputs must cover.
    #[must_use]
    pub fn weather_span(&self) -> (NaiveDate, NaiveDate) {
        (self.start_date, self.end_date.max(self.season_end()))
    }

    /// Resolved cultivar preset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCultivar`] when the catalog has no such entry.
    pub fn resolve_cultivar(&self) -> Result<Cultivar, ConfigError> {
        Cultivar::lookup(self.crop, &self.cultivar)
    }

    /// Soil id for the configured location.
    #[must_use]
    pub fn soil_id(&self) -> String {
        self.location.key()
    }

    /// Check every field; called by `reset` before anything else runs.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Location::Coordinates {
            latitude,
            longitude,
        } = self.location
        {
            check_range("location.latitude", latitude, -90.0, 90.0)?;
            check_range("location.longitude", longitude, -180.0, 180.0)?;
        }
        if let Location::Station { id } = &self.location
            && id.trim().is_empty()
        {
            return Err(ConfigError::Missing {
                field: "location.id",
                context: "station locations",
            });
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::DateRange {
                start: self.start_date.to_string(),
                end: self.end_date.to_string(),
            });
        }
        if self.planting_date < self.start_date || self.planting_date > self.end_date {
            return Err(ConfigError::PlantingOutsideRange {
                planting: self.planting_date.to_string(),
                start: self.start_date.to_string(),
                end: self.end_date.to_string(),
            });
        }
        if self.season_length == 0 || self.season_length > MAX_SEASON_DAYS {
            return Err(ConfigError::RangeViolation {
                field: "season_length",
                min: 1.0,
                max: f64::from(MAX_SEASON_DAYS),
                value: f64::from(self.season_length),
            });
        }
        if !(self.maturity_threshold > 0.0 && self.maturity_threshold <= 1.0) {
            return Err(ConfigError::RangeViolation {
                field: "maturity_threshold",
                min: 0.0,
                max: 1.0,
                value: self.maturity_threshold,
            });
        }
        match (self.data_source, &self.location) {
            (DataSourceMode::Local, _) if self.local_data_dir.is_none() => {
                return Err(ConfigError::Missing {
                    field: "local_data_dir",
                    context: "local data source",
                });
            }
            (DataSourceMode::Generated, Location::Station { .. }) => {
                return Err(ConfigError::Missing {
                    field: "location.coordinates",
                    context: "generated data source",
                });
            }
            _ => {}
        }
        if self.simulator_timeout_ms == Some(0) {
            return Err(ConfigError::MinViolation {
                field: "simulator_timeout_ms",
                min: 1.0,
                value: 0.0,
            });
        }
        self.resolve_cultivar()?;
        self.action.validate()?;
        self.reward.validate()
    }

    /// Calendar year of the planting date.
    #[must_use]
    pub fn planting_year(&self) -> i32 {
        self.planting_date.year()
    }
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            crop: Crop::default(),
            cultivar: Self::default_cultivar(),
            location: Self::default_location(),
            field_id: Self::default_field_id(),
            start_date: Self::default_start_date(),
            end_date: Self::default_end_date(),
            planting_date: Self::default_planting_date(),
            data_source: DataSourceMode::default(),
            local_data_dir: None,
            season_length: Self::default_season_length(),
            maturity_threshold: Self::default_maturity_threshold(),
            reward: RewardConfig::default(),
            action: ActionLimits::default(),
            simulator_timeout_ms: None,
            workspace_dir: Self::default_workspace_dir(),
            log_dir: None,
            seed: 0,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}
