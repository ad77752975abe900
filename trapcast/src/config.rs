//! Dashboard configuration, loaded from TOML

use crate::error::{ForecastError, Result};
use crate::holidays::HolidayCountry;
use crate::horizon::GapPolicy;
use crate::models::{GrowthMode, ModelConfig, SeasonalTerms, SeasonalityMode};
use crate::normalize::CAPACITY_MULTIPLIER_RANGE;
use crate::source::Site;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;

/// Selectable forecast horizon, in days
pub const HORIZON_RANGE: RangeInclusive<usize> = 1..=14;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub defaults: ForecastSettings,

    /// How missing covariates in the horizon frame are handled
    #[serde(default)]
    pub gap_policy: GapPolicy,
}

impl DashboardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.defaults.validate()?;
        Ok(config)
    }
}

/// Column names of the device and future tables
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_time_column")]
    pub time: String,
    #[serde(default = "default_value_column")]
    pub value: String,
    #[serde(default = "default_future_time_column")]
    pub future_time: String,
    /// Exogenous columns used as regressors
    #[serde(default = "default_covariates")]
    pub covariates: Vec<String>,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            time: default_time_column(),
            value: default_value_column(),
            future_time: default_future_time_column(),
            covariates: default_covariates(),
        }
    }
}

/// Where the four tables of a site are read from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteSources {
    pub device_1: String,
    pub device_2: String,
    pub future_1: String,
    pub future_2: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_cicalino_sources")]
    pub cicalino: SiteSources,
    #[serde(default = "default_imola_sources")]
    pub imola: SiteSources,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cicalino: default_cicalino_sources(),
            imola: default_imola_sources(),
        }
    }
}

impl SourcesConfig {
    pub fn for_site(&self, site: Site) -> &SiteSources {
        match site {
            Site::Cicalino => &self.cicalino,
            Site::Imola => &self.imola,
        }
    }
}

/// Every user-selectable setting of one forecasting pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    #[serde(default)]
    pub site: Site,
    #[serde(default = "default_horizon")]
    pub horizon: usize,
    #[serde(default)]
    pub growth: GrowthMode,
    /// Capacity as a multiple of the last observed count, logistic growth only
    #[serde(default = "default_capacity_multiplier")]
    pub capacity_multiplier: f64,
    #[serde(default)]
    pub seasonality_mode: SeasonalityMode,
    /// Also fit models with the exogenous covariates
    #[serde(default)]
    pub exogenous: bool,
    #[serde(default)]
    pub seasonality: SeasonalTerms,
    #[serde(default)]
    pub holidays: HolidayCountry,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            site: Site::default(),
            horizon: default_horizon(),
            growth: GrowthMode::default(),
            capacity_multiplier: default_capacity_multiplier(),
            seasonality_mode: SeasonalityMode::default(),
            exogenous: false,
            seasonality: SeasonalTerms::default(),
            holidays: HolidayCountry::default(),
        }
    }
}

impl ForecastSettings {
    pub fn validate(&self) -> Result<()> {
        if !HORIZON_RANGE.contains(&self.horizon) {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon must be between {} and {} days, got {}",
                HORIZON_RANGE.start(),
                HORIZON_RANGE.end(),
                self.horizon
            )));
        }
        if self.growth == GrowthMode::Logistic
            && !CAPACITY_MULTIPLIER_RANGE.contains(&self.capacity_multiplier)
        {
            return Err(ForecastError::InvalidParameter(format!(
                "Capacity multiplier must be between {} and {}, got {}",
                CAPACITY_MULTIPLIER_RANGE.start(),
                CAPACITY_MULTIPLIER_RANGE.end(),
                self.capacity_multiplier
            )));
        }
        Ok(())
    }

    /// Model configuration for these settings with the given regressors
    pub fn model_config(&self, regressors: Vec<String>) -> ModelConfig {
        ModelConfig {
            growth: self.growth,
            seasonality_mode: self.seasonality_mode,
            seasonal_terms: self.seasonality,
            holidays: self.holidays,
            regressors,
        }
    }
}

fn default_time_column() -> String {
    "DateTime".to_string()
}
fn default_value_column() -> String {
    "Numero di insetti".to_string()
}
fn default_future_time_column() -> String {
    "ds".to_string()
}
fn default_covariates() -> Vec<String> {
    [
        "Evento",
        "Temperatura Minima",
        "Temperatura Massima",
        "Media Temperatura",
        "Media Umidità",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_horizon() -> usize {
    7
}
fn default_capacity_multiplier() -> f64 {
    1.2
}

fn drive_export(id: &str) -> String {
    format!("https://drive.google.com/uc?id={}", id)
}
fn default_cicalino_sources() -> SiteSources {
    SiteSources {
        device_1: drive_export("1nrjDiYRusERc0_a86oX_xHMQnMy99zQt"),
        device_2: drive_export("1kAlOrtjwPLUwO7BrQDCcFVc63AwbcM-y"),
        future_1: drive_export("1mN_WgzN1tt4gQIXtTM4tGI7l_hhNESz4"),
        future_2: drive_export("175Yw0UiSkzwaQQoHpIDGQvy3N0hOKi5z"),
    }
}
fn default_imola_sources() -> SiteSources {
    SiteSources {
        device_1: drive_export("1vQeFWuM2l3SHLohiU_cVfKoBhesa6Z0I"),
        device_2: drive_export("1zDnP1SF2o1iYxL1AzHteG6GAllWSENcN"),
        future_1: drive_export("1H8EzBOOlLELoE5CetGTdg7RtX_OCiOZE"),
        future_2: drive_export("1czeE7a0KvsKpu1W2XrBSm9e81wyHXDfL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DashboardConfig::from_toml_str("").unwrap();
        assert_eq!(config, DashboardConfig::default());
        assert_eq!(config.columns.value, "Numero di insetti");
        assert_eq!(config.columns.covariates.len(), 5);
        assert_eq!(config.defaults.horizon, 7);
        assert_eq!(config.gap_policy, GapPolicy::Fail);
        assert!(config.sources.imola.device_1.starts_with("https://drive.google.com/uc?id="));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let text = r#"
gap_policy = "forward_fill"

[columns]
covariates = ["Media Temperatura"]

[sources.imola]
device_1 = "data/imola_1.csv"
device_2 = "data/imola_2.csv"
future_1 = "data/imola_1_future.csv"
future_2 = "data/imola_2_future.csv"

[defaults]
site = "imola"
growth = "logistic"
holidays = "IT"

[defaults.seasonality]
weekly = true
"#;
        let config = DashboardConfig::from_toml_str(text).unwrap();

        assert_eq!(config.gap_policy, GapPolicy::ForwardFill);
        assert_eq!(config.columns.time, "DateTime");
        assert_eq!(config.columns.covariates, vec!["Media Temperatura".to_string()]);
        assert_eq!(config.sources.for_site(Site::Imola).future_2, "data/imola_2_future.csv");
        assert_eq!(config.sources.cicalino, default_cicalino_sources());
        assert_eq!(config.defaults.site, Site::Imola);
        assert_eq!(config.defaults.growth, GrowthMode::Logistic);
        assert_eq!(config.defaults.holidays, HolidayCountry::Italy);
        assert!(config.defaults.seasonality.weekly);
        assert!(!config.defaults.seasonality.yearly);
        assert_eq!(config.defaults.capacity_multiplier, 1.2);
    }

    #[rstest]
    #[case(0, GrowthMode::Linear, 1.2, false)]
    #[case(1, GrowthMode::Linear, 1.2, true)]
    #[case(14, GrowthMode::Linear, 1.2, true)]
    #[case(15, GrowthMode::Linear, 1.2, false)]
    #[case(7, GrowthMode::Logistic, 2.5, false)]
    #[case(7, GrowthMode::Linear, 2.5, true)]
    #[case(7, GrowthMode::Logistic, 1.0, true)]
    fn settings_validation(
        #[case] horizon: usize,
        #[case] growth: GrowthMode,
        #[case] capacity_multiplier: f64,
        #[case] valid: bool,
    ) {
        let settings = ForecastSettings {
            horizon,
            growth,
            capacity_multiplier,
            ..Default::default()
        };
        assert_eq!(settings.validate().is_ok(), valid);
    }

    #[test]
    fn invalid_defaults_are_rejected() {
        let err = DashboardConfig::from_toml_str("[defaults]\nhorizon = 30\n").unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
        assert!(matches!(
            DashboardConfig::from_toml_str("gap_policy = 3"),
            Err(ForecastError::ConfigParse(_))
        ));
    }

    #[test]
    fn model_config_carries_settings() {
        let settings = ForecastSettings {
            seasonality_mode: SeasonalityMode::Multiplicative,
            holidays: HolidayCountry::France,
            ..Default::default()
        };
        let config = settings.model_config(vec!["Evento".to_string()]);
        assert_eq!(config.seasonality_mode, SeasonalityMode::Multiplicative);
        assert_eq!(config.holidays, HolidayCountry::France);
        assert_eq!(config.regressors, vec!["Evento".to_string()]);
    }
}
