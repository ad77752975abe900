//! Forecasting models for trap count series

use crate::data::date_series;
use crate::error::{ForecastError, Result};
use crate::holidays::HolidayCountry;
use crate::horizon::HorizonFrame;
use crate::normalize::{CanonicalSeries, VALUE_COLUMN};
use chrono::NaiveDate;
use polars::prelude::{DataFrame, NamedFrom, Series};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::str::FromStr;

/// Trend growth of the additive-regression model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrowthMode {
    #[default]
    Linear,
    /// Saturating growth towards a capacity column
    Logistic,
}

/// How seasonal, holiday and regressor effects combine with the trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    Additive,
    Multiplicative,
}

/// Independently toggled seasonal terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalTerms {
    pub daily: bool,
    pub weekly: bool,
    /// Custom ~30.5 day period, not a built-in term
    pub monthly: bool,
    pub yearly: bool,
}

impl fmt::Display for GrowthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowthMode::Linear => write!(f, "linear"),
            GrowthMode::Logistic => write!(f, "logistic"),
        }
    }
}

impl FromStr for GrowthMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(GrowthMode::Linear),
            "logistic" => Ok(GrowthMode::Logistic),
            _ => Err(format!("Unknown growth mode: {}", s)),
        }
    }
}

impl fmt::Display for SeasonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonalityMode::Additive => write!(f, "additive"),
            SeasonalityMode::Multiplicative => write!(f, "multiplicative"),
        }
    }
}

impl FromStr for SeasonalityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "additive" => Ok(SeasonalityMode::Additive),
            "multiplicative" => Ok(SeasonalityMode::Multiplicative),
            _ => Err(format!("Unknown seasonality mode: {}", s)),
        }
    }
}

/// Everything that shapes a fit, and therefore part of the fit cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub growth: GrowthMode,
    pub seasonality_mode: SeasonalityMode,
    pub seasonal_terms: SeasonalTerms,
    pub holidays: HolidayCountry,
    /// Exogenous columns the model regresses on
    pub regressors: Vec<String>,
}

impl ModelConfig {
    /// Check the training series satisfies this configuration
    ///
    /// Logistic growth needs a positive capacity; every regressor needs a
    /// column with a value on each row that has an observed count.
    pub fn validate_training(&self, series: &CanonicalSeries) -> Result<()> {
        if self.growth == GrowthMode::Logistic {
            match series.capacity() {
                Some(cap) if cap.is_finite() && cap > 0.0 => {}
                Some(cap) => {
                    return Err(ForecastError::Configuration(format!(
                        "Logistic growth needs a positive capacity, got {}",
                        cap
                    )))
                }
                None => {
                    return Err(ForecastError::Configuration(
                        "Logistic growth requires a capacity column".to_string(),
                    ))
                }
            }
        }

        if self.regressors.is_empty() {
            return Ok(());
        }

        let dates = series.dates()?;
        let observed = series.values()?;
        for name in &self.regressors {
            if !series.has_column(name) || name == VALUE_COLUMN {
                return Err(ForecastError::Configuration(format!(
                    "Regressor '{}' is not a column of the training series",
                    name
                )));
            }
            let values = series.column_as_f64(name)?;
            let gap = values
                .iter()
                .zip(&observed)
                .zip(&dates)
                .find(|((value, y), _)| y.is_some() && !value.is_some_and(f64::is_finite));
            if let Some((_, date)) = gap {
                return Err(ForecastError::Configuration(format!(
                    "Regressor '{}' has no value on {}",
                    name, date
                )));
            }
        }

        Ok(())
    }

    /// Check a horizon frame can be predicted with this configuration
    pub fn validate_horizon(&self, frame: &HorizonFrame) -> Result<()> {
        if self.growth == GrowthMode::Logistic {
            let cap_ok = frame
                .cap()
                .is_some_and(|cap| cap.iter().all(|c| c.is_finite() && *c > 0.0));
            if !cap_ok {
                return Err(ForecastError::Configuration(
                    "Logistic growth requires a positive capacity on every horizon row".to_string(),
                ));
            }
        }

        for name in &self.regressors {
            let values = frame.covariate(name).ok_or_else(|| {
                ForecastError::Configuration(format!(
                    "Regressor '{}' is missing from the horizon frame",
                    name
                ))
            })?;
            if let Some(row) = values.iter().position(|v| !v.is_some_and(f64::is_finite)) {
                return Err(ForecastError::Configuration(format!(
                    "Regressor '{}' has no value on {}",
                    name,
                    frame.dates()[row]
                )));
            }
        }

        Ok(())
    }
}

/// What a forecast component represents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Seasonality,
    /// Sum of every holiday effect
    Holidays,
    Regressor,
    /// Model-level totals (additive and multiplicative terms)
    Aggregate,
}

/// A named contribution to the forecast
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    pub values: Vec<f64>,
}

/// Point and interval predictions with their decomposition, one row per date
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    dates: Vec<NaiveDate>,
    yhat: Vec<f64>,
    yhat_lower: Vec<f64>,
    yhat_upper: Vec<f64>,
    trend: Vec<f64>,
    components: Vec<Component>,
    cap: Option<Vec<f64>>,
}

/// One exported forecast row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub trend: f64,
}

impl Forecast {
    /// Create a forecast; all vectors must have one entry per date
    pub fn new(
        dates: Vec<NaiveDate>,
        yhat: Vec<f64>,
        yhat_lower: Vec<f64>,
        yhat_upper: Vec<f64>,
        trend: Vec<f64>,
    ) -> Result<Self> {
        let rows = dates.len();
        for (label, len) in [
            ("yhat", yhat.len()),
            ("yhat_lower", yhat_lower.len()),
            ("yhat_upper", yhat_upper.len()),
            ("trend", trend.len()),
        ] {
            if len != rows {
                return Err(ForecastError::ValidationError(format!(
                    "{} length ({}) doesn't match dates ({})",
                    label, len, rows
                )));
            }
        }

        Ok(Self {
            dates,
            yhat,
            yhat_lower,
            yhat_upper,
            trend,
            components: Vec::new(),
            cap: None,
        })
    }

    /// Attach a named component
    pub fn with_component(mut self, name: &str, kind: ComponentKind, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.dates.len() {
            return Err(ForecastError::ValidationError(format!(
                "Component '{}' length ({}) doesn't match dates ({})",
                name,
                values.len(),
                self.dates.len()
            )));
        }
        self.components.push(Component {
            name: name.to_string(),
            kind,
            values,
        });
        Ok(self)
    }

    /// Attach the capacity the forecast saturates towards
    pub fn with_cap(mut self, cap: Vec<f64>) -> Result<Self> {
        if cap.len() != self.dates.len() {
            return Err(ForecastError::ValidationError(format!(
                "Capacity length ({}) doesn't match dates ({})",
                cap.len(),
                self.dates.len()
            )));
        }
        self.cap = Some(cap);
        Ok(self)
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn yhat(&self) -> &[f64] {
        &self.yhat
    }

    pub fn yhat_lower(&self) -> &[f64] {
        &self.yhat_lower
    }

    pub fn yhat_upper(&self) -> &[f64] {
        &self.yhat_upper
    }

    pub fn trend(&self) -> &[f64] {
        &self.trend
    }

    pub fn cap(&self) -> Option<&[f64]> {
        self.cap.as_deref()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Look up a component by name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Rows in date order
    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        (0..self.dates.len()).map(move |i| ForecastRow {
            date: self.dates[i],
            yhat: self.yhat[i],
            yhat_lower: self.yhat_lower[i],
            yhat_upper: self.yhat_upper[i],
            trend: self.trend[i],
        })
    }

    /// Materialize as a DataFrame (`ds`, `yhat`, bounds, `trend`, components)
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![
            date_series("ds", &self.dates)?,
            Series::new("yhat", self.yhat.as_slice()),
            Series::new("yhat_lower", self.yhat_lower.as_slice()),
            Series::new("yhat_upper", self.yhat_upper.as_slice()),
            Series::new("trend", self.trend.as_slice()),
        ];
        columns.extend(
            self.components
                .iter()
                .map(|c| Series::new(&c.name, c.values.as_slice())),
        );
        Ok(DataFrame::new(columns)?)
    }
}

/// A fitted model that predicts over a horizon frame
pub trait FittedForecastModel: Debug {
    /// Dates of the series the model was fitted on
    fn history_dates(&self) -> &[NaiveDate];

    /// Predict every row of the frame
    fn predict(&self, frame: &HorizonFrame) -> Result<Forecast>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be fitted on a canonical series
pub trait ForecastModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: FittedForecastModel;

    /// Configure a model
    fn from_config(name: &str, config: ModelConfig) -> Self;

    /// Settings the model was configured with
    fn config(&self) -> &ModelConfig;

    /// Fit the model on a series
    fn fit(&self, series: &CanonicalSeries) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod prophet;
