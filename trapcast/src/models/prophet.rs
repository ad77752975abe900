//! Prophet (additive regression) forecaster backed by `augurs`

use crate::error::{ForecastError, Result};
use crate::holidays::{holidays_for, HolidayCountry};
use crate::horizon::HorizonFrame;
use crate::models::{
    ComponentKind, FittedForecastModel, Forecast, ForecastModel, GrowthMode, ModelConfig,
    SeasonalityMode,
};
use crate::normalize::CanonicalSeries;
use crate::utils::to_timestamp_seconds;
use augurs::prophet::wasmstan::WasmstanOptimizer;
use augurs::prophet::{
    FeatureMode, FeaturePrediction, GrowthType, Holiday, HolidayOccurrence, PositiveFloat, PredictionData,
    Predictions, Prophet, ProphetOptions, Regressor, Seasonality, SeasonalityOption, TrainingData,
};
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::num::NonZeroU32;
use tracing::{debug, warn};

/// Period of the custom monthly seasonality, in days
pub const MONTHLY_PERIOD_DAYS: f64 = 30.5;
/// Fourier order of the custom monthly seasonality
pub const MONTHLY_FOURIER_ORDER: u32 = 5;

/// Unfitted Prophet configuration
#[derive(Debug, Clone)]
pub struct ProphetForecaster {
    name: String,
    config: ModelConfig,
}

/// Prophet model fitted on one device series
pub struct FittedProphet {
    name: String,
    config: ModelConfig,
    model: Prophet<WasmstanOptimizer>,
    history: Vec<NaiveDate>,
}

impl fmt::Debug for FittedProphet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedProphet")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("history", &self.history.len())
            .finish()
    }
}

impl ProphetForecaster {
    pub fn new(name: &str, config: ModelConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
        }
    }

    fn options(&self, history: &[NaiveDate]) -> ProphetOptions {
        let terms = self.config.seasonal_terms;
        ProphetOptions {
            growth: match self.config.growth {
                GrowthMode::Linear => GrowthType::Linear,
                GrowthMode::Logistic => GrowthType::Logistic,
            },
            seasonality_mode: feature_mode(self.config.seasonality_mode),
            daily_seasonality: SeasonalityOption::Manual(terms.daily),
            weekly_seasonality: SeasonalityOption::Manual(terms.weekly),
            yearly_seasonality: SeasonalityOption::Manual(terms.yearly),
            holidays: holiday_effects(self.config.holidays, history),
            ..Default::default()
        }
    }

    fn training_data(&self, series: &CanonicalSeries) -> Result<TrainingData> {
        let dates = series.dates()?;
        let values = series.values()?;
        let keep: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, y)| y.is_some_and(f64::is_finite))
            .map(|(row, _)| row)
            .collect();

        if keep.len() < values.len() {
            warn!(
                model = %self.name,
                dropped = values.len() - keep.len(),
                "dropping rows without an observed count"
            );
        }
        if keep.len() < 2 {
            return Err(ForecastError::DataError(format!(
                "{} needs at least 2 observed counts, got {}",
                self.name,
                keep.len()
            )));
        }

        let ds = keep.iter().map(|&row| to_timestamp_seconds(dates[row])).collect();
        let y = keep.iter().filter_map(|&row| values[row]).collect();
        let mut data = TrainingData::new(ds, y)?;

        if let (GrowthMode::Logistic, Some(cap)) = (self.config.growth, series.capacity()) {
            data = data.with_cap(vec![cap; keep.len()])?;
        }

        if !self.config.regressors.is_empty() {
            let mut regressors = HashMap::new();
            for name in &self.config.regressors {
                let column = series.column_as_f64(name)?;
                let values = keep
                    .iter()
                    .map(|&row| column[row].unwrap_or(f64::NAN))
                    .collect::<Vec<f64>>();
                regressors.insert(name.clone(), values);
            }
            data = data.with_regressors(regressors)?;
        }

        Ok(data)
    }
}

impl ForecastModel for ProphetForecaster {
    type Fitted = FittedProphet;

    fn from_config(name: &str, config: ModelConfig) -> Self {
        Self::new(name, config)
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn fit(&self, series: &CanonicalSeries) -> Result<Self::Fitted> {
        self.config.validate_training(series)?;

        let history = series.dates()?;
        let data = self.training_data(series)?;

        let mut model = Prophet::new(self.options(&history), WasmstanOptimizer::new());
        if self.config.seasonal_terms.monthly {
            model.add_seasonality("monthly".to_string(), monthly_seasonality()?)?;
        }
        for name in &self.config.regressors {
            let regressor = match self.config.seasonality_mode {
                SeasonalityMode::Additive => Regressor::additive(),
                SeasonalityMode::Multiplicative => Regressor::multiplicative(),
            };
            model.add_regressor(name.clone(), regressor);
        }

        debug!(model = %self.name, rows = series.len(), config = ?self.config, "fitting prophet");
        model.fit(data, Default::default())?;

        Ok(FittedProphet {
            name: self.name.clone(),
            config: self.config.clone(),
            model,
            history,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl FittedProphet {
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn prediction_data(&self, frame: &HorizonFrame) -> Result<PredictionData> {
        let ds = frame.dates().iter().map(|d| to_timestamp_seconds(*d)).collect();
        let mut data = PredictionData::new(ds);

        if self.config.growth == GrowthMode::Logistic {
            if let Some(cap) = frame.cap() {
                data = data.with_cap(cap.to_vec())?;
            }
        }

        if !self.config.regressors.is_empty() {
            let mut regressors = HashMap::new();
            for name in &self.config.regressors {
                let values = frame
                    .covariate(name)
                    .map(|column| column.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                    .unwrap_or_default();
                regressors.insert(name.clone(), values);
            }
            data = data.with_regressors(regressors)?;
        }

        Ok(data)
    }

    fn to_forecast(&self, frame: &HorizonFrame, predictions: Predictions) -> Result<Forecast> {
        if predictions.yhat.point.len() != frame.len() {
            return Err(ForecastError::ForecastingError(format!(
                "{} returned {} rows for a {} row frame",
                self.name,
                predictions.yhat.point.len(),
                frame.len()
            )));
        }

        let (yhat, lower, upper) = bounds(predictions.yhat);
        let mut forecast = Forecast::new(
            frame.dates().to_vec(),
            yhat,
            lower,
            upper,
            predictions.trend.point,
        )?;

        let seasonalities: BTreeMap<_, _> = predictions.seasonalities.into_iter().collect();
        for (name, feature) in seasonalities {
            forecast = forecast.with_component(&name, ComponentKind::Seasonality, feature.point)?;
        }

        if !predictions.holidays.is_empty() {
            let mut total = vec![0.0; frame.len()];
            for feature in predictions.holidays.values() {
                for (sum, value) in total.iter_mut().zip(&feature.point) {
                    *sum += value;
                }
            }
            forecast = forecast.with_component("holidays", ComponentKind::Holidays, total)?;
        }

        let regressors: BTreeMap<_, _> = predictions.regressors.into_iter().collect();
        for (name, feature) in regressors {
            forecast = forecast.with_component(&name, ComponentKind::Regressor, feature.point)?;
        }

        forecast = forecast
            .with_component("additive_terms", ComponentKind::Aggregate, predictions.additive.point)?
            .with_component(
                "multiplicative_terms",
                ComponentKind::Aggregate,
                predictions.multiplicative.point,
            )?;

        if let Some(cap) = frame.cap() {
            forecast = forecast.with_cap(cap.to_vec())?;
        }

        Ok(forecast)
    }
}

impl FittedForecastModel for FittedProphet {
    fn history_dates(&self) -> &[NaiveDate] {
        &self.history
    }

    fn predict(&self, frame: &HorizonFrame) -> Result<Forecast> {
        self.config.validate_horizon(frame)?;
        let data = self.prediction_data(frame)?;
        let predictions = self.model.predict(Some(data))?;
        self.to_forecast(frame, predictions)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn feature_mode(mode: SeasonalityMode) -> FeatureMode {
    match mode {
        SeasonalityMode::Additive => FeatureMode::Additive,
        SeasonalityMode::Multiplicative => FeatureMode::Multiplicative,
    }
}

fn monthly_seasonality() -> Result<Seasonality> {
    let period = PositiveFloat::try_from(MONTHLY_PERIOD_DAYS).map_err(|_| {
        ForecastError::InvalidParameter(format!("Invalid seasonality period {}", MONTHLY_PERIOD_DAYS))
    })?;
    let order = NonZeroU32::new(MONTHLY_FOURIER_ORDER).ok_or_else(|| {
        ForecastError::InvalidParameter("Fourier order must be positive".to_string())
    })?;
    Ok(Seasonality::new(period, order))
}

/// One holiday feature per holiday name, covering the history and the following year
fn holiday_effects(country: HolidayCountry, history: &[NaiveDate]) -> HashMap<String, Holiday> {
    let (first, last) = match (history.iter().min(), history.iter().max()) {
        (Some(first), Some(last)) => (first.year(), last.year() + 1),
        _ => return HashMap::new(),
    };

    let mut by_name: BTreeMap<&str, Vec<HolidayOccurrence>> = BTreeMap::new();
    for holiday in holidays_for(country, first..=last) {
        by_name
            .entry(holiday.name)
            .or_default()
            .push(HolidayOccurrence::for_day(to_timestamp_seconds(holiday.date)));
    }

    by_name
        .into_iter()
        .map(|(name, ds)| (name.to_string(), Holiday::new(ds)))
        .collect()
}

fn bounds(feature: FeaturePrediction) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let lower = feature.lower.unwrap_or_else(|| feature.point.clone());
    let upper = feature.upper.unwrap_or_else(|| feature.point.clone());
    (feature.point, lower, upper)
}
