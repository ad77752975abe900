//! One full forecasting pass for a site
//!
//! Every settings change triggers a new pass; fetches and fits are memoized
//! so unchanged inputs are not downloaded or fitted again.

use crate::cache::{fingerprint, SessionCache};
use crate::config::{DashboardConfig, ForecastSettings};
use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::horizon::{baseline_frame, build_horizon};
use crate::metrics::{in_sample_accuracy, ForecastAccuracy};
use crate::models::prophet::ProphetForecaster;
use crate::models::{FittedForecastModel, Forecast, ForecastModel, GrowthMode, ModelConfig};
use crate::normalize::{capacity_from_multiplier, normalize, CanonicalSeries};
use crate::source::{CsvFetcher, DataSource, HttpFetcher, Site, SiteData};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Forecasts for one device
#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub device: String,
    /// The device table as retrieved
    pub history: TimeSeriesData,
    /// The normalized series the models were fitted on
    pub series: CanonicalSeries,
    pub capacity: Option<f64>,
    pub baseline: Forecast,
    /// Forecast with the exogenous covariates as regressors, when requested
    pub exogenous: Option<Forecast>,
    pub baseline_accuracy: Option<ForecastAccuracy>,
    pub exogenous_accuracy: Option<ForecastAccuracy>,
}

/// Result of a pass over both devices of a site
#[derive(Debug, Clone)]
pub struct SiteReport {
    pub site: Site,
    pub settings: ForecastSettings,
    pub devices: Vec<DeviceReport>,
}

/// Retrieval, fitting and prediction behind the dashboard
#[derive(Debug)]
pub struct Dashboard<F: CsvFetcher, M: ForecastModel = ProphetForecaster> {
    config: DashboardConfig,
    source: DataSource<F>,
    fits: SessionCache<M::Fitted>,
    model: PhantomData<M>,
}

impl<M: ForecastModel> Dashboard<HttpFetcher, M> {
    /// Dashboard reading the configured locations over HTTP or from disk
    pub fn from_config(config: DashboardConfig) -> Result<Self> {
        Ok(Self::new(HttpFetcher::new()?, config))
    }
}

impl<F: CsvFetcher, M: ForecastModel> Dashboard<F, M> {
    pub fn new(fetcher: F, config: DashboardConfig) -> Self {
        let source = DataSource::new(fetcher, config.sources.clone(), config.columns.clone());
        Self {
            config,
            source,
            fits: SessionCache::new(),
            model: PhantomData,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The four tables of a site
    pub fn site_data(&mut self, site: Site) -> Result<Arc<SiteData>> {
        self.source
            .fetch(site)
            .ok_or_else(|| ForecastError::Retrieval(site.to_string()))
    }

    /// Message of the most recent retrieval failure
    pub fn last_error(&self) -> Option<&str> {
        self.source.last_error()
    }

    /// Run a full pass: fetch, normalize, fit and predict both devices
    pub fn run(&mut self, settings: &ForecastSettings) -> Result<SiteReport> {
        settings.validate()?;
        let data = self.site_data(settings.site)?;

        let mut devices = Vec::with_capacity(2);
        for (device, history, future) in data.devices() {
            devices.push(self.run_device(settings, device, history, future)?);
        }

        Ok(SiteReport {
            site: settings.site,
            settings: settings.clone(),
            devices,
        })
    }

    fn run_device(
        &mut self,
        settings: &ForecastSettings,
        device: String,
        history: &TimeSeriesData,
        future: &TimeSeriesData,
    ) -> Result<DeviceReport> {
        let capacity = match settings.growth {
            GrowthMode::Logistic => Some(capacity_from_multiplier(history, settings.capacity_multiplier)?),
            GrowthMode::Linear => None,
        };
        let series = normalize(history, settings.growth, capacity)?;

        info!(device = %device, "Fitting the model...");
        let baseline_model = self.fit_cached(&device, settings.model_config(Vec::new()), &series)?;

        let regressors = self.config.columns.covariates.clone();
        let exogenous_model = if settings.exogenous {
            let name = format!("{} with exogenous variables", device);
            Some(self.fit_cached(&name, settings.model_config(regressors.clone()), &series)?)
        } else {
            None
        };

        info!(device = %device, horizon = settings.horizon, "Generating forecast...");
        let frame = baseline_frame(baseline_model.as_ref(), settings.horizon, &series)?;
        let baseline = baseline_model.predict(&frame)?;
        let baseline_accuracy = accuracy(&baseline, &series);

        let (exogenous, exogenous_accuracy) = match exogenous_model {
            Some(model) => {
                let frame = build_horizon(
                    model.as_ref(),
                    settings.horizon,
                    &series,
                    future,
                    &regressors,
                    self.config.gap_policy,
                )?;
                let forecast = model.predict(&frame)?;
                let accuracy = accuracy(&forecast, &series);
                (Some(forecast), accuracy)
            }
            None => (None, None),
        };

        Ok(DeviceReport {
            device,
            history: history.clone(),
            series,
            capacity,
            baseline,
            exogenous,
            baseline_accuracy,
            exogenous_accuracy,
        })
    }

    /// Fit a model, reusing an earlier fit of the same series and configuration
    fn fit_cached(
        &mut self,
        name: &str,
        config: ModelConfig,
        series: &CanonicalSeries,
    ) -> Result<Arc<M::Fitted>> {
        let key = fingerprint(&(name, series.fingerprint()?, &config));
        let before = self.fits.hits();

        let model = M::from_config(name, config);
        let fitted = self.fits.get_or_try_insert_with(key, || model.fit(series))?;

        if self.fits.hits() > before {
            debug!(model = name, "reusing cached fit");
        }
        Ok(fitted)
    }

    /// Number of fitted models held for this session
    pub fn cached_fits(&self) -> usize {
        self.fits.len()
    }
}

fn accuracy(forecast: &Forecast, series: &CanonicalSeries) -> Option<ForecastAccuracy> {
    match in_sample_accuracy(forecast, series) {
        Ok(accuracy) => Some(accuracy),
        Err(err) => {
            warn!(error = %err, "in-sample accuracy unavailable");
            None
        }
    }
}
