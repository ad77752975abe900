//! # Trapcast
//!
//! A Rust library for forecasting daily insect trap counts.
//!
//! ## Features
//!
//! - Retrieval of the device histories and future covariate tables of a site
//! - Normalization into `ds`/`y` series with an optional logistic capacity
//! - Prediction frames aligning historical and future covariates by date
//! - Prophet forecasts (trend, seasonalities, holidays and exogenous regressors)
//! - Session caches for fetches and fits
//! - In-sample accuracy metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use trapcast::config::{DashboardConfig, ForecastSettings};
//! use trapcast::pipeline::Dashboard;
//! use trapcast::source::{HttpFetcher, Site};
//!
//! let config = DashboardConfig::from_file("dashboard.toml")?;
//! let mut dashboard: Dashboard<HttpFetcher> = Dashboard::from_config(config)?;
//!
//! let settings = ForecastSettings {
//!     site: Site::Imola,
//!     horizon: 7,
//!     exogenous: true,
//!     ..Default::default()
//! };
//! let report = dashboard.run(&settings)?;
//!
//! for device in &report.devices {
//!     println!("{}: {} forecast rows", device.device, device.baseline.len());
//! }
//! # Ok::<(), trapcast::ForecastError>(())
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod holidays;
pub mod horizon;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use crate::config::{DashboardConfig, ForecastSettings};
pub use crate::data::{DataLoader, TimeSeriesData};
pub use crate::error::ForecastError;
pub use crate::horizon::{build_horizon, GapPolicy, HorizonFrame};
pub use crate::models::{FittedForecastModel, Forecast, ForecastModel, ModelConfig};
pub use crate::normalize::{normalize, CanonicalSeries};
pub use crate::pipeline::{Dashboard, DeviceReport, SiteReport};
pub use crate::source::Site;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
