//! # insect-dashboard
//!
//! Command-line front end for the trap count forecasts: data tables, forecast
//! and component charts, and CSV exports for a monitoring site.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trapcast::config::{DashboardConfig, ForecastSettings};
use trapcast::holidays::HolidayCountry;
use trapcast::metrics::ForecastAccuracy;
use trapcast::models::{GrowthMode, SeasonalityMode};
use trapcast::pipeline::{Dashboard, DeviceReport};
use trapcast::source::{HttpFetcher, Site};
use trapcast::ForecastError;

mod export;
mod render;

const RETRY_HINT: &str = "Please select a different location or time period.";

#[derive(Parser)]
#[command(name = "insect-dashboard")]
#[command(about = "Insect forecasting dashboard", long_about = None)]
struct Cli {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit and forecast both devices of a site
    Forecast(ForecastArgs),

    /// Print the device tables of a site
    Show {
        /// Location (cicalino, imola)
        #[arg(short, long)]
        site: Option<Site>,
    },

    /// List the selectable holiday countries
    Countries,
}

#[derive(Args)]
struct ForecastArgs {
    /// Location (cicalino, imola)
    #[arg(short, long)]
    site: Option<Site>,

    /// Forecasting horizon in days (1-14)
    #[arg(long)]
    horizon: Option<usize>,

    /// Trend growth (linear, logistic)
    #[arg(long)]
    growth: Option<GrowthMode>,

    /// Carrying capacity as a multiple of the latest count (1.0-2.0)
    #[arg(long)]
    capacity_multiplier: Option<f64>,

    /// Seasonality mode (additive, multiplicative)
    #[arg(long)]
    seasonality_mode: Option<SeasonalityMode>,

    /// Also forecast with the exogenous variables (`--exogenous false` to disable)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    exogenous: Option<bool>,

    /// Daily seasonality on or off
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    daily: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    weekly: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    monthly: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    yearly: Option<bool>,

    /// Holiday country code, or "None"
    #[arg(long)]
    holidays: Option<HolidayCountry>,

    /// Directory for charts and CSV exports
    #[arg(short, long, default_value = "forecast-output")]
    output: PathBuf,
}

impl ForecastArgs {
    /// Layer the command-line flags over the configured defaults
    fn settings(&self, defaults: &ForecastSettings) -> ForecastSettings {
        let mut settings = defaults.clone();
        if let Some(site) = self.site {
            settings.site = site;
        }
        if let Some(horizon) = self.horizon {
            settings.horizon = horizon;
        }
        if let Some(growth) = self.growth {
            settings.growth = growth;
        }
        if let Some(multiplier) = self.capacity_multiplier {
            settings.capacity_multiplier = multiplier;
        }
        if let Some(mode) = self.seasonality_mode {
            settings.seasonality_mode = mode;
        }
        if let Some(country) = self.holidays {
            settings.holidays = country;
        }
        let toggles = [
            (&mut settings.exogenous, self.exogenous),
            (&mut settings.seasonality.daily, self.daily),
            (&mut settings.seasonality.weekly, self.weekly),
            (&mut settings.seasonality.monthly, self.monthly),
            (&mut settings.seasonality.yearly, self.yearly),
        ];
        for (setting, flag) in toggles {
            if let Some(on) = flag {
                *setting = on;
            }
        }
        settings
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "insect_dashboard=info,trapcast=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => DashboardConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => DashboardConfig::default(),
    };

    match cli.command {
        Commands::Forecast(args) => forecast(config, &args),
        Commands::Show { site } => show(config, site),
        Commands::Countries => {
            for country in HolidayCountry::options() {
                println!("{}", country);
            }
            Ok(())
        }
    }
}

fn forecast(config: DashboardConfig, args: &ForecastArgs) -> anyhow::Result<()> {
    let settings = args.settings(&config.defaults);
    let mut dashboard: Dashboard<HttpFetcher> = Dashboard::from_config(config)?;

    let report = match dashboard.run(&settings) {
        Ok(report) => report,
        Err(ForecastError::Retrieval(site)) => retrieval_failed(&dashboard, &site),
        Err(err) => return Err(err.into()),
    };

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;

    println!("Forecasting {} ({} days ahead)", report.site, settings.horizon);
    for device in &report.devices {
        write_device(&args.output, device)?;
    }
    info!(output = %args.output.display(), "charts and exports written");
    Ok(())
}

fn write_device(output: &Path, device: &DeviceReport) -> anyhow::Result<()> {
    let stem = device.device.to_lowercase().replace(' ', "_");

    println!("\n{}", device.device);
    print_accuracy("baseline", device.baseline_accuracy.as_ref());

    let title = format!("Interactive Forecast Plot {}", device.device);
    render::forecast_chart(&output.join(format!("{}_forecast.svg", stem)), &title, &device.series, &device.baseline)?;
    render::components_chart(
        &output.join(format!("{}_components.svg", stem)),
        &format!("Forecast Components for {}", device.device),
        &device.baseline,
    )?;
    export::write_forecast(&output.join(format!("{}_forecast.csv", stem)), &device.baseline)?;

    if let Some(exogenous) = &device.exogenous {
        print_accuracy("exogenous", device.exogenous_accuracy.as_ref());
        let title = format!("{} with Exogenous Variables", title);
        render::forecast_chart(&output.join(format!("{}_exogenous.svg", stem)), &title, &device.series, exogenous)?;
        export::write_forecast(&output.join(format!("{}_exogenous.csv", stem)), exogenous)?;
    }
    Ok(())
}

fn print_accuracy(label: &str, accuracy: Option<&ForecastAccuracy>) {
    match accuracy {
        Some(accuracy) => println!("  {:<10} {}", label, accuracy),
        None => println!("  {:<10} accuracy unavailable", label),
    }
}

fn show(config: DashboardConfig, site: Option<Site>) -> anyhow::Result<()> {
    let site = site.unwrap_or(config.defaults.site);
    let covariates = config.columns.covariates.clone();
    let mut dashboard: Dashboard<HttpFetcher> = Dashboard::from_config(config)?;

    let data = match dashboard.site_data(site) {
        Ok(data) => data,
        Err(ForecastError::Retrieval(site)) => retrieval_failed(&dashboard, &site),
        Err(err) => return Err(err.into()),
    };

    for (device, history, _) in data.devices() {
        println!("{} Data", device);
        println!("{}", history.display_frame(&covariates)?);
    }
    Ok(())
}

fn retrieval_failed(dashboard: &Dashboard<HttpFetcher>, site: &str) -> ! {
    let message = dashboard
        .last_error()
        .map(str::to_string)
        .unwrap_or_else(|| ForecastError::Retrieval(site.to_string()).to_string());
    eprintln!("{}", message);
    eprintln!("{}", RETRY_HINT);
    std::process::exit(1)
}
