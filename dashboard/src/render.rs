//! SVG charts of forecasts and their components

use anyhow::{bail, Result};
use chrono::{Days, NaiveDate};
use plotters::prelude::*;
use std::path::Path;
use trapcast::models::{ComponentKind, Forecast};
use trapcast::CanonicalSeries;

const SIZE: (u32, u32) = (1024, 600);
const PANEL_HEIGHT: u32 = 260;

/// Forecast band, point forecast and observed counts
pub fn forecast_chart(path: &Path, title: &str, series: &CanonicalSeries, forecast: &Forecast) -> Result<()> {
    let Some(&first) = forecast.dates().first() else {
        bail!("Cannot chart an empty forecast");
    };
    let actual: Vec<(f64, f64)> = series
        .dates()?
        .into_iter()
        .zip(series.values()?)
        .filter_map(|(date, value)| value.map(|y| (day_index(first, date), y)))
        .collect();

    let xs: Vec<f64> = forecast.dates().iter().map(|d| day_index(first, *d)).collect();
    let (y_min, y_max) = bounds(
        forecast
            .yhat_lower()
            .iter()
            .chain(forecast.yhat_upper())
            .chain(forecast.cap().unwrap_or_default())
            .chain(actual.iter().map(|(_, y)| y))
            .copied(),
    );

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = xs.last().copied().unwrap_or_default();
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..x_max.max(1.0), y_min..y_max)?;

    let label_date = |x: &f64| date_label(first, *x);
    chart
        .configure_mesh()
        .x_desc("ds")
        .y_desc("y")
        .x_label_formatter(&label_date)
        .draw()?;

    let mut band: Vec<(f64, f64)> = xs.iter().copied().zip(forecast.yhat_upper().iter().copied()).collect();
    band.extend(xs.iter().copied().zip(forecast.yhat_lower().iter().copied()).rev());
    chart
        .draw_series(std::iter::once(Polygon::new(band, BLUE.mix(0.2).filled())))?
        .label("Uncertainty interval")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 20, y + 5)], BLUE.mix(0.2).filled()));

    chart
        .draw_series(LineSeries::new(
            xs.iter().copied().zip(forecast.yhat().iter().copied()),
            &BLUE,
        ))?
        .label("Predicted")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    if let Some(cap) = forecast.cap() {
        chart
            .draw_series(LineSeries::new(
                xs.iter().copied().zip(cap.iter().copied()),
                BLACK.mix(0.5).stroke_width(1),
            ))?
            .label("Capacity")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLACK.mix(0.5)));
    }

    chart
        .draw_series(actual.iter().map(|&point| Circle::new(point, 3, RED.filled())))?
        .label("Actual")
        .legend(|(x, y)| Circle::new((x + 10, y), 3, RED.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// One panel for the trend and one per seasonality, holiday and regressor component
pub fn components_chart(path: &Path, title: &str, forecast: &Forecast) -> Result<()> {
    let Some(&first) = forecast.dates().first() else {
        bail!("Cannot chart an empty forecast");
    };

    let mut panels: Vec<(&str, &[f64])> = vec![("trend", forecast.trend())];
    panels.extend(
        forecast
            .components()
            .iter()
            .filter(|c| c.kind != ComponentKind::Aggregate)
            .map(|c| (c.name.as_str(), c.values.as_slice())),
    );

    let height = PANEL_HEIGHT * panels.len() as u32 + 40;
    let root = SVGBackend::new(path, (SIZE.0, height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 22))?;

    let xs: Vec<f64> = forecast.dates().iter().map(|d| day_index(first, *d)).collect();
    let x_max = xs.last().copied().unwrap_or_default().max(1.0);
    let label_date = |x: &f64| date_label(first, *x);

    for (area, (name, values)) in root.split_evenly((panels.len(), 1)).iter().zip(&panels) {
        let (y_min, y_max) = bounds(values.iter().copied());
        let mut chart = ChartBuilder::on(area)
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(50)
            .build_cartesian_2d(0f64..x_max, y_min..y_max)?;

        chart
            .configure_mesh()
            .y_desc(*name)
            .x_label_formatter(&label_date)
            .draw()?;

        chart.draw_series(LineSeries::new(
            xs.iter().copied().zip(values.iter().copied()),
            &BLUE,
        ))?;
    }

    root.present()?;
    Ok(())
}

fn day_index(first: NaiveDate, date: NaiveDate) -> f64 {
    (date - first).num_days() as f64
}

fn date_label(first: NaiveDate, x: f64) -> String {
    if x < 0.0 {
        return String::new();
    }
    first
        .checked_add_days(Days::new(x.round() as u64))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Padded value range, never empty
fn bounds(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(0.5);
    (min - pad, max + pad)
}
