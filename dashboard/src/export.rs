//! Forecast CSV export

use anyhow::{Context, Result};
use std::path::Path;
use trapcast::models::Forecast;

/// Write `date, yhat, yhat_lower, yhat_upper, trend` rows
pub fn write_forecast(path: &Path, forecast: &Forecast) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in forecast.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
