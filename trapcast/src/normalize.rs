//! Renaming raw device tables into the forecaster's canonical shape

use crate::data::{TimeSeriesData, CAP_COLUMN};
use crate::error::{ForecastError, Result};
use crate::models::GrowthMode;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Canonical date column
pub const DATE_COLUMN: &str = "ds";
/// Canonical target column
pub const VALUE_COLUMN: &str = "y";

/// Allowed range of the carrying-capacity multiplier
pub const CAPACITY_MULTIPLIER_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2.0;

/// A device series with `ds`/`y` columns, its covariates and an optional `cap`
#[derive(Debug, Clone)]
pub struct CanonicalSeries {
    data: TimeSeriesData,
    capacity: Option<f64>,
}

/// Rename the date and count columns and attach the capacity when growth saturates
///
/// Every other column is carried over untouched. A `cap` column already in
/// the raw table is replaced by the current capacity, or removed when none
/// applies.
pub fn normalize(
    raw: &TimeSeriesData,
    growth: GrowthMode,
    capacity: Option<f64>,
) -> Result<CanonicalSeries> {
    let value_column = raw.value_column().ok_or_else(|| {
        ForecastError::DataError("Cannot normalize a table without a count column".to_string())
    })?;

    for (reserved, source) in [(DATE_COLUMN, raw.time_column()), (VALUE_COLUMN, value_column)] {
        if reserved != source && raw.has_column(reserved) {
            return Err(ForecastError::DataError(format!(
                "Column '{}' already exists and would clash with the renamed '{}'",
                reserved, source
            )));
        }
    }

    let mut df = raw.dataframe().clone();
    if raw.has_column(CAP_COLUMN) {
        df.drop_in_place(CAP_COLUMN)?;
    }
    df.rename(raw.time_column(), DATE_COLUMN)?;
    df.rename(value_column, VALUE_COLUMN)?;

    let capacity = match (growth, capacity) {
        (GrowthMode::Logistic, Some(cap)) => {
            let height = df.height();
            df.with_column(Series::new(CAP_COLUMN, vec![cap; height]))?;
            Some(cap)
        }
        _ => None,
    };

    Ok(CanonicalSeries {
        data: TimeSeriesData::create_new(df, DATE_COLUMN.to_string(), Some(VALUE_COLUMN.to_string())),
        capacity,
    })
}

/// Capacity as a multiple of the most recent observed count
pub fn capacity_from_multiplier(raw: &TimeSeriesData, multiplier: f64) -> Result<f64> {
    if !CAPACITY_MULTIPLIER_RANGE.contains(&multiplier) {
        return Err(ForecastError::InvalidParameter(format!(
            "Capacity multiplier must be between {} and {}, got {}",
            CAPACITY_MULTIPLIER_RANGE.start(),
            CAPACITY_MULTIPLIER_RANGE.end(),
            multiplier
        )));
    }

    let last = raw.last_observed_value()?.ok_or_else(|| {
        ForecastError::DataError("No observed counts to derive a capacity from".to_string())
    })?;

    Ok(multiplier * last)
}

impl CanonicalSeries {
    pub fn dataframe(&self) -> &DataFrame {
        self.data.dataframe()
    }

    /// The underlying table, with canonical column names
    pub fn data(&self) -> &TimeSeriesData {
        &self.data
    }

    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        self.data.dates()
    }

    pub fn values(&self) -> Result<Vec<Option<f64>>> {
        self.data.values()
    }

    /// Constant capacity attached for logistic growth
    pub fn capacity(&self) -> Option<f64> {
        self.capacity
    }

    pub fn covariate_columns(&self) -> Vec<String> {
        self.data.covariate_columns()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.has_column(name)
    }

    pub fn column_as_f64(&self, name: &str) -> Result<Vec<Option<f64>>> {
        self.data.column_as_f64(name)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Hash of the full content, used to key cached fits
    pub fn fingerprint(&self) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        for date in self.dates()? {
            date.hash(&mut hasher);
        }
        hash_floats(&self.values()?, &mut hasher);
        self.capacity.map(f64::to_bits).hash(&mut hasher);
        for name in self.covariate_columns() {
            name.hash(&mut hasher);
            hash_floats(&self.column_as_f64(&name)?, &mut hasher);
        }
        Ok(hasher.finish())
    }
}

fn hash_floats(values: &[Option<f64>], hasher: &mut DefaultHasher) {
    for value in values {
        value.map(f64::to_bits).hash(hasher);
    }
}
