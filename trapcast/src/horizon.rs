//! Prediction frames spanning the history plus the forecast horizon
//!
//! The exogenous model needs a value for every covariate on every row it
//! predicts. Historical rows take their covariates from the device series,
//! horizon rows from the future-covariates table; both are aligned strictly
//! by date onto a gap-free daily calendar.

use crate::data::{date_series, TimeSeriesData, CAP_COLUMN};
use crate::error::{ForecastError, Result};
use crate::models::FittedForecastModel;
use crate::normalize::CanonicalSeries;
use crate::utils::daily_range;
use chrono::{Days, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

const DATE_COLUMN: &str = "ds";

/// What to do with horizon rows that have no covariate value after the join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPolicy {
    /// Refuse the frame, naming the first missing cell
    #[default]
    Fail,
    /// Carry the last known value of each column forward
    ForwardFill,
    /// Leave the cells missing
    Keep,
}

/// Working frame passed to prediction: one row per calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonFrame {
    dates: Vec<NaiveDate>,
    covariates: Vec<(String, Vec<Option<f64>>)>,
    cap: Option<Vec<f64>>,
}

impl HorizonFrame {
    /// A frame over the given dates without covariates
    pub fn new(dates: Vec<NaiveDate>) -> Self {
        Self {
            dates,
            covariates: Vec::new(),
            cap: None,
        }
    }

    /// Attach the same capacity to every row
    pub fn with_capacity(mut self, capacity: f64) -> Self {
        self.cap = Some(vec![capacity; self.dates.len()]);
        self
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn covariate_names(&self) -> Vec<&str> {
        self.covariates.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn covariate(&self, name: &str) -> Option<&[Option<f64>]> {
        self.covariates
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn cap(&self) -> Option<&[f64]> {
        self.cap.as_deref()
    }

    /// Cells left without a value, in row order
    pub fn missing_cells(&self) -> Vec<(NaiveDate, String)> {
        let mut missing = Vec::new();
        for (row, date) in self.dates.iter().enumerate() {
            for (name, values) in &self.covariates {
                if values[row].is_none() {
                    missing.push((*date, name.clone()));
                }
            }
        }
        missing
    }

    /// Materialize as a DataFrame: `ds`, covariates, then `cap`
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = vec![date_series(DATE_COLUMN, &self.dates)?];
        columns.extend(
            self.covariates
                .iter()
                .map(|(name, values)| Series::new(name, values.as_slice())),
        );
        if let Some(cap) = &self.cap {
            columns.push(Series::new(CAP_COLUMN, cap.as_slice()));
        }
        Ok(DataFrame::new(columns)?)
    }

    fn apply_gap_policy(&mut self, policy: GapPolicy) -> Result<()> {
        match policy {
            GapPolicy::Keep => Ok(()),
            GapPolicy::Fail => match self.missing_cells().first() {
                Some((date, column)) => Err(ForecastError::DataError(format!(
                    "No value for covariate '{}' on {}",
                    column, date
                ))),
                None => Ok(()),
            },
            GapPolicy::ForwardFill => {
                for (name, values) in &mut self.covariates {
                    let mut last = None;
                    for (row, value) in values.iter_mut().enumerate() {
                        if let Some(v) = *value {
                            last = Some(v);
                        } else if let Some(v) = last {
                            *value = Some(v);
                        } else {
                            return Err(ForecastError::DataError(format!(
                                "No earlier value to carry forward for covariate '{}' on {}",
                                name, self.dates[row]
                            )));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// Every calendar day from the first fitted date through `horizon` days past the last
pub fn build_base_frame<M>(fitted: &M, horizon: usize) -> Result<Vec<NaiveDate>>
where
    M: FittedForecastModel + ?Sized,
{
    let history = fitted.history_dates();
    let (first, last) = match (history.iter().min(), history.iter().max()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ForecastError::ForecastingError(format!(
                "{} has no fitted history",
                fitted.name()
            )))
        }
    };

    let end = last.checked_add_days(Days::new(horizon as u64)).ok_or_else(|| {
        ForecastError::ValidationError(format!("Horizon of {} days overflows the calendar", horizon))
    })?;

    Ok(daily_range(first, end))
}

/// Base frame plus capacity, for models without exogenous regressors
pub fn baseline_frame<M>(fitted: &M, horizon: usize, series: &CanonicalSeries) -> Result<HorizonFrame>
where
    M: FittedForecastModel + ?Sized,
{
    let frame = HorizonFrame::new(build_base_frame(fitted, horizon)?);
    Ok(match series.capacity() {
        Some(cap) => frame.with_capacity(cap),
        None => frame,
    })
}

/// Align historical and future covariates onto the base frame
///
/// Only the `regressors` columns are carried. History rows are stacked with
/// the future table and deduplicated on date keeping the last row, so the
/// future value wins where both cover a date. The base frame is then
/// left-joined on date and the gap policy decides what happens to unmatched
/// cells.
pub fn build_horizon<M>(
    fitted: &M,
    horizon: usize,
    series: &CanonicalSeries,
    future: &TimeSeriesData,
    regressors: &[String],
    gap_policy: GapPolicy,
) -> Result<HorizonFrame>
where
    M: FittedForecastModel + ?Sized,
{
    let base = build_base_frame(fitted, horizon)?;

    let history = covariate_frame(&series.dates()?, regressors, |name| {
        if series.has_column(name) {
            series.column_as_f64(name).map(Some)
        } else {
            Ok(None)
        }
    })?;
    let upcoming = covariate_frame(&future.dates()?, regressors, |name| {
        if future.has_column(name) {
            future.column_as_f64(name).map(Some)
        } else {
            Ok(None)
        }
    })?;

    let combined = history
        .vstack(&upcoming)?
        .lazy()
        .unique_stable(Some(vec![DATE_COLUMN.to_string()]), UniqueKeepStrategy::Last);

    let joined = DataFrame::new(vec![date_series(DATE_COLUMN, &base)?])?
        .lazy()
        .join(
            combined,
            [col(DATE_COLUMN)],
            [col(DATE_COLUMN)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    if joined.height() != base.len() {
        return Err(ForecastError::DataError(format!(
            "Covariate join produced {} rows for {} dates",
            joined.height(),
            base.len()
        )));
    }

    let mut covariates = Vec::with_capacity(regressors.len());
    for name in regressors {
        let values: Vec<Option<f64>> = joined.column(name)?.f64()?.into_iter().collect();
        covariates.push((name.clone(), values));
    }

    debug!(
        rows = joined.height(),
        covariates = regressors.len(),
        history = history.height(),
        future = upcoming.height(),
        "joined covariates onto horizon frame"
    );

    let mut frame = HorizonFrame {
        dates: base,
        covariates,
        cap: None,
    };
    frame.apply_gap_policy(gap_policy)?;

    Ok(match series.capacity() {
        Some(cap) => frame.with_capacity(cap),
        None => frame,
    })
}

/// `ds` plus one Float64 column per name; names the table lacks are all null
fn covariate_frame<F>(dates: &[NaiveDate], columns: &[String], mut column: F) -> Result<DataFrame>
where
    F: FnMut(&str) -> Result<Option<Vec<Option<f64>>>>,
{
    let mut frame = vec![date_series(DATE_COLUMN, dates)?];
    for name in columns {
        let values = column(name)?.unwrap_or_else(|| vec![None; dates.len()]);
        frame.push(Series::new(name, values));
    }
    Ok(DataFrame::new(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Forecast, GrowthMode};
    use crate::normalize::normalize;
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct History(Vec<NaiveDate>);

    impl FittedForecastModel for History {
        fn history_dates(&self) -> &[NaiveDate] {
            &self.0
        }

        fn predict(&self, _frame: &HorizonFrame) -> Result<Forecast> {
            unimplemented!("horizon tests never predict")
        }

        fn name(&self) -> &str {
            "history"
        }
    }

    fn day(n: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .checked_add_days(Days::new(n))
            .unwrap()
    }

    fn series(days: u64) -> (History, CanonicalSeries) {
        let dates: Vec<NaiveDate> = (0..days).map(day).collect();
        let counts: Vec<f64> = (0..days).map(|d| d as f64).collect();
        let temps: Vec<Option<f64>> = (0..days).map(|d| Some(20.0 + d as f64)).collect();
        let raw = TimeSeriesData::new(dates.clone(), counts)
            .unwrap()
            .with_column("temp", temps)
            .unwrap();
        (History(dates), normalize(&raw, GrowthMode::Linear, None).unwrap())
    }

    fn temp() -> Vec<String> {
        vec!["temp".to_string()]
    }

    fn future(from: u64, to: u64, value: f64) -> TimeSeriesData {
        let dates: Vec<NaiveDate> = (from..=to).map(day).collect();
        let n = dates.len();
        TimeSeriesData::covariates_only(dates)
            .unwrap()
            .with_column("temp", vec![Some(value); n])
            .unwrap()
    }

    #[test]
    fn base_frame_continues_the_calendar() {
        let (fitted, _) = series(5);
        let base = build_base_frame(&fitted, 3).unwrap();
        assert_eq!(base, (0..8).map(day).collect::<Vec<_>>());
    }

    #[test]
    fn base_frame_needs_history() {
        assert!(build_base_frame(&History(vec![]), 3).is_err());
    }

    #[test]
    fn horizon_rows_take_future_covariates() {
        let (fitted, series) = series(10);
        let frame = build_horizon(&fitted, 4, &series, &future(10, 13, -1.0), &temp(), GapPolicy::Fail).unwrap();

        assert_eq!(frame.len(), 14);
        assert_eq!(frame.covariate_names(), vec!["temp"]);
        let temp = frame.covariate("temp").unwrap();
        assert_eq!(temp[0], Some(20.0));
        assert_eq!(temp[9], Some(29.0));
        assert!(temp[10..].iter().all(|t| *t == Some(-1.0)));
        assert!(frame.cap().is_none());
    }

    #[test]
    fn future_wins_on_overlapping_dates() {
        let (fitted, series) = series(10);
        // future table restates the last three historical days
        let frame = build_horizon(&fitted, 2, &series, &future(7, 11, 99.0), &temp(), GapPolicy::Fail).unwrap();

        let temp = frame.covariate("temp").unwrap();
        assert_eq!(frame.len(), 12);
        assert_eq!(temp[6], Some(26.0));
        assert!(temp[7..].iter().all(|t| *t == Some(99.0)));
        let mut dates = frame.dates().to_vec();
        dates.dedup();
        assert_eq!(dates.len(), frame.len());
    }

    #[test]
    fn gap_between_history_and_future_fails_by_default() {
        let (fitted, series) = series(10);
        let future = future(12, 14, 5.0);

        let err = build_horizon(&fitted, 5, &series, &future, &temp(), GapPolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("2024-01-11"));

        let kept = build_horizon(&fitted, 5, &series, &future, &temp(), GapPolicy::Keep).unwrap();
        assert_eq!(
            kept.missing_cells(),
            vec![(day(10), "temp".to_string()), (day(11), "temp".to_string())]
        );

        let filled = build_horizon(&fitted, 5, &series, &future, &temp(), GapPolicy::ForwardFill).unwrap();
        let temp = filled.covariate("temp").unwrap();
        assert_eq!(temp[10], Some(29.0));
        assert_eq!(temp[11], Some(29.0));
        assert_eq!(temp[12], Some(5.0));
        assert!(filled.missing_cells().is_empty());
    }

    #[test]
    fn only_regressor_columns_are_carried() {
        let dates: Vec<NaiveDate> = (0..10).map(day).collect();
        let raw = TimeSeriesData::new(dates.clone(), vec![1.0; 10])
            .unwrap()
            .with_column("temp", vec![Some(21.0); 10])
            .unwrap()
            .with_column("Trappola", vec![Some(4.0); 10])
            .unwrap();
        let series = normalize(&raw, GrowthMode::Linear, None).unwrap();
        let fitted = History(dates);

        let frame = build_horizon(&fitted, 3, &series, &future(10, 12, 18.0), &temp(), GapPolicy::Fail).unwrap();
        assert_eq!(frame.covariate_names(), vec!["temp"]);
        assert!(frame.covariate("Trappola").is_none());
        assert!(frame.missing_cells().is_empty());

        let both = vec!["temp".to_string(), "Trappola".to_string()];
        let err = build_horizon(&fitted, 3, &series, &future(10, 12, 18.0), &both, GapPolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("'Trappola' on 2024-01-11"));
    }

    #[test]
    fn repeated_future_dates_keep_the_last_row() {
        let (fitted, series) = series(3);
        let dates = vec![day(3), day(3), day(4)];
        let future = TimeSeriesData::covariates_only(dates)
            .unwrap()
            .with_column("temp", vec![Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();

        let frame = build_horizon(&fitted, 2, &series, &future, &temp(), GapPolicy::Fail).unwrap();
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.covariate("temp").unwrap()[3..].to_vec(), vec![Some(2.0), Some(3.0)]);
    }

    #[test]
    fn capacity_reaches_every_row() {
        let (fitted, series) = series(4);
        let raw = TimeSeriesData::new(fitted.0.clone(), vec![1.0, 2.0, 3.0, 5.0]).unwrap();
        let logistic = normalize(&raw, GrowthMode::Logistic, Some(6.0)).unwrap();

        let frame = baseline_frame(&fitted, 3, &logistic).unwrap();
        assert_eq!(frame.cap().unwrap(), &[6.0; 7]);
        assert!(baseline_frame(&fitted, 3, &series).unwrap().cap().is_none());
    }

    #[test]
    fn dataframe_view_has_all_columns() {
        let (fitted, series) = series(3);
        let df = build_horizon(&fitted, 1, &series, &future(3, 3, 1.0), &temp(), GapPolicy::Fail)
            .unwrap()
            .with_capacity(9.0)
            .to_dataframe()
            .unwrap();
        assert_eq!(df.get_column_names(), vec!["ds", "temp", "cap"]);
        assert_eq!(df.height(), 4);
    }
}
