//! Trap readings and covariate tables backed by polars data frames

use crate::error::{ForecastError, Result};
use crate::utils::{date_parser, from_epoch_days, to_epoch_days};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

/// Name of the saturating-capacity column attached for logistic growth
pub const CAP_COLUMN: &str = "cap";

/// Which columns of a CSV table carry the dates and the target counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSpec {
    /// Date column; detected from the header when absent
    pub time_column: Option<String>,
    /// Target column; `None` for covariate-only tables
    pub value_column: Option<String>,
}

impl TableSpec {
    /// A device series with a count column
    pub fn series(time_column: Option<&str>, value_column: &str) -> Self {
        Self {
            time_column: time_column.map(str::to_string),
            value_column: Some(value_column.to_string()),
        }
    }

    /// A table of known-in-advance covariates, keyed by date
    pub fn covariates(time_column: Option<&str>) -> Self {
        Self {
            time_column: time_column.map(str::to_string),
            value_column: None,
        }
    }
}

/// Daily table for one device (or its future covariates)
///
/// The date column is always stored with the polars `Date` type.
#[derive(Debug, Clone)]
pub struct TimeSeriesData {
    /// Data frame containing the table
    df: DataFrame,
    /// Name of the date column
    time_column: String,
    /// Name of the target count column, absent for covariate tables
    value_column: Option<String>,
}

/// Loader for trap tables
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, spec: &TableSpec) -> Result<TimeSeriesData> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df, spec)
    }

    /// Load a table from CSV bytes, as downloaded
    pub fn from_csv_bytes(bytes: Vec<u8>, spec: &TableSpec) -> Result<TimeSeriesData> {
        let df = CsvReader::new(Cursor::new(bytes))
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        Self::from_dataframe(df, spec)
    }

    /// Create a table from an existing DataFrame
    pub fn from_dataframe(mut df: DataFrame, spec: &TableSpec) -> Result<TimeSeriesData> {
        let time_column = match &spec.time_column {
            Some(name) if df.get_column_names().contains(&name.as_str()) => name.clone(),
            Some(name) => {
                return Err(ForecastError::DataError(format!(
                    "Date column '{}' not found in data",
                    name
                )))
            }
            None => Self::detect_time_column(&df)?,
        };

        if let Some(value) = &spec.value_column {
            if !df.get_column_names().contains(&value.as_str()) {
                return Err(ForecastError::DataError(format!(
                    "Count column '{}' not found in data",
                    value
                )));
            }
        }

        let dates = Self::parse_date_column(df.column(&time_column)?)?;
        df.replace(&time_column, dates)?;

        Ok(TimeSeriesData {
            df,
            time_column,
            value_column: spec.value_column.clone(),
        })
    }

    /// Detect the date column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        let column_names = df.get_column_names();

        for name in &column_names {
            let lower_name = name.to_lowercase();
            if lower_name == "ds"
                || lower_name.contains("time")
                || lower_name.contains("date")
                || lower_name.contains("timestamp")
            {
                return Ok(name.to_string());
            }
        }

        // If not found, use the first column if it looks like a date/time
        if let Some(first_col) = df.get_columns().first() {
            if first_col.dtype().is_temporal() {
                return Ok(first_col.name().to_string());
            }
        }

        Err(ForecastError::DataError(
            "No time column found in data".to_string(),
        ))
    }

    /// Convert a textual or datetime column into a `Date` column
    fn parse_date_column(column: &Series) -> Result<Series> {
        match column.dtype() {
            DataType::Date => Ok(column.clone()),
            DataType::Datetime(_, _) => Ok(column.cast(&DataType::Date)?),
            DataType::Utf8 => {
                let days = column
                    .utf8()?
                    .into_iter()
                    .map(|value| match value {
                        Some(text) => date_parser::parse_date(text).map(|d| Some(to_epoch_days(d))),
                        None => Ok(None),
                    })
                    .collect::<Result<Vec<Option<i32>>>>()?;
                Ok(Series::new(column.name(), days).cast(&DataType::Date)?)
            }
            other => Err(ForecastError::DataError(format!(
                "Column '{}' of type {} cannot hold dates",
                column.name(),
                other
            ))),
        }
    }
}

impl TimeSeriesData {
    /// Wrap a DataFrame whose time column is already `Date` typed
    pub fn create_new(df: DataFrame, time_column: String, value_column: Option<String>) -> Self {
        Self {
            df,
            time_column,
            value_column,
        }
    }

    /// Create a device series from dates and counts (for testing)
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }

        let df = DataFrame::new(vec![
            date_series("date", &dates)?,
            Series::new("value", values),
        ])?;

        Ok(Self {
            df,
            time_column: "date".to_string(),
            value_column: Some("value".to_string()),
        })
    }

    /// Create an empty covariate table over the given dates (for testing)
    pub fn covariates_only(dates: Vec<NaiveDate>) -> Result<Self> {
        let df = DataFrame::new(vec![date_series("ds", &dates)?])?;

        Ok(Self {
            df,
            time_column: "ds".to_string(),
            value_column: None,
        })
    }

    /// Add or replace a numeric column
    pub fn with_column(mut self, name: &str, values: Vec<Option<f64>>) -> Result<Self> {
        if values.len() != self.len() {
            return Err(ForecastError::DataError(format!(
                "Column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.len()
            )));
        }
        self.df.with_column(Series::new(name, values))?;
        Ok(self)
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the date column name
    pub fn time_column(&self) -> &str {
        &self.time_column
    }

    /// Get the count column name
    pub fn value_column(&self) -> Option<&str> {
        self.value_column.as_deref()
    }

    /// Dates of every row, in table order
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let days = self
            .df
            .column(&self.time_column)?
            .cast(&DataType::Int32)?;

        days.i32()?
            .into_iter()
            .enumerate()
            .map(|(row, day)| match day {
                Some(day) => from_epoch_days(day),
                None => Err(ForecastError::DataError(format!(
                    "Missing date in column '{}' at row {}",
                    self.time_column, row
                ))),
            })
            .collect()
    }

    /// Target counts, with gaps preserved
    pub fn values(&self) -> Result<Vec<Option<f64>>> {
        match &self.value_column {
            Some(name) => self.column_as_f64(name),
            None => Err(ForecastError::DataError(
                "Table has no count column".to_string(),
            )),
        }
    }

    /// Most recent non-missing count
    pub fn last_observed_value(&self) -> Result<Option<f64>> {
        Ok(self.values()?.into_iter().rev().flatten().next())
    }

    /// Numeric columns other than the date, count and capacity columns
    pub fn covariate_columns(&self) -> Vec<String> {
        self.df
            .get_columns()
            .iter()
            .filter(|s| s.name() != self.time_column)
            .filter(|s| Some(s.name()) != self.value_column.as_deref())
            .filter(|s| s.name() != CAP_COLUMN)
            .filter(|s| s.dtype().is_numeric() || s.dtype() == &DataType::Boolean)
            .map(|s| s.name().to_string())
            .collect()
    }

    /// Whether the table has a column with this name
    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().contains(&name)
    }

    /// Get a numeric column as optional f64 values
    pub fn column_as_f64(&self, column_name: &str) -> Result<Vec<Option<f64>>> {
        let col = self.df.column(column_name).map_err(|e| {
            ForecastError::DataError(format!("Column '{}' not found: {}", column_name, e))
        })?;

        if !(col.dtype().is_numeric() || col.dtype() == &DataType::Boolean) {
            return Err(ForecastError::DataError(format!(
                "Column '{}' cannot be converted to f64",
                column_name
            )));
        }

        let floats = col.cast(&DataType::Float64)?;
        let values = floats.f64()?.into_iter().collect();
        Ok(values)
    }

    /// The columns shown in the data tables, in the order given
    pub fn display_frame(&self, covariates: &[String]) -> Result<DataFrame> {
        let mut columns = vec![self.time_column.clone()];
        columns.extend(self.value_column.clone());
        columns.extend(covariates.iter().filter(|c| self.has_column(c)).cloned());
        Ok(self.df.select(columns)?)
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get the number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }
}

/// Build a polars `Date` series from calendar dates
pub(crate) fn date_series(name: &str, dates: &[NaiveDate]) -> Result<Series> {
    let days: Vec<i32> = dates.iter().map(|d| to_epoch_days(*d)).collect();
    Ok(Series::new(name, days).cast(&DataType::Date)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DEVICE_CSV: &str = "DateTime,Numero di insetti,Evento,Temperatura Minima,Temperatura Massima,Media Temperatura,Media Umidità
2024-07-01 00:00:00,3,0,18.1,29.4,23.5,61.0
2024-07-02 00:00:00,5,1,17.9,30.2,24.1,58.5
2024-07-03 00:00:00,,0,19.0,31.0,25.0,55.2
";

    fn device_spec() -> TableSpec {
        TableSpec::series(Some("DateTime"), "Numero di insetti")
    }

    #[test]
    fn loads_device_table_with_date_typed_column() {
        let data = DataLoader::from_csv_bytes(DEVICE_CSV.as_bytes().to_vec(), &device_spec()).unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data.dataframe().column("DateTime").unwrap().dtype(), &DataType::Date);
        assert_eq!(
            data.dates().unwrap(),
            vec![
                NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 7, 3).unwrap(),
            ]
        );
        assert_eq!(data.values().unwrap(), vec![Some(3.0), Some(5.0), None]);
        assert_eq!(data.last_observed_value().unwrap(), Some(5.0));
    }

    #[test]
    fn covariates_exclude_date_and_count() {
        let data = DataLoader::from_csv_bytes(DEVICE_CSV.as_bytes().to_vec(), &device_spec()).unwrap();

        assert_eq!(
            data.covariate_columns(),
            vec![
                "Evento",
                "Temperatura Minima",
                "Temperatura Massima",
                "Media Temperatura",
                "Media Umidità",
            ]
        );
    }

    #[test]
    fn detects_ds_as_time_column() {
        let csv = "ds,Evento,Media Temperatura\n2024-07-04,0,22.0\n2024-07-05,1,21.5\n";
        let data =
            DataLoader::from_csv_bytes(csv.as_bytes().to_vec(), &TableSpec::covariates(None)).unwrap();

        assert_eq!(data.time_column(), "ds");
        assert!(data.value_column().is_none());
        assert!(data.values().is_err());
        assert_eq!(data.column_as_f64("Evento").unwrap(), vec![Some(0.0), Some(1.0)]);
    }

    #[test]
    fn missing_count_column_is_a_data_error() {
        let spec = TableSpec::series(Some("DateTime"), "Catches");
        let result = DataLoader::from_csv_bytes(DEVICE_CSV.as_bytes().to_vec(), &spec);
        assert!(matches!(result, Err(ForecastError::DataError(_))));
    }

    #[test]
    fn unparseable_dates_are_rejected() {
        let csv = "DateTime,Numero di insetti\nsoon,3\n";
        let result = DataLoader::from_csv_bytes(csv.as_bytes().to_vec(), &device_spec());
        assert!(result.is_err());
    }

    #[test]
    fn test_constructors_build_consistent_tables() {
        let dates: Vec<NaiveDate> = (1..=3)
            .map(|d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap())
            .collect();
        let data = TimeSeriesData::new(dates.clone(), vec![1.0, 2.0, 4.0])
            .unwrap()
            .with_column("Evento", vec![Some(0.0), None, Some(1.0)])
            .unwrap();

        assert_eq!(data.dates().unwrap(), dates);
        assert_eq!(data.covariate_columns(), vec!["Evento"]);
        assert!(data.clone().with_column("short", vec![Some(1.0)]).is_err());

        let table = data.display_frame(&["Evento".to_string(), "Absent".to_string()]).unwrap();
        assert_eq!(table.get_column_names(), vec!["date", "value", "Evento"]);
    }
}
