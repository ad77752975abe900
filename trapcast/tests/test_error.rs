use std::io;
use trapcast::error::ForecastError;
use trapcast::DashboardConfig;

#[test]
fn test_error_conversion() {
    // Test IO error conversion
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    let forecast_error = ForecastError::from(io_error);

    match forecast_error {
        ForecastError::IoError(_) => {}
        _ => panic!("Expected IoError variant"),
    }

    // Test TOML error conversion
    let toml_error = toml::from_str::<DashboardConfig>("gap_policy = [").unwrap_err();
    match ForecastError::from(toml_error) {
        ForecastError::ConfigParse(_) => {}
        _ => panic!("Expected ConfigParse variant"),
    }

    // Test Polars error conversion
    let polars_error = polars::prelude::PolarsError::ColumnNotFound("y".into());
    match ForecastError::from(polars_error) {
        ForecastError::PolarsError(message) => assert!(message.contains('y')),
        _ => panic!("Expected PolarsError variant"),
    }
}

#[test]
fn test_error_display() {
    let error = ForecastError::Retrieval("Cicalino".to_string());
    assert_eq!(error.to_string(), "Error retrieving data for Cicalino");

    let error = ForecastError::Configuration("Logistic growth requires a capacity column".to_string());
    let error_string = format!("{}", error);
    assert!(error_string.contains("Configuration error"));
    assert!(error_string.contains("capacity"));

    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
    let error = ForecastError::from(io_error);
    let error_string = format!("{}", error);

    assert!(error_string.contains("IO error"));
    assert!(error_string.contains("permission denied"));
}

#[test]
fn test_config_file_errors() {
    let missing = DashboardConfig::from_file("/no/such/dashboard.toml").unwrap_err();
    assert!(matches!(missing, ForecastError::IoError(_)));

    let malformed = DashboardConfig::from_toml_str("[defaults]\nsite = \"Bologna\"\n").unwrap_err();
    assert!(matches!(malformed, ForecastError::ConfigParse(_)));
}
