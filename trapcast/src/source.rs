//! Retrieval of the four CSV tables of a monitoring site

use crate::cache::{fingerprint, SessionCache};
use crate::config::{ColumnConfig, SiteSources, SourcesConfig};
use crate::data::{DataLoader, TableSpec, TimeSeriesData};
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Message reported when a site's device history is empty
pub const NO_DATA: &str = "No data available";

/// Monitoring site with two trap devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    #[default]
    Cicalino,
    Imola,
}

impl Site {
    /// All sites, sorted by name
    pub fn all() -> Vec<Site> {
        let mut sites = vec![Site::Imola, Site::Cicalino];
        sites.sort_by_key(|s| s.name());
        sites
    }

    pub fn name(&self) -> &'static str {
        match self {
            Site::Cicalino => "Cicalino",
            Site::Imola => "Imola",
        }
    }

    /// Display names of the two devices, e.g. "Imola 1"
    pub fn device_names(&self) -> [String; 2] {
        [format!("{} 1", self.name()), format!("{} 2", self.name())]
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Site::all()
            .into_iter()
            .find(|site| site.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown site: {}", s))
    }
}

/// Reads the raw bytes of a CSV resource
pub trait CsvFetcher {
    fn fetch_csv(&self, location: &str) -> Result<Vec<u8>>;
}

/// Downloads `http(s)://` locations and reads anything else from disk
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("trapcast/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl CsvFetcher for HttpFetcher {
    fn fetch_csv(&self, location: &str) -> Result<Vec<u8>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            debug!(location, "downloading table");
            let response = self.client.get(location).send()?.error_for_status()?;
            Ok(response.bytes()?.to_vec())
        } else {
            debug!(location, "reading table from disk");
            Ok(std::fs::read(location)?)
        }
    }
}

/// The four tables of one site
#[derive(Debug, Clone)]
pub struct SiteData {
    pub site: Site,
    pub device_1: TimeSeriesData,
    pub device_2: TimeSeriesData,
    pub future_1: TimeSeriesData,
    pub future_2: TimeSeriesData,
}

impl SiteData {
    /// `(device name, history, future covariates)` for each device
    pub fn devices(&self) -> [(String, &TimeSeriesData, &TimeSeriesData); 2] {
        let [first, second] = self.site.device_names();
        [
            (first, &self.device_1, &self.future_1),
            (second, &self.device_2, &self.future_2),
        ]
    }
}

/// Site data adapter with a per-session cache
///
/// Failures are reported through the log and [`DataSource::last_error`];
/// callers only see whether data is available.
#[derive(Debug)]
pub struct DataSource<F: CsvFetcher> {
    fetcher: F,
    sources: SourcesConfig,
    columns: ColumnConfig,
    cache: SessionCache<SiteData>,
    last_error: Option<String>,
}

impl<F: CsvFetcher> DataSource<F> {
    pub fn new(fetcher: F, sources: SourcesConfig, columns: ColumnConfig) -> Self {
        Self {
            fetcher,
            sources,
            columns,
            cache: SessionCache::new(),
            last_error: None,
        }
    }

    /// Fetch and parse the four tables of `site`, or `None` when unavailable
    pub fn fetch(&mut self, site: Site) -> Option<Arc<SiteData>> {
        let sources = self.sources.for_site(site);
        let key = fingerprint(&(site, sources, &self.columns));
        let fetcher = &self.fetcher;
        let columns = &self.columns;

        match self
            .cache
            .get_or_try_insert_with(key, || load_site(fetcher, site, sources, columns))
        {
            Ok(data) => {
                self.last_error = None;
                Some(data)
            }
            Err(err) => {
                let message = match &err {
                    ForecastError::DataError(m) if m == NO_DATA => m.clone(),
                    _ => ForecastError::Retrieval(site.to_string()).to_string(),
                };
                error!(site = %site, cause = %err, "{}", message);
                self.last_error = Some(message);
                None
            }
        }
    }

    /// Message of the most recent failed fetch, cleared by a successful one
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of sites held in the session cache
    pub fn cached_sites(&self) -> usize {
        self.cache.len()
    }
}

fn load_site<F: CsvFetcher>(
    fetcher: &F,
    site: Site,
    sources: &SiteSources,
    columns: &ColumnConfig,
) -> Result<SiteData> {
    info!(site = %site, "retrieving site data");
    let device = TableSpec::series(Some(columns.time.as_str()), &columns.value);
    let future = TableSpec::covariates(Some(columns.future_time.as_str()));

    let device_1 = DataLoader::from_csv_bytes(fetcher.fetch_csv(&sources.device_1)?, &device)?;
    let device_2 = DataLoader::from_csv_bytes(fetcher.fetch_csv(&sources.device_2)?, &device)?;
    if device_1.is_empty() || device_2.is_empty() {
        return Err(ForecastError::DataError(NO_DATA.to_string()));
    }

    let future_1 = DataLoader::from_csv_bytes(fetcher.fetch_csv(&sources.future_1)?, &future)?;
    let future_2 = DataLoader::from_csv_bytes(fetcher.fetch_csv(&sources.future_2)?, &future)?;

    debug!(
        site = %site,
        device_1 = device_1.len(),
        device_2 = device_2.len(),
        future_1 = future_1.len(),
        future_2 = future_2.len(),
        "site tables loaded"
    );

    Ok(SiteData {
        site,
        device_1,
        device_2,
        future_1,
        future_2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::io::Write;
    use std::rc::Rc;

    const DEVICE: &str = "DateTime,Numero di insetti,Evento\n2024-05-01,2,0\n2024-05-02,3,1\n";
    const EMPTY_DEVICE: &str = "DateTime,Numero di insetti,Evento\n";
    const FUTURE: &str = "ds,Evento\n2024-05-03,0\n";

    #[derive(Default, Clone)]
    struct MemoryFetcher {
        files: Rc<RefCell<HashMap<String, String>>>,
        calls: Rc<Cell<usize>>,
    }

    impl MemoryFetcher {
        fn put(&self, location: &str, content: &str) {
            self.files.borrow_mut().insert(location.to_string(), content.to_string());
        }
    }

    impl CsvFetcher for MemoryFetcher {
        fn fetch_csv(&self, location: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.files
                .borrow()
                .get(location)
                .map(|s| s.as_bytes().to_vec())
                .ok_or_else(|| ForecastError::HttpError(format!("404 for {}", location)))
        }
    }

    fn sources() -> SourcesConfig {
        let site = |name: &str| SiteSources {
            device_1: format!("{}/1.csv", name),
            device_2: format!("{}/2.csv", name),
            future_1: format!("{}/1_future.csv", name),
            future_2: format!("{}/2_future.csv", name),
        };
        SourcesConfig {
            cicalino: site("cicalino"),
            imola: site("imola"),
        }
    }

    fn populate(fetcher: &MemoryFetcher, site: &str, device: &str) {
        fetcher.put(&format!("{}/1.csv", site), device);
        fetcher.put(&format!("{}/2.csv", site), device);
        fetcher.put(&format!("{}/1_future.csv", site), FUTURE);
        fetcher.put(&format!("{}/2_future.csv", site), FUTURE);
    }

    #[test]
    fn sites_are_sorted_and_parse() {
        assert_eq!(Site::all(), vec![Site::Cicalino, Site::Imola]);
        assert_eq!("imola".parse::<Site>().unwrap(), Site::Imola);
        assert!("Bologna".parse::<Site>().is_err());
        assert_eq!(Site::Cicalino.device_names(), ["Cicalino 1".to_string(), "Cicalino 2".to_string()]);
    }

    #[test]
    fn fetch_is_cached_per_site() {
        let fetcher = MemoryFetcher::default();
        populate(&fetcher, "cicalino", DEVICE);
        let mut source = DataSource::new(fetcher.clone(), sources(), ColumnConfig::default());

        let first = source.fetch(Site::Cicalino).unwrap();
        let second = source.fetch(Site::Cicalino).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls.get(), 4);
        assert_eq!(first.device_1.len(), 2);
        assert_eq!(first.devices()[1].0, "Cicalino 2");
        assert!(source.last_error().is_none());
    }

    #[test]
    fn unavailable_site_yields_none_and_is_retried() {
        let fetcher = MemoryFetcher::default();
        let mut source = DataSource::new(fetcher.clone(), sources(), ColumnConfig::default());

        assert!(source.fetch(Site::Imola).is_none());
        assert_eq!(source.last_error(), Some("Error retrieving data for Imola"));
        assert_eq!(source.cached_sites(), 0);

        populate(&fetcher, "imola", DEVICE);
        assert!(source.fetch(Site::Imola).is_some());
        assert!(source.last_error().is_none());
    }

    #[test]
    fn empty_history_is_no_data() {
        let fetcher = MemoryFetcher::default();
        populate(&fetcher, "imola", EMPTY_DEVICE);
        let mut source = DataSource::new(fetcher, sources(), ColumnConfig::default());

        assert!(source.fetch(Site::Imola).is_none());
        assert_eq!(source.last_error(), Some(NO_DATA));
    }

    #[test]
    fn http_fetcher_reads_local_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", DEVICE).unwrap();

        let fetcher = HttpFetcher::new().unwrap();
        let bytes = fetcher.fetch_csv(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bytes, DEVICE.as_bytes());
        assert!(fetcher.fetch_csv("/definitely/not/here.csv").is_err());
    }
}
