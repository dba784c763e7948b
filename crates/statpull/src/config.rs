//! Endpoint and output-directory configuration.
//!
//! Nothing here is global: a [`Config`] is built once by the caller and the
//! relevant section is handed to each connector.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sources::iea::PageLayout;

pub const EUROSTAT_URL: &str = "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data/";
pub const ILO_URL: &str = "https://sdmx.ilo.org/rest/data/ILO,DF_";
pub const WORLD_BANK_URL: &str = "https://api.worldbank.org/v2/country/all/indicator/";
pub const IEA_URL: &str =
    "https://www.iea.org/data-and-statistics/data-tools/energy-statistics-data-browser";

/// Browser waits give up after this long.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 3_000;

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 60_000;

/// Environment variable that overrides the output root.
pub const OUT_DIR_ENV: &str = "STATPULL_OUT_DIR";

/// Where a REST source lives and where its tables are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub out_dir: PathBuf,
}

impl SourceConfig {
    pub fn new(base_url: &str, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.to_string(),
            out_dir: out_dir.into(),
        }
    }

    /// `{out_dir}/{dataset}.csv`
    pub fn output_path(&self, dataset: &str) -> PathBuf {
        self.out_dir.join(format!("{dataset}.csv"))
    }
}

/// Settings for the browser-driven IEA connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IeaConfig {
    pub url: String,
    pub out_dir: PathBuf,
    pub wait_timeout_ms: u64,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    pub layout: PageLayout,
}

impl IeaConfig {
    pub fn data_path(&self) -> PathBuf {
        self.out_dir.join("iea_data.csv")
    }

    /// Path of a memoized lookup list, e.g. `iea_countries.csv`.
    pub fn lookup_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(format!("iea_{name}.csv"))
    }
}

impl Default for IeaConfig {
    fn default() -> Self {
        Self {
            url: IEA_URL.to_string(),
            out_dir: PathBuf::from("IEA"),
            wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            headless: true,
            chromium_path: None,
            layout: PageLayout::default(),
        }
    }
}

/// Full configuration for all connectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub eurostat: SourceConfig,
    pub ilo: SourceConfig,
    pub world_bank: SourceConfig,
    pub iea: IeaConfig,
    pub http_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eurostat: SourceConfig::new(EUROSTAT_URL, "Raw"),
            ilo: SourceConfig::new(ILO_URL, "ILO/Raw"),
            world_bank: SourceConfig::new(WORLD_BANK_URL, "World Bank/Raw"),
            iea: IeaConfig::default(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Default endpoints with every output directory placed under `root`.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        for dir in [
            &mut config.eurostat.out_dir,
            &mut config.ilo.out_dir,
            &mut config.world_bank.out_dir,
            &mut config.iea.out_dir,
        ] {
            *dir = root.join(&*dir);
        }
        config
    }
}

/// Resolve the output root: explicit flag, then `STATPULL_OUT_DIR`, then `.`.
pub fn resolve_out_root(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(OUT_DIR_ENV) {
        if !env_path.is_empty() {
            return PathBuf::from(env_path);
        }
    }

    PathBuf::from(".")
}
