//! Optional RON configuration file; command-line flags override it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use catalog_core::DEFAULT_RELOAD_ATTEMPTS;
use catalog_engine::{ExtractSettings, TransportSettings, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};

use crate::logging::LogDestination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub reload_attempts: u8,
    pub retry_budget: u8,
    pub concurrency: usize,
    pub output_dir: PathBuf,
    pub log: LogDestination,
    pub log_file: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        let extract = ExtractSettings::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            request_timeout_secs: transport.request_timeout.as_secs(),
            reload_attempts: DEFAULT_RELOAD_ATTEMPTS,
            retry_budget: extract.retry_budget,
            concurrency: extract.concurrency,
            output_dir: PathBuf::from("downloads"),
            log: LogDestination::Terminal,
            log_file: PathBuf::from("./catalog-harvest.log"),
        }
    }
}

impl AppConfig {
    /// Reads `path`; any key left out keeps its default.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        ron::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportSettings::default()
        }
    }

    pub fn extract(&self) -> ExtractSettings {
        ExtractSettings {
            retry_budget: self.retry_budget,
            concurrency: self.concurrency,
        }
    }
}
