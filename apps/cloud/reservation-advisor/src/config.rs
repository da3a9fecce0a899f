//! Configuration for the reservation advisor

use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use domain_reservations::inventory::RUNNING_STATE;
use domain_reservations::matcher::{BACKFILL_FLOOR, MIN_SELECTED, SAVINGS_THRESHOLD};
use std::path::PathBuf;
use std::time::Duration;

/// Azure Retail Prices API endpoint
pub const RETAIL_PRICES_API: &str = "https://prices.azure.com/api/retail/prices";
/// Catalog site that renders Windows VM prices
pub const CATALOG_BASE_URL: &str = "https://instances.vantage.sh";
/// Directory name pattern of inventory report exports
pub const REPORT_PATTERN: &str = "AzureResourceInventory_Report_*";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory searched for inventory report exports
    pub input_dir: PathBuf,
    pub report_pattern: String,
    /// Directory all artifacts and reports are written to
    pub output_dir: PathBuf,
    pub matching: MatchingConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Power state a VM must report to be considered
    pub running_state: String,
    pub savings_threshold: f64,
    pub min_selected: usize,
    pub backfill_floor: f64,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub retail_prices_url: String,
    pub catalog_base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            retail_prices_url: RETAIL_PRICES_API.to_string(),
            catalog_base_url: CATALOG_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: default_user_agent(),
        }
    }
}

fn default_user_agent() -> String {
    format!("reservation-advisor/{}", env!("CARGO_PKG_VERSION"))
}

impl FromEnv for Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError> {
        let matching = MatchingConfig {
            running_state: env_or_default("RESERVATION_RUNNING_STATE", RUNNING_STATE),
            savings_threshold: env_parse("RESERVATION_SAVINGS_THRESHOLD", SAVINGS_THRESHOLD)?,
            min_selected: env_parse("RESERVATION_MIN_SELECTED", MIN_SELECTED)?,
            backfill_floor: env_parse("RESERVATION_BACKFILL_FLOOR", BACKFILL_FLOOR)?,
        };

        let http = HttpConfig {
            retail_prices_url: env_or_default("AZURE_RETAIL_PRICES_URL", RETAIL_PRICES_API),
            catalog_base_url: env_or_default("CATALOG_BASE_URL", CATALOG_BASE_URL),
            timeout: Duration::from_secs(env_parse("HTTP_TIMEOUT_SECS", 30u64)?),
            user_agent: env_or_default("HTTP_USER_AGENT", &default_user_agent()),
        };

        Ok(Config {
            input_dir: PathBuf::from(env_or_default("RESERVATION_INPUT_DIR", ".")),
            report_pattern: env_or_default("RESERVATION_REPORT_PATTERN", REPORT_PATTERN),
            output_dir: PathBuf::from(env_or_default("RESERVATION_OUTPUT_DIR", ".")),
            matching,
            http,
        })
    }
}

impl Config {
    /// Apply command line overrides on top of the environment
    pub fn with_overrides(mut self, input_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = input_dir {
            self.input_dir = dir;
        }
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        self
    }
}
