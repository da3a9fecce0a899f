//! Output artifacts: JSON hand-off files and CSV tables

use domain_reservations::{
    MatchEntry, RANKED_COLUMNS, REPORT_COLUMNS, RankedVm, Recommendation, ReportRow,
};
use eyre::{Result, WrapErr, eyre};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const RECOMMENDATIONS_FILE: &str = "output.json";
pub const MATCHES_FILE: &str = "inputs.json";
pub const WINDOWS_KEYS_FILE: &str = "skus-regions-windows.json";
pub const SECONDARY_PRICES_FILE: &str = "azure_windows_pricing_data.json";
pub const ESTIMATE_FILE: &str = "azure_estimate.csv";
pub const SAVINGS_FILE: &str = "azure_savings_estimate.csv";
pub const SAVINGS_FLAT_FILE: &str = "azure_savings_estimate_flat.csv";
pub const RANKED_FILE: &str = "ranked_vms.csv";

/// One entry of `output.json`: a single recommendation under its subscription
#[derive(Debug, Serialize)]
pub struct RecommendationEnvelope<'a> {
    #[serde(rename = "Subscription")]
    pub subscription: &'a str,
    #[serde(rename = "Recommendations")]
    pub recommendations: [&'a Recommendation; 1],
}

impl<'a> From<&'a Recommendation> for RecommendationEnvelope<'a> {
    fn from(rec: &'a Recommendation) -> Self {
        Self {
            subscription: &rec.subscription,
            recommendations: [rec],
        }
    }
}

/// A row type written as a CSV table; the header is written even when there are no rows
pub trait TableRecord: Serialize {
    const COLUMNS: &'static [&'static str];
}

impl TableRecord for ReportRow {
    const COLUMNS: &'static [&'static str] = &REPORT_COLUMNS;
}

impl TableRecord for RankedVm {
    const COLUMNS: &'static [&'static str] = &RANKED_COLUMNS;
}

/// Writes artifacts into one output directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .wrap_err_with(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        let file = File::create(&path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        writer
            .flush()
            .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;
        info!(file = %path.display(), "Wrote artifact");
        Ok(path)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.path(name);
        read_json(&path)
    }

    /// Write rows as CSV under the record type's header row
    pub fn write_csv<'a, T, I>(&self, name: &str, rows: I) -> Result<PathBuf>
    where
        T: TableRecord + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let path = self.path(name);
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        writer
            .write_record(T::COLUMNS)
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;

        let mut count = 0usize;
        for row in rows {
            writer
                .serialize(row)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            count += 1;
        }
        writer
            .flush()
            .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;

        info!(file = %path.display(), rows = count, "Wrote table");
        Ok(path)
    }

    pub fn write_recommendations(&self, selected: &[Recommendation]) -> Result<PathBuf> {
        let envelopes: Vec<RecommendationEnvelope<'_>> =
            selected.iter().map(RecommendationEnvelope::from).collect();
        self.write_json(RECOMMENDATIONS_FILE, &envelopes)
    }

    pub fn read_matches(&self) -> Result<Vec<MatchEntry>> {
        self.read_json(MATCHES_FILE)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(eyre!("Could not find {}", path.display()));
    }
    let raw = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("Failed to parse {}", path.display()))
}
