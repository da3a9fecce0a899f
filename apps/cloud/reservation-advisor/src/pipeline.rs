//! Reservation Pipeline
//!
//! Orchestrates the two phases: recommendation matching from an inventory
//! report, then pricing of the matches from the canonical and catalog sources.

use chrono::{DateTime, Utc};
use domain_reservations::{
    AssembledReports, CanonicalPricing, InventoryIndexer, MatchEntry, PageSource, PriceSource,
    RecommendationSummary, ReportAssembler, ReportRow, ReservationResult, SavingsMatcher,
    SavingsOpportunity, SecondaryPriceScraper, SecondaryPriceTable, SkuRegionKey,
};
use eyre::{Result, eyre};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{error, info};

use crate::artifacts::{
    ArtifactStore, ESTIMATE_FILE, MATCHES_FILE, RANKED_FILE, SAVINGS_FILE, SAVINGS_FLAT_FILE,
    SECONDARY_PRICES_FILE, WINDOWS_KEYS_FILE,
};
use crate::config::Config;
use crate::providers::{CatalogPageClient, RetailPricesClient, http_client};
use crate::workbook::InventoryReport;

const CANONICAL_TASK: &str = "Azure Retail Prices";
const SECONDARY_TASK: &str = "Catalog scraping";

/// Result of the recommendation phase
#[derive(Debug, Clone, Serialize)]
pub struct RecommendResult {
    pub report: PathBuf,
    pub summary: RecommendationSummary,
    pub selected: usize,
    pub timestamp: DateTime<Utc>,
}

/// Result of the pricing phase
#[derive(Debug, Clone, Serialize)]
pub struct PricingResult {
    pub matches: usize,
    pub estimate_rows: usize,
    pub windows_keys: usize,
    pub ranked_vms: usize,
    pub files: Vec<PathBuf>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Outcomes of both pricing tasks, collected after each has finished
struct PricingJoin {
    canonical: std::result::Result<Vec<ReportRow>, String>,
    secondary: std::result::Result<SecondaryPriceTable, String>,
}

impl PricingJoin {
    fn new(
        canonical: std::result::Result<ReservationResult<Vec<ReportRow>>, JoinError>,
        secondary: std::result::Result<SecondaryPriceTable, JoinError>,
    ) -> Self {
        Self {
            canonical: match canonical {
                Ok(Ok(rows)) => Ok(rows),
                Ok(Err(e)) => Err(e.to_string()),
                Err(e) => Err(format!("task did not complete: {}", e)),
            },
            secondary: secondary.map_err(|e| format!("task did not complete: {}", e)),
        }
    }

    /// Both results, or one error naming every task that failed
    fn into_results(self) -> Result<(Vec<ReportRow>, SecondaryPriceTable)> {
        match (self.canonical, self.secondary) {
            (Ok(rows), Ok(table)) => Ok((rows, table)),
            (canonical, secondary) => {
                let failures: Vec<String> = [
                    (CANONICAL_TASK, canonical.err()),
                    (SECONDARY_TASK, secondary.err()),
                ]
                .into_iter()
                .filter_map(|(task, err)| err.map(|e| format!("{}: {}", task, e)))
                .collect();

                for failure in &failures {
                    error!(failure = %failure, "Pricing task failed");
                }
                Err(eyre!("Pricing tasks failed: {}", failures.join("; ")))
            }
        }
    }
}

/// Main reservation pipeline
pub struct ReservationPipeline {
    config: Config,
    store: ArtifactStore,
}

impl ReservationPipeline {
    pub fn new(config: Config) -> Result<Self> {
        let store = ArtifactStore::new(&config.output_dir)?;
        Ok(Self { config, store })
    }

    /// Phase 1: match advisor opportunities to running VMs and write the hand-off files
    pub fn recommend(&self) -> Result<RecommendResult> {
        let report = InventoryReport::locate(&self.config.input_dir, &self.config.report_pattern)?;
        let sheet = report.vm_sheet()?;
        let opportunities: Vec<SavingsOpportunity> = report
            .advisor_rows()?
            .into_iter()
            .enumerate()
            .map(|(sequence, row)| SavingsOpportunity::from_row(row, sequence))
            .collect();

        let index = InventoryIndexer::new(self.config.matching.running_state.as_str()).index(&sheet);
        let matching = &self.config.matching;
        let outcome = SavingsMatcher::new(
            matching.savings_threshold,
            matching.min_selected,
            matching.backfill_floor,
        )
        .run(&opportunities, &index);

        let summary = outcome.summary();
        info!(
            unique_skus = summary.unique_skus,
            total_vms = summary.total_vms,
            os_distribution = ?summary.os_distribution,
            "Recommendation summary"
        );
        info!(
            total_vms = summary.impact.total_vms,
            total_savings = summary.impact.total_savings,
            average_savings = summary.impact.average_savings,
            "Impact summary"
        );

        self.store.write_recommendations(&outcome.selected)?;
        self.store.write_json(MATCHES_FILE, &outcome.match_entries())?;

        Ok(RecommendResult {
            report: report.dir,
            selected: outcome.selected.len(),
            summary,
            timestamp: Utc::now(),
        })
    }

    /// Phase 2 against the configured HTTP sources
    pub async fn price(&self) -> Result<PricingResult> {
        let http = &self.config.http;
        let client = http_client(http.timeout, &http.user_agent)?;

        let canonical = RetailPricesClient::new(client.clone(), http.retail_prices_url.as_str());
        let pages = CatalogPageClient::new(client, http.catalog_base_url.as_str());
        self.price_with(canonical, pages).await
    }

    /// Phase 2: price the matches from both sources concurrently and write the reports
    pub async fn price_with<S, P>(&self, canonical: S, pages: P) -> Result<PricingResult>
    where
        S: PriceSource + 'static,
        P: PageSource + 'static,
    {
        let start = Instant::now();
        let entries = self.store.read_matches()?;
        let keys: BTreeSet<SkuRegionKey> =
            entries.iter().filter_map(MatchEntry::secondary_key).collect();

        info!(
            matches = entries.len(),
            windows_keys = keys.len(),
            "Starting canonical and catalog pricing"
        );
        let mut files = vec![self.store.write_json(WINDOWS_KEYS_FILE, &keys)?];

        let windows_keys = keys.len();
        let matches = entries.len();

        let canonical_task = tokio::spawn(async move {
            CanonicalPricing::new(canonical).estimate(&entries).await
        });
        let secondary_task =
            tokio::spawn(async move { SecondaryPriceScraper::new(pages).scrape(&keys).await });

        let (canonical, secondary) = tokio::join!(canonical_task, secondary_task);
        let (rows, table) = PricingJoin::new(canonical, secondary).into_results()?;
        info!(estimate_rows = rows.len(), priced_keys = table.len(), "Both pricing tasks completed");

        files.push(self.store.write_json(SECONDARY_PRICES_FILE, &table)?);

        let estimate_rows = rows.len();
        let reports = ReportAssembler::assemble(rows, &table);
        files.extend(self.write_reports(&reports)?);

        Ok(PricingResult {
            matches,
            estimate_rows,
            windows_keys,
            ranked_vms: reports.ranked.len(),
            files,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }

    fn write_reports(&self, reports: &AssembledReports) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.store.write_csv(ESTIMATE_FILE, &reports.estimate.rows)?,
            self.store.write_csv(SAVINGS_FILE, &reports.savings.rows)?,
            self.store.write_csv(SAVINGS_FLAT_FILE, &reports.savings_flat.rows)?,
            self.store.write_csv(RANKED_FILE, &reports.ranked)?,
        ])
    }
}
