//! Canonical pricing: fetch, classify and turn matches into estimate rows.

use tracing::{info, warn};

use crate::classifier::{
    ClassifiedPrices, PriceClassifier, payg_monthly_cost, reservation_monthly_cost,
};
use crate::error::ReservationResult;
use crate::fetcher::{PriceQuoteFetcher, PriceSource};
use crate::models::MatchEntry;
use crate::money::Money;
use crate::report::{ReportRow, RowKind, SERVICE_CATEGORY, SERVICE_TYPE};

/// The canonical half of the pricing phase.
///
/// Owns its fetcher, so lookups for repeated (SKU, region) pairs are served
/// from memory for the rest of the run.
pub struct CanonicalPricing<S> {
    fetcher: PriceQuoteFetcher<S>,
}

impl<S: PriceSource> CanonicalPricing<S> {
    pub fn new(source: S) -> Self {
        Self {
            fetcher: PriceQuoteFetcher::new(source),
        }
    }

    /// Estimate rows for every entry, in entry order.
    ///
    /// Pairs without pricing data are skipped. Transport failures abort.
    pub async fn estimate(&mut self, entries: &[MatchEntry]) -> ReservationResult<Vec<ReportRow>> {
        let mut rows = Vec::new();
        let total = entries.len();

        for (idx, entry) in entries.iter().enumerate() {
            info!(
                sku = %entry.sku,
                region = %entry.region,
                os = %entry.os,
                progress = idx + 1,
                total = total,
                "Fetching canonical prices"
            );

            let items = self.fetcher.fetch(&entry.sku, &entry.region).await?;
            if items.is_empty() {
                warn!(sku = %entry.sku, region = %entry.region, "No pricing data returned");
                continue;
            }

            let classified = PriceClassifier::classify(items, entry.os_family());
            if classified.is_empty() {
                warn!(
                    sku = %entry.sku,
                    region = %entry.region,
                    os = %entry.os,
                    "No price items match the VM's OS"
                );
            }
            rows.extend(estimate_rows(entry, &classified));
        }

        info!(
            rows = rows.len(),
            pairs = self.fetcher.cached_pairs(),
            cache_hits = self.fetcher.cache_hits(),
            "Canonical pricing complete"
        );
        Ok(rows)
    }

    pub fn fetcher(&self) -> &PriceQuoteFetcher<S> {
        &self.fetcher
    }
}

/// One row per classified item: pay-as-you-go first, then reservations.
pub fn estimate_rows(entry: &MatchEntry, classified: &ClassifiedPrices) -> Vec<ReportRow> {
    let payg = classified.payg.iter().map(|item| {
        entry_row(
            entry,
            format!(
                "1 {} ({}), {}, Pay-as-you-go",
                item.meter_name, entry.sku, entry.os
            ),
            Some(payg_monthly_cost(item.unit_price)),
        )
    });

    let reservations = classified.reservations.iter().map(|item| {
        entry_row(
            entry,
            format!(
                "1 {} ({}) ({}), {} Reservation",
                item.meter_name,
                entry.sku,
                item.term(),
                entry.os
            ),
            Some(reservation_monthly_cost(item.unit_price, item.term())),
        )
    });

    payg.chain(reservations).collect()
}

fn entry_row(entry: &MatchEntry, description: String, monthly_cost: Option<Money>) -> ReportRow {
    ReportRow {
        service_category: SERVICE_CATEGORY.to_string(),
        service_type: SERVICE_TYPE.to_string(),
        vm_name: entry.vm_name.clone(),
        tags: entry.tags.clone(),
        region: entry.region.clone(),
        os: entry.os.clone(),
        os_name: entry.os_name.clone(),
        sku: entry.report_sku(),
        kind: RowKind::from_description(&description),
        description,
        monthly_cost,
    }
}
