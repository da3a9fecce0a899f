//! Secondary (catalog page) pricing for Windows SKUs
//!
//! The catalog renders each price as a bold paragraph whose parent element
//! carries the label, e.g. `<div><p class="font-bold">$140.16 /mo</p> On Demand</div>`.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::error::{ReservationError, ReservationResult};
use crate::models::SkuRegionKey;

const PRICING_SECTION: &str = "section.mb-4";
const PRICE_VALUE: &str = "p.font-bold";

const ON_DEMAND_LABEL: &str = "on demand";
const ONE_YEAR_LABEL: &str = "1-year reserved";
const THREE_YEAR_LABEL: &str = "3-year reserved";

/// Prices quoted by the catalog for one key, kept as displayed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecondaryPrices {
    #[serde(rename = "On Demand", default, skip_serializing_if = "Option::is_none")]
    pub on_demand: Option<String>,
    #[serde(rename = "1-Year Reserved", default, skip_serializing_if = "Option::is_none")]
    pub one_year: Option<String>,
    #[serde(rename = "3-Year Reserved", default, skip_serializing_if = "Option::is_none")]
    pub three_year: Option<String>,
}

impl SecondaryPrices {
    pub fn is_empty(&self) -> bool {
        self.on_demand.is_none() && self.one_year.is_none() && self.three_year.is_none()
    }
}

/// Catalog prices per key; a key whose page failed maps to empty prices
pub type SecondaryPriceTable = BTreeMap<SkuRegionKey, SecondaryPrices>;

/// Fetches the rendered catalog page for a key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, key: &SkuRegionKey) -> ReservationResult<String>;
}

pub struct SecondaryPriceScraper<P> {
    source: P,
}

impl<P: PageSource> SecondaryPriceScraper<P> {
    pub fn new(source: P) -> Self {
        Self { source }
    }

    /// Scrape every key in sorted order. Never fails as a batch.
    pub async fn scrape(&self, keys: &BTreeSet<SkuRegionKey>) -> SecondaryPriceTable {
        let mut table = SecondaryPriceTable::new();
        let total = keys.len();

        for (idx, key) in keys.iter().enumerate() {
            info!(key = %key, progress = idx + 1, total = total, "Scraping catalog prices");

            let prices = match self.source.fetch_page(key).await {
                Ok(html) => extract_prices(&html).unwrap_or_else(|e| {
                    warn!(key = %key, error = %e, "Could not extract catalog prices");
                    SecondaryPrices::default()
                }),
                Err(e) => {
                    warn!(key = %key, error = %e, "Could not fetch catalog page");
                    SecondaryPrices::default()
                }
            };
            table.insert(key.clone(), prices);
        }

        let priced = table.values().filter(|p| !p.is_empty()).count();
        info!(keys = total, priced = priced, "Catalog scraping complete");
        table
    }
}

/// Pull the on-demand and reserved prices out of a catalog page.
///
/// A page without a pricing section is an error; a section without
/// recognizable labels yields empty prices. Later labels overwrite earlier ones.
pub fn extract_prices(html: &str) -> ReservationResult<SecondaryPrices> {
    let document = Html::parse_document(html);
    let section_selector = selector(PRICING_SECTION)?;
    let value_selector = selector(PRICE_VALUE)?;

    let section = document
        .select(&section_selector)
        .next()
        .ok_or_else(|| ReservationError::Extraction("pricing section not found".to_string()))?;

    let mut prices = SecondaryPrices::default();
    for element in section.select(&value_selector) {
        let text = joined_text(&element);
        let Some(price) = text.split_whitespace().next() else {
            continue;
        };
        let label = element
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| joined_text(&parent).to_lowercase())
            .unwrap_or_default();

        if label.contains(ON_DEMAND_LABEL) {
            prices.on_demand = Some(price.to_string());
        } else if label.contains(ONE_YEAR_LABEL) {
            prices.one_year = Some(price.to_string());
        } else if label.contains(THREE_YEAR_LABEL) {
            prices.three_year = Some(price.to_string());
        }
    }

    Ok(prices)
}

fn selector(css: &str) -> ReservationResult<Selector> {
    Selector::parse(css).map_err(|e| ReservationError::Extraction(format!("{css}: {e}")))
}

fn joined_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").trim().to_string()
}
