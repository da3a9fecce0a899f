//! Catalog page client for Windows VM prices

use async_trait::async_trait;
use domain_reservations::{PageSource, ReservationError, ReservationResult, SkuRegionKey};
use reqwest::Client;
use tracing::debug;

/// Fetches the monthly, all-upfront Windows pricing page for a catalog key
pub struct CatalogPageClient {
    client: Client,
    base_url: String,
}

impl CatalogPageClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn page_url(&self, key: &SkuRegionKey) -> String {
        format!(
            "{}/azure/vm/{}?currency=USD&platform=windows&duration=monthly&pricingType=Standard.allUpfront&region={}",
            self.base_url.trim_end_matches('/'),
            key.sku,
            key.region
        )
    }
}

#[async_trait]
impl PageSource for CatalogPageClient {
    async fn fetch_page(&self, key: &SkuRegionKey) -> ReservationResult<String> {
        let url = self.page_url(key);
        let failure = |details: String| ReservationError::PageSource {
            key: key.to_string(),
            details,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("catalog returned status: {}", status)));
        }

        let body = response.text().await.map_err(|e| failure(e.to_string()))?;
        debug!(key = %key, bytes = body.len(), "Fetched catalog page");
        Ok(body)
    }
}
