//! Azure Retail Prices client
//!
//! Fetches every VM price item for one ARM SKU and region.
//! https://learn.microsoft.com/en-us/rest/api/cost-management/retail-prices/azure-retail-prices

use async_trait::async_trait;
use domain_reservations::{PriceQuote, PriceSource, ReservationResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ProviderError, ProviderResult};

/// Canonical price source backed by the Azure Retail Prices API
pub struct RetailPricesClient {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct RetailPricesPage {
    #[serde(rename = "Items", default)]
    items: Vec<PriceQuote>,
    #[serde(rename = "NextPageLink", default)]
    next_page_link: Option<String>,
}

impl RetailPricesClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    fn first_page_url(&self, sku: &str, region: &str) -> String {
        let filter = format!(
            "serviceName eq 'Virtual Machines' and armSkuName eq '{}' and armRegionName eq '{}'",
            sku, region
        );
        format!("{}?$filter={}", self.endpoint, urlencoding::encode(&filter))
    }

    /// Fetch one page. `None` means the page was unusable and paging should stop.
    async fn fetch_page(&self, url: &str) -> ProviderResult<Option<RetailPricesPage>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let e = ProviderError::ApiError(format!(
                "Azure API returned status: {}",
                response.status()
            ));
            warn!(url = url, error = %e, "Stopping pagination");
            return Ok(None);
        }

        let body = response.text().await?;
        match serde_json::from_str::<RetailPricesPage>(&body) {
            Ok(page) => Ok(Some(page)),
            Err(e) => {
                let e = ProviderError::ParseError(e.to_string());
                warn!(url = url, error = %e, "Failed to decode price page, stopping pagination");
                Ok(None)
            }
        }
    }

    async fn fetch_all(&self, sku: &str, region: &str) -> ProviderResult<Vec<PriceQuote>> {
        let mut items = Vec::new();
        let mut next = Some(self.first_page_url(sku, region));
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let Some(page) = self.fetch_page(&url).await? else {
                break;
            };
            pages += 1;
            items.extend(page.items);
            next = page.next_page_link.filter(|link| !link.is_empty());
        }

        debug!(sku = sku, region = region, pages = pages, items = items.len(), "Fetched Azure prices");
        Ok(items)
    }
}

#[async_trait]
impl PriceSource for RetailPricesClient {
    async fn query(&self, sku: &str, region: &str) -> ReservationResult<Vec<PriceQuote>> {
        Ok(self.fetch_all(sku, region).await?)
    }
}
