//! Canonical price lookups, memoized per (SKU, region) for one run.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::error::ReservationResult;
use crate::models::PriceQuote;

/// Source of retail price items for an exact ARM SKU and region.
///
/// Implementations follow pagination to the end and treat an unreadable page
/// as the end of data; only transport failures are returned as errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn query(&self, sku: &str, region: &str) -> ReservationResult<Vec<PriceQuote>>;
}

/// Memoizing front for a [`PriceSource`].
///
/// Owned by a single task, so the cache is a plain map.
pub struct PriceQuoteFetcher<S> {
    source: S,
    cache: HashMap<(String, String), Vec<PriceQuote>>,
    hits: usize,
}

impl<S: PriceSource> PriceQuoteFetcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    /// All price items for the pair; the source is queried at most once per pair.
    pub async fn fetch(&mut self, sku: &str, region: &str) -> ReservationResult<&[PriceQuote]> {
        let key = (sku.to_string(), region.to_string());

        if self.cache.contains_key(&key) {
            self.hits += 1;
            debug!(sku = sku, region = region, "Price cache hit");
        } else {
            let items = self.source.query(sku, region).await?;
            debug!(sku = sku, region = region, items = items.len(), "Fetched prices");
            self.cache.insert(key.clone(), items);
        }

        Ok(self.cache.get(&key).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Number of lookups served from the cache
    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    /// Number of distinct pairs fetched
    pub fn cached_pairs(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReservationError;
    use crate::models::PriceType;

    fn quote(price: f64) -> PriceQuote {
        PriceQuote {
            price_type: PriceType::Consumption,
            meter_name: "D2s v3".to_string(),
            product_name: "Virtual Machines DSv3 Series".to_string(),
            unit_price: price,
            reservation_term: None,
            arm_sku_name: Some("Standard_D2s_v3".to_string()),
            arm_region_name: Some("eastus".to_string()),
            currency_code: Some("USD".to_string()),
        }
    }

    #[tokio::test]
    async fn test_repeated_lookups_hit_the_cache() {
        let mut source = MockPriceSource::new();
        source
            .expect_query()
            .times(1)
            .returning(|sku, region| {
                assert_eq!(sku, "Standard_D2s_v3");
                assert_eq!(region, "eastus");
                Ok(vec![quote(0.096)])
            });

        let mut fetcher = PriceQuoteFetcher::new(source);
        assert_eq!(fetcher.fetch("Standard_D2s_v3", "eastus").await.unwrap().len(), 1);
        assert_eq!(fetcher.fetch("Standard_D2s_v3", "eastus").await.unwrap().len(), 1);

        assert_eq!(fetcher.cache_hits(), 1);
        assert_eq!(fetcher.cached_pairs(), 1);
    }

    #[tokio::test]
    async fn test_distinct_pairs_are_fetched_separately() {
        let mut source = MockPriceSource::new();
        source.expect_query().times(2).returning(|_, _| Ok(vec![]));

        let mut fetcher = PriceQuoteFetcher::new(source);
        fetcher.fetch("Standard_D2s_v3", "eastus").await.unwrap();
        fetcher.fetch("Standard_D2s_v3", "westus").await.unwrap();
        // Empty results are cached too
        fetcher.fetch("Standard_D2s_v3", "westus").await.unwrap();

        assert_eq!(fetcher.cached_pairs(), 2);
    }

    #[tokio::test]
    async fn test_source_errors_are_not_cached() {
        let mut source = MockPriceSource::new();
        source
            .expect_query()
            .times(2)
            .returning(|_, _| Err(ReservationError::PriceSource("connection reset".to_string())));

        let mut fetcher = PriceQuoteFetcher::new(source);
        assert!(fetcher.fetch("Standard_B2s", "eastus").await.is_err());
        assert!(fetcher.fetch("Standard_B2s", "eastus").await.is_err());
        assert_eq!(fetcher.cached_pairs(), 0);
    }
}
