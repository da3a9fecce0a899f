//! Pricing sources
//!
//! HTTP-backed implementations of the domain's price seams: the Azure Retail
//! Prices API for canonical prices and the catalog site for Windows prices.

pub mod azure;
pub mod catalog;

use domain_reservations::ReservationError;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

pub use azure::RetailPricesClient;
pub use catalog::CatalogPageClient;

/// Error type for pricing provider operations
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("API error: {0}")]
    ApiError(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl From<ProviderError> for ReservationError {
    fn from(e: ProviderError) -> Self {
        ReservationError::PriceSource(e.to_string())
    }
}

/// Shared HTTP client settings for both sources
pub fn http_client(timeout: Duration, user_agent: &str) -> ProviderResult<Client> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}
