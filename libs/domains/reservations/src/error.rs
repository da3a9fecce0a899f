use thiserror::Error;

/// Result type for reservation operations
pub type ReservationResult<T> = Result<T, ReservationError>;

/// Errors that can occur in the reservations domain
#[derive(Debug, Error)]
pub enum ReservationError {
    /// A `sku_region` key that does not split into its two halves
    #[error("Invalid SKU-region key: {0}")]
    InvalidKey(String),

    /// The canonical price source failed at the transport level
    #[error("Price source error: {0}")]
    PriceSource(String),

    /// The secondary catalog page could not be fetched
    #[error("Page source error for {key}: {details}")]
    PageSource { key: String, details: String },

    /// The catalog page was fetched but held no recognizable price table
    #[error("Failed to extract secondary prices: {0}")]
    Extraction(String),
}
