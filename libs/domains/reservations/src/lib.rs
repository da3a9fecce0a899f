//! Reservations Domain
//!
//! Matches advisor savings opportunities against running VM inventory and
//! turns the matches into a cost-comparison report priced from two sources.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │ InventoryIndexer │   │ advisor rows     │
//! └────────┬─────────┘   └────────┬─────────┘
//!          └──────────┬───────────┘
//!            ┌────────▼────────┐
//!            │ SavingsMatcher  │  ← claims VMs, ranks, backfills
//!            └────────┬────────┘
//!          ┌──────────┴───────────┐
//! ┌────────▼─────────┐   ┌────────▼──────────────┐
//! │ CanonicalPricing │   │ SecondaryPriceScraper │  ← run concurrently
//! │ (fetch+classify) │   │ (Windows only)        │
//! └────────┬─────────┘   └────────┬──────────────┘
//!          └──────────┬───────────┘
//!            ┌────────▼────────┐
//!            │ ReportAssembler │  ← as-quoted, reconciled, ranked
//!            └─────────────────┘
//! ```

pub mod classifier;
pub mod error;
pub mod estimate;
pub mod fetcher;
pub mod inventory;
pub mod matcher;
pub mod models;
pub mod money;
pub mod report;
pub mod secondary;

// Re-export commonly used types
pub use classifier::{ClassifiedPrices, PriceClassifier};
pub use error::{ReservationError, ReservationResult};
pub use estimate::CanonicalPricing;
pub use fetcher::{PriceQuoteFetcher, PriceSource};
pub use inventory::{InventoryIndex, InventoryIndexer, VmSheet};
pub use matcher::{ImpactSummary, MatchOutcome, RecommendationSummary, SavingsMatcher};
pub use models::{
    AdvisorRow, InventoryRecord, MatchEntry, OsFamily, PriceQuote, PriceType, Recommendation,
    SavingsOpportunity, SkuRegionKey, VmRow,
};
pub use money::Money;
pub use report::{
    AssembledReports, RANKED_COLUMNS, REPORT_COLUMNS, RankedVm, ReportAssembler, ReportRow,
    ReportTable, RowKind,
};
pub use secondary::{PageSource, SecondaryPriceScraper, SecondaryPriceTable, SecondaryPrices};
