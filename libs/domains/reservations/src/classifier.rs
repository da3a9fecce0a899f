//! Price classification
//!
//! Reduces the raw retail items for one SKU-region pair to the pay-as-you-go
//! and reservation items that describe a VM of a given OS family.
//!
//! The OS rule is a substring test on product/meter text: an item is "windows"
//! when either mentions windows, "linux" when neither does. Reservations are
//! published without an OS in the text, which is why Windows reservations are
//! picked by license markers and term rather than by the OS rule.

use std::collections::HashMap;
use tracing::warn;

use crate::models::{OsFamily, PriceQuote, PriceType};
use crate::money::Money;

/// Hours in a billing month used to turn hourly prices into monthly ones
pub const HOURS_PER_MONTH: f64 = 730.0;

const EXCLUDED_METERS: [&str; 2] = ["spot", "low priority"];
const HYBRID_MARKERS: [&str; 2] = ["ahb", "hybrid"];

/// Classified items for one pair and OS family
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedPrices {
    pub payg: Vec<PriceQuote>,
    pub reservations: Vec<PriceQuote>,
}

impl ClassifiedPrices {
    pub fn is_empty(&self) -> bool {
        self.payg.is_empty() && self.reservations.is_empty()
    }
}

pub struct PriceClassifier;

impl PriceClassifier {
    pub fn classify(items: &[PriceQuote], os: OsFamily) -> ClassifiedPrices {
        let candidates: Vec<&PriceQuote> = items
            .iter()
            .filter(|item| !EXCLUDED_METERS.iter().any(|m| item.mentions(m)))
            .collect();

        ClassifiedPrices {
            payg: Self::payg(&candidates, os),
            reservations: Self::reservations(&candidates, os),
        }
    }

    /// Whether an item belongs to the OS family under the substring rule
    pub fn matches_os(item: &PriceQuote, os: OsFamily) -> bool {
        match os {
            OsFamily::Windows => item.mentions("windows"),
            OsFamily::Linux => !item.mentions("windows"),
            OsFamily::Unknown => false,
        }
    }

    fn payg(candidates: &[&PriceQuote], os: OsFamily) -> Vec<PriceQuote> {
        let matching = candidates
            .iter()
            .filter(|item| item.price_type == PriceType::Consumption)
            .filter(|item| Self::matches_os(item, os));

        match os {
            // Cheapest single meter; min_by keeps the first of equal prices
            OsFamily::Linux => matching
                .min_by(|a, b| a.unit_price.total_cmp(&b.unit_price))
                .map(|item| vec![(*item).clone()])
                .unwrap_or_default(),
            _ => matching.map(|item| (*item).clone()).collect(),
        }
    }

    fn reservations(candidates: &[&PriceQuote], os: OsFamily) -> Vec<PriceQuote> {
        let reservations = candidates
            .iter()
            .filter(|item| item.price_type == PriceType::Reservation);

        if !os.is_windows() {
            return reservations
                .filter(|item| Self::matches_os(item, os))
                .map(|item| (*item).clone())
                .collect();
        }

        let all: Vec<&PriceQuote> = reservations.copied().collect();
        let mut license_included: Vec<&PriceQuote> = all
            .iter()
            .copied()
            .filter(|item| {
                let text = format!("{}{}", item.product_name, item.meter_name).to_lowercase();
                !HYBRID_MARKERS.iter().any(|marker| text.contains(marker))
            })
            .collect();

        if license_included.is_empty() && !all.is_empty() {
            warn!(
                sku = all[0].arm_sku_name.as_deref().unwrap_or(""),
                "No license-included Windows reservation found, using generic reservations"
            );
            license_included = all;
        }

        highest_per_term(&license_included)
    }
}

/// Keep the most expensive item per term, terms in first-seen order.
///
/// Several meters can quote the same term; the cheaper ones are outliers.
fn highest_per_term(items: &[&PriceQuote]) -> Vec<PriceQuote> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, &PriceQuote> = HashMap::new();

    for item in items {
        let term = item.term();
        match best.get(term) {
            Some(current) if item.unit_price <= current.unit_price => {}
            Some(_) => {
                best.insert(term, item);
            }
            None => {
                order.push(term);
                best.insert(term, item);
            }
        }
    }

    order
        .into_iter()
        .filter_map(|term| best.get(term).map(|item| (*item).clone()))
        .collect()
}

/// Hourly consumption price to a monthly cost
pub fn payg_monthly_cost(unit_price: f64) -> Money {
    Money::from_decimal(unit_price * HOURS_PER_MONTH)
}

/// Upfront reservation price to a monthly cost.
///
/// A term mentioning "1" is treated as 12 months, anything else as 36.
pub fn reservation_monthly_cost(unit_price: f64, term: &str) -> Money {
    let months = if term.contains('1') { 12.0 } else { 36.0 };
    Money::from_decimal(unit_price / months)
}
