//! Savings matching
//!
//! Pairs advisor opportunities with running VMs. Each VM is claimed at most
//! once per run; opportunities are served in advisor order, so an earlier
//! opportunity on the same key can leave a later one partially filled.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

use crate::inventory::InventoryIndex;
use crate::models::{InventoryRecord, MatchEntry, Recommendation, SavingsOpportunity};

/// Annual savings at or above which a recommendation counts as high impact
pub const SAVINGS_THRESHOLD: f64 = 10.0;
/// Minimum number of recommendations handed to pricing when enough exist
pub const MIN_SELECTED: usize = 20;
/// Backfill candidates must save strictly more than this
pub const BACKFILL_FLOOR: f64 = 1.0;

/// Result of a matching run
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// Every recommendation, sorted by annual savings (descending, stable)
    pub all: Vec<Recommendation>,
    /// High-impact subset plus backfill, in the same order
    pub selected: Vec<Recommendation>,
}

impl MatchOutcome {
    /// Project the selected subset onto the matches artifact
    pub fn match_entries(&self) -> Vec<MatchEntry> {
        self.selected
            .iter()
            .map(Recommendation::to_match_entry)
            .collect()
    }

    pub fn summary(&self) -> RecommendationSummary {
        let unique_skus: BTreeSet<&str> = self.all.iter().map(|r| r.sku.as_str()).collect();
        let mut os_distribution: BTreeMap<String, usize> = BTreeMap::new();
        for rec in &self.all {
            *os_distribution.entry(rec.os.clone()).or_default() += 1;
        }

        RecommendationSummary {
            unique_skus: unique_skus.len(),
            total_vms: self.all.len(),
            os_distribution,
            impact: ImpactSummary::from_selected(&self.selected),
        }
    }
}

/// Statistics over the full recommendation list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationSummary {
    #[serde(rename = "Unique SKUs")]
    pub unique_skus: usize,
    #[serde(rename = "Total VMs")]
    pub total_vms: usize,
    #[serde(rename = "OS Distribution")]
    pub os_distribution: BTreeMap<String, usize>,
    #[serde(rename = "Impact Summary")]
    pub impact: ImpactSummary,
}

/// Statistics over the selected subset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSummary {
    #[serde(rename = "Total VMs")]
    pub total_vms: usize,
    #[serde(rename = "Savings (USD) According to ARI")]
    pub total_savings: f64,
    #[serde(rename = "Average Savings per VM (USD)")]
    pub average_savings: f64,
}

impl ImpactSummary {
    fn from_selected(selected: &[Recommendation]) -> Self {
        let total: f64 = selected.iter().map(|r| r.annual_savings).sum();
        let average = if selected.is_empty() {
            0.0
        } else {
            round2(total / selected.len() as f64)
        };

        Self {
            total_vms: selected.len(),
            total_savings: round2(total),
            average_savings: average,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Matches savings opportunities against an inventory index
#[derive(Debug, Clone)]
pub struct SavingsMatcher {
    threshold: f64,
    min_selected: usize,
    backfill_floor: f64,
}

impl Default for SavingsMatcher {
    fn default() -> Self {
        Self {
            threshold: SAVINGS_THRESHOLD,
            min_selected: MIN_SELECTED,
            backfill_floor: BACKFILL_FLOOR,
        }
    }
}

impl SavingsMatcher {
    pub fn new(threshold: f64, min_selected: usize, backfill_floor: f64) -> Self {
        Self {
            threshold,
            min_selected,
            backfill_floor,
        }
    }

    pub fn run(&self, opportunities: &[SavingsOpportunity], index: &InventoryIndex) -> MatchOutcome {
        let eligible: Vec<&SavingsOpportunity> =
            opportunities.iter().filter(|o| o.is_eligible()).collect();
        let requested: u64 = eligible.iter().map(|o| u64::from(o.quantity)).sum();
        info!(
            eligible = eligible.len(),
            total = opportunities.len(),
            requested_vms = requested,
            "Filtered advisor opportunities"
        );

        let mut claimed: HashSet<String> = HashSet::new();
        let mut all = Vec::new();
        for opportunity in eligible {
            let pool = index.pool(&opportunity.key());
            let claims = claim(opportunity, pool, &mut claimed);
            debug!(
                sku = %opportunity.sku,
                region = %opportunity.region,
                requested = opportunity.quantity,
                claimed = claims.len(),
                pool = pool.len(),
                "Matched opportunity"
            );
            all.extend(claims);
        }

        // sort_by is stable: equal savings keep claim order
        all.sort_by(|a, b| b.annual_savings.total_cmp(&a.annual_savings));

        let selected = self.select(&all);
        info!(
            recommendations = all.len(),
            selected = selected.len(),
            threshold = self.threshold,
            "Recommendations ranked"
        );

        MatchOutcome { all, selected }
    }

    /// High-impact recommendations, backfilled up to `min_selected` from the rest
    fn select(&self, sorted: &[Recommendation]) -> Vec<Recommendation> {
        let mut picked: Vec<usize> = (0..sorted.len())
            .filter(|&i| sorted[i].annual_savings >= self.threshold)
            .collect();

        if picked.len() < self.min_selected {
            let missing = self.min_selected - picked.len();
            let already: HashSet<usize> = picked.iter().copied().collect();
            let backfill: Vec<usize> = (0..sorted.len())
                .filter(|i| !already.contains(i))
                .filter(|&i| sorted[i].annual_savings > self.backfill_floor)
                .take(missing)
                .collect();
            debug!(backfilled = backfill.len(), "Backfilled lower-savings recommendations");
            picked.extend(backfill);
        }

        picked.into_iter().map(|i| sorted[i].clone()).collect()
    }
}

/// Claim up to `quantity` unclaimed VMs from the pool, recording them in `claimed`
fn claim(
    opportunity: &SavingsOpportunity,
    pool: &[InventoryRecord],
    claimed: &mut HashSet<String>,
) -> Vec<Recommendation> {
    let wanted = opportunity.quantity as usize;
    let mut recommendations = Vec::with_capacity(wanted.min(pool.len()));

    for vm in pool {
        if recommendations.len() >= wanted {
            break;
        }
        if claimed.insert(vm.name.clone()) {
            recommendations.push(Recommendation::new(opportunity, vm));
        }
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InventoryIndexer, VmSheet};
    use crate::models::VmRow;

    fn vm(name: &str, size: &str, region: &str) -> VmRow {
        VmRow {
            vm_name: Some(name.to_string()),
            vm_size: Some(size.to_string()),
            os_type: Some("Linux".to_string()),
            os_name: Some("Ubuntu 22.04".to_string()),
            location: Some(region.to_string()),
            power_state: Some("VM running".to_string()),
            tag_name: Some("ApplicationName".to_string()),
            tag_value: Some(format!("app-{}", name)),
        }
    }

    fn index(vms: Vec<VmRow>) -> InventoryIndex {
        InventoryIndexer::default().index(&VmSheet {
            rows: vms,
            has_power_state: true,
        })
    }

    fn opportunity(sku: &str, region: &str, quantity: u32, savings: f64) -> SavingsOpportunity {
        SavingsOpportunity {
            subscription: "sub-prod".to_string(),
            sku: sku.to_string(),
            region: region.to_string(),
            quantity,
            annual_savings: savings,
            description: "Buy reserved instances to save money over pay-as-you-go costs".to_string(),
            impact: "High".to_string(),
            category: "Cost".to_string(),
            sequence: 0,
        }
    }

    fn names(recs: &[Recommendation]) -> Vec<&str> {
        recs.iter().map(|r| r.vm_name.as_str()).collect()
    }

    #[test]
    fn test_claims_requested_quantity_in_pool_order() {
        let inventory = index(
            ["A", "B", "C", "D", "E"]
                .iter()
                .map(|n| vm(n, "Standard_D2s_v3", "eastus"))
                .collect(),
        );
        let opps = vec![opportunity("Standard_D2s_v3", "eastus", 3, 50.0)];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);

        assert_eq!(names(&outcome.all), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_second_opportunity_is_partially_filled() {
        let inventory = index(
            ["A", "B", "C"]
                .iter()
                .map(|n| vm(n, "Standard_D2s_v3", "eastus"))
                .collect(),
        );
        let opps = vec![
            opportunity("Standard_D2s_v3", "eastus", 2, 40.0),
            opportunity("Standard_D2s_v3", " EastUS ", 2, 30.0),
        ];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);

        let second: Vec<&Recommendation> = outcome
            .all
            .iter()
            .filter(|r| r.annual_savings == 30.0)
            .collect();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].vm_name, "C");
    }

    #[test]
    fn test_no_vm_is_recommended_twice() {
        let inventory = index(
            ["A", "B"]
                .iter()
                .map(|n| vm(n, "Standard_B2s", "westus"))
                .collect(),
        );
        let opps = vec![
            opportunity("Standard_B2s", "westus", 5, 12.0),
            opportunity("Standard_B2s", "westus", 5, 99.0),
        ];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);

        let unique: HashSet<&str> = outcome.all.iter().map(|r| r.vm_name.as_str()).collect();
        assert_eq!(unique.len(), outcome.all.len());
        assert_eq!(outcome.all.len(), 2);
    }

    #[test]
    fn test_zero_quantity_and_missing_pool_yield_nothing() {
        let inventory = index(vec![vm("A", "Standard_B2s", "westus")]);
        let opps = vec![
            opportunity("Standard_B2s", "westus", 0, 20.0),
            opportunity("Standard_E8s_v5", "westus", 3, 20.0),
        ];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);
        assert!(outcome.all.is_empty());
    }

    #[test]
    fn test_ineligible_opportunities_are_skipped() {
        let inventory = index(vec![vm("A", "Standard_B2s", "westus")]);
        let mut low = opportunity("Standard_B2s", "westus", 1, 20.0);
        low.impact = "Low".to_string();

        let outcome = SavingsMatcher::default().run(&[low], &inventory);
        assert!(outcome.all.is_empty());
    }

    #[test]
    fn test_sort_is_stable_for_equal_savings() {
        let inventory = index(vec![
            vm("A", "Standard_B2s", "westus"),
            vm("B", "Standard_B2s", "westus"),
            vm("C", "Standard_D4s_v3", "westus"),
        ]);
        let opps = vec![
            opportunity("Standard_B2s", "westus", 2, 15.0),
            opportunity("Standard_D4s_v3", "westus", 1, 80.0),
        ];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);
        assert_eq!(names(&outcome.all), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_backfill_tops_up_to_minimum() {
        // 3 high-impact (>= 10), 30 low (between 1 and 10), 5 negligible (<= 1)
        let mut rows = Vec::new();
        let mut opps = Vec::new();
        for i in 0..38 {
            let size = format!("Standard_S{}", i);
            rows.push(vm(&format!("vm-{:02}", i), &size, "eastus"));
            let savings = match i {
                0..=2 => 50.0,
                3..=32 => 5.0,
                _ => 0.5,
            };
            opps.push(opportunity(&size, "eastus", 1, savings));
        }
        let outcome = SavingsMatcher::default().run(&opps, &index(rows));

        assert_eq!(outcome.all.len(), 38);
        assert_eq!(outcome.selected.len(), 20);
        assert!(outcome.selected[..3].iter().all(|r| r.annual_savings == 50.0));
        assert!(outcome.selected[3..].iter().all(|r| r.annual_savings == 5.0));
        // Backfill keeps sorted (claim) order
        assert_eq!(outcome.selected[3].vm_name, "vm-03");
    }

    #[test]
    fn test_selected_count_property() {
        // max(count >= 10, min(20, count > 1))
        let cases: [(usize, usize, usize); 4] = [(25, 0, 25), (3, 2, 5), (0, 0, 0), (5, 40, 20)];
        for (high, low, expected) in cases {
            let mut rows = Vec::new();
            let mut opps = Vec::new();
            for i in 0..(high + low) {
                let size = format!("Standard_P{}", i);
                rows.push(vm(&format!("vm-{:03}", i), &size, "eastus"));
                let savings = if i < high { 25.0 } else { 2.0 };
                opps.push(opportunity(&size, "eastus", 1, savings));
            }
            let outcome = SavingsMatcher::default().run(&opps, &index(rows));
            assert_eq!(outcome.selected.len(), expected, "high={} low={}", high, low);
        }
    }

    #[test]
    fn test_summary_and_match_entries() {
        let inventory = index(vec![
            vm("A", "Standard_B2s", "westus"),
            vm("B", "Standard_D4s_v3", "westus"),
        ]);
        let opps = vec![
            opportunity("Standard_B2s", "westus", 1, 12.5),
            opportunity("Standard_D4s_v3", "westus", 1, 30.0),
        ];

        let outcome = SavingsMatcher::default().run(&opps, &inventory);
        let summary = outcome.summary();

        assert_eq!(summary.unique_skus, 2);
        assert_eq!(summary.total_vms, 2);
        assert_eq!(summary.os_distribution.get("Linux"), Some(&2));
        assert_eq!(summary.impact.total_savings, 42.5);
        assert_eq!(summary.impact.average_savings, 21.25);

        let entries = outcome.match_entries();
        assert_eq!(entries[0].vm_name, "B");
        assert_eq!(entries[0].tags, "app-B");
        assert_eq!(entries[0].sku, "Standard_D4s_v3");
    }
}
