//! Report assembly
//!
//! Turns the flat list of estimate rows produced by canonical pricing into
//! three tables:
//!
//! - the as-quoted estimate: VMs ranked by pay-as-you-go cost, each followed
//!   by a blank row, closed by the monthly totals;
//! - the reconciled savings estimate: the same rows with Windows prices
//!   replaced by secondary prices where known, recomputed totals and the
//!   annual/3-year savings rows;
//! - the ranked VM list.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{OsFamily, SkuRegionKey};
use crate::money::Money;
use crate::secondary::{SecondaryPriceTable, SecondaryPrices};

pub const SERVICE_CATEGORY: &str = "Compute";
pub const SERVICE_TYPE: &str = "Virtual Machines";
pub const TOTAL_CATEGORY: &str = "Total";

const PAYG_MARKER: &str = "pay-as-you-go";
const ONE_YEAR_MARKER: &str = "1 year";
const THREE_YEAR_MARKER: &str = "3 years";

/// Reservation term as far as the totals are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationTerm {
    OneYear,
    ThreeYear,
    Other,
}

/// What a report row represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    Payg,
    Reservation(ReservationTerm),
    #[default]
    Separator,
    Aggregate,
}

impl RowKind {
    /// Classify an estimate line by its description, case-insensitively
    pub fn from_description(description: &str) -> Self {
        let text = description.to_lowercase();
        if text.contains(PAYG_MARKER) {
            RowKind::Payg
        } else if text.contains(ONE_YEAR_MARKER) {
            RowKind::Reservation(ReservationTerm::OneYear)
        } else if text.contains(THREE_YEAR_MARKER) {
            RowKind::Reservation(ReservationTerm::ThreeYear)
        } else {
            RowKind::Reservation(ReservationTerm::Other)
        }
    }
}

/// Column headers of an estimate table, in field order
pub const REPORT_COLUMNS: [&str; 10] = [
    "Service category",
    "Service type",
    "VM Name",
    "Tags",
    "Region",
    "OS",
    "OS Name",
    "SKU",
    "Description",
    "Estimated monthly cost",
];

/// Column headers of the ranked table
pub const RANKED_COLUMNS: [&str; 2] = ["VM Name", "Pay-as-you-go"];

/// One line of an estimate table
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Service category")]
    pub service_category: String,
    #[serde(rename = "Service type")]
    pub service_type: String,
    #[serde(rename = "VM Name")]
    pub vm_name: String,
    #[serde(rename = "Tags")]
    pub tags: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "OS Name")]
    pub os_name: String,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Estimated monthly cost")]
    pub monthly_cost: Option<Money>,
    #[serde(skip)]
    pub kind: RowKind,
}

impl ReportRow {
    pub fn separator() -> Self {
        Self::default()
    }

    pub fn aggregate(category: &str, description: &str, amount: Money) -> Self {
        Self {
            service_category: category.to_string(),
            description: description.to_string(),
            monthly_cost: Some(amount),
            kind: RowKind::Aggregate,
            ..Default::default()
        }
    }

    fn cost(&self) -> Money {
        self.monthly_cost.unwrap_or(Money::ZERO)
    }

    /// Secondary catalog key, for Windows rows only
    fn secondary_key(&self) -> Option<SkuRegionKey> {
        let is_windows = OsFamily::from_label(&self.os).is_windows();
        (is_windows && !self.sku.is_empty() && !self.region.is_empty())
            .then(|| SkuRegionKey::new(self.sku.to_lowercase(), self.region.to_lowercase()))
    }

    /// Secondary price matching this row's kind, if the source quoted one
    fn secondary_price<'a>(&self, prices: &'a SecondaryPrices) -> Option<&'a str> {
        match self.kind {
            RowKind::Payg => prices.on_demand.as_deref(),
            RowKind::Reservation(ReservationTerm::OneYear) => prices.one_year.as_deref(),
            RowKind::Reservation(ReservationTerm::ThreeYear) => prices.three_year.as_deref(),
            _ => None,
        }
    }
}

/// An emitted table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReportTable {
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    pub fn new(rows: Vec<ReportRow>) -> Self {
        Self { rows }
    }

    /// Rows with a description; drops the blank separators
    pub fn flattened(&self) -> ReportTable {
        ReportTable::new(
            self.rows
                .iter()
                .filter(|row| !row.description.is_empty())
                .cloned()
                .collect(),
        )
    }

    pub fn find(&self, description: &str) -> Option<&ReportRow> {
        self.rows.iter().find(|row| row.description == description)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One line of the ranked table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedVm {
    #[serde(rename = "VM Name")]
    pub vm_name: String,
    #[serde(rename = "Pay-as-you-go")]
    pub payg: Money,
}

/// Monthly sums per price kind
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MonthlyTotals {
    pub payg: Money,
    pub one_year: Money,
    pub three_year: Money,
}

impl MonthlyTotals {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        rows.iter().fold(Self::default(), |mut totals, row| {
            match row.kind {
                RowKind::Payg => totals.payg += row.cost(),
                RowKind::Reservation(ReservationTerm::OneYear) => totals.one_year += row.cost(),
                RowKind::Reservation(ReservationTerm::ThreeYear) => {
                    totals.three_year += row.cost()
                }
                _ => {}
            }
            totals
        })
    }

    fn monthly_rows(&self) -> Vec<ReportRow> {
        vec![
            ReportRow::aggregate(TOTAL_CATEGORY, "Total Monthly Pay-as-you-go", self.payg),
            ReportRow::aggregate("", "Total 1 Year Reservations (Billed monthly)", self.one_year),
            ReportRow::aggregate("", "Total 3 Year Reservations (Billed monthly)", self.three_year),
        ]
    }

    fn savings_rows(&self) -> Vec<ReportRow> {
        let annual_payg = self.payg * 12;
        let annual_one_year = self.one_year * 12;
        let annual_three_year = self.three_year * 12;

        vec![
            ReportRow::separator(),
            ReportRow::aggregate("", "Total Yearly Pay-as-you-go", annual_payg),
            ReportRow::aggregate("", "Total 1 Year Reservations (Annual cost)", annual_one_year),
            ReportRow::aggregate(
                "",
                "Annual Savings (1 Year Reservations)",
                annual_payg - annual_one_year,
            ),
            ReportRow::separator(),
            ReportRow::aggregate("", "Total 36 Months Pay-as-you-go", self.payg * 36),
            ReportRow::aggregate(
                "",
                "Total 3 Year Reservations (3 Year cost)",
                self.three_year * 36,
            ),
            ReportRow::aggregate(
                "",
                "Total 3 Year Reservations (annual cost)",
                annual_three_year,
            ),
            ReportRow::separator(),
            ReportRow::aggregate(
                "",
                "3 Year Reservations (Annual Savings)",
                annual_payg - annual_three_year,
            ),
        ]
    }
}

/// Everything the pricing phase writes out
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssembledReports {
    pub estimate: ReportTable,
    pub savings: ReportTable,
    pub savings_flat: ReportTable,
    pub ranked: Vec<RankedVm>,
}

pub struct ReportAssembler;

impl ReportAssembler {
    pub fn assemble(rows: Vec<ReportRow>, secondary: &SecondaryPriceTable) -> AssembledReports {
        let ranked = Self::rank(&rows);
        let grouped = Self::group(rows, &ranked);

        let quoted_totals = MonthlyTotals::from_rows(&grouped);
        let mut estimate = grouped.clone();
        estimate.extend(quoted_totals.monthly_rows());

        let reconciled = Self::reconcile(grouped, secondary);
        let totals = MonthlyTotals::from_rows(&reconciled);
        let mut savings = reconciled;
        savings.extend(totals.monthly_rows());
        savings.extend(totals.savings_rows());

        info!(
            vms = ranked.len(),
            monthly_payg = %totals.payg,
            monthly_one_year = %totals.one_year,
            monthly_three_year = %totals.three_year,
            "Assembled reports"
        );

        let savings = ReportTable::new(savings);
        AssembledReports {
            estimate: ReportTable::new(estimate),
            savings_flat: savings.flattened(),
            savings,
            ranked,
        }
    }

    /// VMs by pay-as-you-go cost, highest first.
    ///
    /// Ties keep first-appearance order. The last PAYG row of a VM sets its
    /// cost; VMs without one count as zero.
    fn rank(rows: &[ReportRow]) -> Vec<RankedVm> {
        let mut order: Vec<&str> = Vec::new();
        let mut costs: HashMap<&str, Money> = HashMap::new();

        for row in rows {
            if !costs.contains_key(row.vm_name.as_str()) {
                order.push(&row.vm_name);
                costs.insert(&row.vm_name, Money::ZERO);
            }
            if row.kind == RowKind::Payg {
                costs.insert(&row.vm_name, row.cost());
            }
        }

        let mut ranked: Vec<RankedVm> = order
            .into_iter()
            .map(|name| RankedVm {
                vm_name: name.to_string(),
                payg: costs.get(name).copied().unwrap_or(Money::ZERO),
            })
            .collect();
        ranked.sort_by(|a, b| b.payg.cmp(&a.payg));
        ranked
    }

    /// Rows regrouped per VM in ranked order, each group closed by a blank row
    fn group(rows: Vec<ReportRow>, ranked: &[RankedVm]) -> Vec<ReportRow> {
        let mut by_vm: HashMap<String, Vec<ReportRow>> = HashMap::new();
        for row in rows {
            by_vm.entry(row.vm_name.clone()).or_default().push(row);
        }

        let mut grouped = Vec::new();
        for vm in ranked {
            if let Some(vm_rows) = by_vm.remove(&vm.vm_name) {
                grouped.extend(vm_rows);
                grouped.push(ReportRow::separator());
            }
        }
        grouped
    }

    /// Overwrite Windows prices with secondary prices where the source has them
    fn reconcile(mut rows: Vec<ReportRow>, secondary: &SecondaryPriceTable) -> Vec<ReportRow> {
        let mut replaced = 0usize;

        for row in rows.iter_mut() {
            let Some(key) = row.secondary_key() else {
                continue;
            };
            let Some(prices) = secondary.get(&key) else {
                continue;
            };
            if let Some(raw) = row.secondary_price(prices) {
                row.monthly_cost = Some(Money::parse_lossy(raw));
                replaced += 1;
            }
        }

        debug!(replaced = replaced, "Reconciled rows with secondary prices");
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn line(vm: &str, os: &str, sku: &str, description: &str, cents: i64) -> ReportRow {
        ReportRow {
            service_category: SERVICE_CATEGORY.to_string(),
            service_type: SERVICE_TYPE.to_string(),
            vm_name: vm.to_string(),
            tags: "Billing".to_string(),
            region: "eastus".to_string(),
            os: os.to_string(),
            os_name: format!("{os} Server"),
            sku: sku.to_string(),
            description: description.to_string(),
            monthly_cost: Some(Money::new(cents)),
            kind: RowKind::from_description(description),
        }
    }

    fn estimate_rows() -> Vec<ReportRow> {
        vec![
            line("vm-linux", "Linux", "standard-b2s", "1 B2s (standard-b2s), Linux, Pay-as-you-go", 3_000),
            line("vm-linux", "Linux", "standard-b2s", "1 B2s (standard-b2s) (1 Year), Linux Reservation", 2_000),
            line("vm-linux", "Linux", "standard-b2s", "1 B2s (standard-b2s) (3 Years), Linux Reservation", 1_500),
            line("vm-win", "Windows", "d2s-v3", "1 D2s v3 (d2s-v3), Windows, Pay-as-you-go", 13_724),
            line("vm-win", "Windows", "d2s-v3", "1 D2s v3 (d2s-v3) (1 Year), Windows Reservation", 10_000),
            line("vm-win", "Windows", "d2s-v3", "1 D2s v3 (d2s-v3) (3 Years), Windows Reservation", 8_000),
        ]
    }

    fn cost(table: &ReportTable, description: &str) -> Money {
        table
            .find(description)
            .and_then(|row| row.monthly_cost)
            .unwrap_or_else(|| panic!("missing row {description}"))
    }

    fn serialized_columns<T: Serialize>(value: &T) -> Vec<String> {
        let mut columns: Vec<String> = serde_json::to_value(value)
            .unwrap()
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        columns.sort();
        columns
    }

    fn sorted(columns: &[&str]) -> Vec<String> {
        let mut columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        columns.sort();
        columns
    }

    #[test]
    fn test_column_constants_match_serialized_fields() {
        assert_eq!(serialized_columns(&ReportRow::default()), sorted(&REPORT_COLUMNS));

        let ranked = RankedVm {
            vm_name: "vm-a".to_string(),
            payg: Money::ZERO,
        };
        assert_eq!(serialized_columns(&ranked), sorted(&RANKED_COLUMNS));
    }

    #[test]
    fn test_row_kind_from_description() {
        assert_eq!(RowKind::from_description("1 D2 (d2), Windows, Pay-as-you-go"), RowKind::Payg);
        assert_eq!(
            RowKind::from_description("1 D2 (d2) (1 Year), Windows Reservation"),
            RowKind::Reservation(ReservationTerm::OneYear)
        );
        assert_eq!(
            RowKind::from_description("1 D2 (d2) (3 Years), Linux Reservation"),
            RowKind::Reservation(ReservationTerm::ThreeYear)
        );
        assert_eq!(
            RowKind::from_description("1 D2 (d2) (5 Years), Linux Reservation"),
            RowKind::Reservation(ReservationTerm::Other)
        );
    }

    #[test]
    fn test_estimate_is_ranked_by_payg_with_separators() {
        let reports = ReportAssembler::assemble(estimate_rows(), &BTreeMap::new());
        let rows = &reports.estimate.rows;

        assert_eq!(rows[0].vm_name, "vm-win");
        assert_eq!(rows[3], ReportRow::separator());
        assert_eq!(rows[4].vm_name, "vm-linux");
        assert_eq!(rows[7], ReportRow::separator());

        assert_eq!(rows[8].service_category, TOTAL_CATEGORY);
        assert_eq!(cost(&reports.estimate, "Total Monthly Pay-as-you-go"), Money::new(16_724));
        assert_eq!(
            cost(&reports.estimate, "Total 1 Year Reservations (Billed monthly)"),
            Money::new(12_000)
        );
        assert_eq!(
            cost(&reports.estimate, "Total 3 Year Reservations (Billed monthly)"),
            Money::new(9_500)
        );
        assert_eq!(rows.len(), 11);
    }

    #[test]
    fn test_ranked_table_ties_keep_first_appearance() {
        let rows = vec![
            line("vm-b", "Linux", "standard-b2s", "1 B2s (standard-b2s), Linux, Pay-as-you-go", 500),
            line("vm-a", "Linux", "standard-b2s", "1 B2s (standard-b2s), Linux, Pay-as-you-go", 500),
            line("vm-c", "Linux", "standard-b2s", "1 B2s (standard-b2s), Linux, Pay-as-you-go", 900),
        ];

        let reports = ReportAssembler::assemble(rows, &BTreeMap::new());
        let names: Vec<&str> = reports.ranked.iter().map(|vm| vm.vm_name.as_str()).collect();
        assert_eq!(names, vec!["vm-c", "vm-b", "vm-a"]);
    }

    #[test]
    fn test_last_payg_row_sets_vm_cost_and_missing_payg_sorts_last() {
        let rows = vec![
            line("vm-reserved", "Linux", "standard-b2s", "1 B2s (standard-b2s) (1 Year), Linux Reservation", 9_999),
            line("vm-win", "Windows", "d2s-v3", "1 D2s v3 (d2s-v3), Windows, Pay-as-you-go", 100),
            line("vm-win", "Windows", "d2s-v3", "1 D2s v3 Dedicated (d2s-v3), Windows, Pay-as-you-go", 700),
        ];

        let reports = ReportAssembler::assemble(rows, &BTreeMap::new());
        assert_eq!(
            reports.ranked,
            vec![
                RankedVm { vm_name: "vm-win".to_string(), payg: Money::new(700) },
                RankedVm { vm_name: "vm-reserved".to_string(), payg: Money::ZERO },
            ]
        );
    }

    #[test]
    fn test_secondary_prices_override_windows_rows() {
        let mut secondary = BTreeMap::new();
        secondary.insert(
            SkuRegionKey::new("d2s-v3", "eastus"),
            SecondaryPrices {
                on_demand: Some("$150.00".to_string()),
                one_year: Some("$1,100.50".to_string()),
                three_year: Some("n/a".to_string()),
            },
        );

        let reports = ReportAssembler::assemble(estimate_rows(), &secondary);
        let savings = &reports.savings;

        let win_rows: Vec<Option<Money>> = savings
            .rows
            .iter()
            .filter(|row| row.vm_name == "vm-win")
            .map(|row| row.monthly_cost)
            .collect();
        assert_eq!(
            win_rows,
            vec![Some(Money::new(15_000)), Some(Money::new(110_050)), Some(Money::ZERO)]
        );

        // Linux rows are never overwritten
        let linux_payg = savings
            .rows
            .iter()
            .find(|row| row.vm_name == "vm-linux" && row.kind == RowKind::Payg)
            .and_then(|row| row.monthly_cost);
        assert_eq!(linux_payg, Some(Money::new(3_000)));

        // The as-quoted table is untouched
        assert_eq!(cost(&reports.estimate, "Total Monthly Pay-as-you-go"), Money::new(16_724));
        assert_eq!(cost(savings, "Total Monthly Pay-as-you-go"), Money::new(18_000));
    }

    #[test]
    fn test_missing_secondary_key_keeps_canonical_price() {
        let mut secondary = BTreeMap::new();
        secondary.insert(SkuRegionKey::new("e4s-v3", "eastus"), SecondaryPrices::default());
        secondary.insert(SkuRegionKey::new("d2s-v3", "eastus"), SecondaryPrices::default());

        let reports = ReportAssembler::assemble(estimate_rows(), &secondary);

        assert_eq!(cost(&reports.savings, "Total Monthly Pay-as-you-go"), Money::new(16_724));
        assert_eq!(
            cost(&reports.savings, "Total 1 Year Reservations (Billed monthly)"),
            Money::new(12_000)
        );
    }

    #[test]
    fn test_savings_rows_follow_totals() {
        let reports = ReportAssembler::assemble(estimate_rows(), &BTreeMap::new());
        let savings = &reports.savings;

        let annual_payg = cost(savings, "Total Yearly Pay-as-you-go");
        let annual_one_year = cost(savings, "Total 1 Year Reservations (Annual cost)");
        let annual_three_year = cost(savings, "Total 3 Year Reservations (annual cost)");

        assert_eq!(annual_payg, Money::new(16_724 * 12));
        assert_eq!(
            cost(savings, "Annual Savings (1 Year Reservations)"),
            annual_payg - annual_one_year
        );
        assert_eq!(
            cost(savings, "3 Year Reservations (Annual Savings)"),
            annual_payg - annual_three_year
        );
        assert_eq!(cost(savings, "Total 36 Months Pay-as-you-go"), Money::new(16_724 * 36));
        assert_eq!(
            cost(savings, "Total 3 Year Reservations (3 Year cost)"),
            Money::new(9_500 * 36)
        );

        let tail: Vec<&str> = savings.rows[savings.len() - 10..]
            .iter()
            .map(|row| row.description.as_str())
            .collect();
        assert_eq!(
            tail,
            vec![
                "",
                "Total Yearly Pay-as-you-go",
                "Total 1 Year Reservations (Annual cost)",
                "Annual Savings (1 Year Reservations)",
                "",
                "Total 36 Months Pay-as-you-go",
                "Total 3 Year Reservations (3 Year cost)",
                "Total 3 Year Reservations (annual cost)",
                "",
                "3 Year Reservations (Annual Savings)",
            ]
        );
    }

    #[test]
    fn test_flattened_view_drops_blank_rows() {
        let reports = ReportAssembler::assemble(estimate_rows(), &BTreeMap::new());

        assert!(reports.savings_flat.rows.iter().all(|row| !row.description.is_empty()));
        assert_eq!(reports.savings_flat.len(), 6 + 3 + 7);
    }

    #[test]
    fn test_empty_input_still_emits_totals() {
        let reports = ReportAssembler::assemble(Vec::new(), &BTreeMap::new());

        assert!(reports.ranked.is_empty());
        assert_eq!(reports.estimate.len(), 3);
        assert_eq!(cost(&reports.estimate, "Total Monthly Pay-as-you-go"), Money::ZERO);
    }
}
