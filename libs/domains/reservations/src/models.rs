use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::error::ReservationError;

/// Prefix stripped from VM sizes to build the catalog key (`Standard_D2s_v3` -> `d2s-v3`)
const SIZE_FAMILY_PREFIX: &str = "Standard_";

/// Placeholder for inventory fields that are missing or empty
pub const UNKNOWN: &str = "Unknown";

/// Operating system family, derived from the free-form OS label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Linux,
    #[default]
    Unknown,
}

impl OsFamily {
    /// Classify a label such as `"Windows"` or `" linux "`; anything else is unknown.
    pub fn from_label(label: &str) -> Self {
        OsFamily::from_str(&label.trim().to_lowercase()).unwrap_or_default()
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, OsFamily::Windows)
    }
}

// ============================================================================
// Input rows (column mapping at the report boundary)
// ============================================================================

/// One row of the "Virtual Machines" table: one VM per tag
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VmRow {
    #[serde(rename = "VM Name", default)]
    pub vm_name: Option<String>,
    #[serde(rename = "VM Size", default)]
    pub vm_size: Option<String>,
    #[serde(rename = "OS Type", default)]
    pub os_type: Option<String>,
    #[serde(rename = "OS Name", default)]
    pub os_name: Option<String>,
    #[serde(rename = "Location", default)]
    pub location: Option<String>,
    #[serde(rename = "Power State", default)]
    pub power_state: Option<String>,
    #[serde(rename = "Tag Name", default)]
    pub tag_name: Option<String>,
    #[serde(rename = "Tag Value", default)]
    pub tag_value: Option<String>,
}

/// One row of the "Advisor" table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvisorRow {
    #[serde(rename = "Category", default)]
    pub category: Option<String>,
    #[serde(rename = "Impact", default)]
    pub impact: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "SKU", default)]
    pub sku: Option<String>,
    #[serde(rename = "Savings Region", default)]
    pub savings_region: Option<String>,
    #[serde(rename = "Quantity", default)]
    pub quantity: Option<String>,
    #[serde(rename = "Annual Savings", default)]
    pub annual_savings: Option<String>,
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
}

// ============================================================================
// Inventory
// ============================================================================

/// One logical VM, resolved from all of its inventory rows
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub name: String,
    pub size: String,
    /// OS label as reported by the inventory (e.g. "Windows")
    pub os_type: String,
    pub os_family: OsFamily,
    pub os_name: String,
    pub region: String,
    /// Owner tag: ApplicationName, else CostCenter, else "Unknown"
    pub tag: String,
}

impl InventoryRecord {
    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.size, &self.region)
    }
}

/// Matching key: size literal and lowercase region, both trimmed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InventoryKey {
    pub size: String,
    pub region: String,
}

impl InventoryKey {
    pub fn new(size: &str, region: &str) -> Self {
        Self {
            size: size.trim().to_string(),
            region: region.trim().to_lowercase(),
        }
    }
}

// ============================================================================
// Advisor opportunities and recommendations
// ============================================================================

/// Advisor hint that some number of VMs of a SKU in a region could be reserved
#[derive(Debug, Clone, PartialEq)]
pub struct SavingsOpportunity {
    pub subscription: String,
    pub sku: String,
    pub region: String,
    /// Requested VM count, truncated toward zero
    pub quantity: u32,
    pub annual_savings: f64,
    pub description: String,
    pub impact: String,
    pub category: String,
    /// Position in the advisor table
    pub sequence: usize,
}

impl SavingsOpportunity {
    pub fn from_row(row: AdvisorRow, sequence: usize) -> Self {
        let quantity = row
            .quantity
            .as_deref()
            .and_then(|q| q.trim().parse::<f64>().ok())
            .filter(|q| q.is_finite() && *q > 0.0)
            .map(|q| q.trunc() as u32)
            .unwrap_or(0);
        let annual_savings = row
            .annual_savings
            .as_deref()
            .and_then(|s| s.trim().replace(',', "").parse::<f64>().ok())
            .filter(|s| s.is_finite())
            .unwrap_or(0.0);

        Self {
            subscription: row.name.unwrap_or_default(),
            sku: row.sku.unwrap_or_default(),
            region: row.savings_region.unwrap_or_default(),
            quantity,
            annual_savings,
            description: row.description.unwrap_or_default(),
            impact: row.impact.unwrap_or_default(),
            category: row.category.unwrap_or_default(),
            sequence,
        }
    }

    /// High-impact cost hints about reserved instances
    pub fn is_eligible(&self) -> bool {
        self.category.trim().eq_ignore_ascii_case("cost")
            && self.impact.trim().eq_ignore_ascii_case("high")
            && self.description.to_lowercase().contains("reserved instance")
    }

    pub fn key(&self) -> InventoryKey {
        InventoryKey::new(&self.sku, &self.region)
    }
}

/// One VM claimed by one savings opportunity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(skip)]
    pub subscription: String,
    #[serde(rename = "VM Name")]
    pub vm_name: String,
    #[serde(rename = "VM Size")]
    pub vm_size: String,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "Recommendation")]
    pub recommendation: String,
    #[serde(rename = "Annual Savings")]
    pub annual_savings: f64,
    #[serde(rename = "Impact")]
    pub impact: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "OS Name")]
    pub os_name: String,
    #[serde(rename = "Tags")]
    pub tags: String,
}

impl Recommendation {
    pub fn new(opportunity: &SavingsOpportunity, vm: &InventoryRecord) -> Self {
        Self {
            subscription: opportunity.subscription.clone(),
            vm_name: vm.name.clone(),
            vm_size: vm.size.clone(),
            sku: opportunity.sku.clone(),
            recommendation: opportunity.description.clone(),
            annual_savings: opportunity.annual_savings,
            impact: opportunity.impact.clone(),
            region: opportunity.region.clone(),
            os: vm.os_type.clone(),
            os_name: vm.os_name.clone(),
            tags: vm.tag.clone(),
        }
    }

    pub fn to_match_entry(&self) -> MatchEntry {
        MatchEntry {
            region: self.region.clone(),
            sku: self.sku.clone(),
            os: self.os.clone(),
            os_name: self.os_name.clone(),
            vm_name: self.vm_name.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Record of the "matches" artifact handed from matching to pricing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "SKU")]
    pub sku: String,
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(rename = "OS Name", default)]
    pub os_name: String,
    #[serde(rename = "VM Name", default)]
    pub vm_name: String,
    #[serde(rename = "Tags", default)]
    pub tags: String,
}

impl MatchEntry {
    pub fn os_family(&self) -> OsFamily {
        OsFamily::from_label(&self.os)
    }

    /// SKU as shown in the report: catalog form for Windows, lowercase hyphenated otherwise
    pub fn report_sku(&self) -> String {
        if self.os_family().is_windows() {
            SkuRegionKey::catalog_sku(&self.sku)
        } else {
            self.sku.to_lowercase().replace('_', "-")
        }
    }

    /// Catalog key for the secondary source; only Windows entries have one
    pub fn secondary_key(&self) -> Option<SkuRegionKey> {
        self.os_family()
            .is_windows()
            .then(|| SkuRegionKey::from_arm(&self.sku, &self.region))
    }
}

// ============================================================================
// Catalog key
// ============================================================================

/// Normalized `sku_region` key shared by the secondary source and the reconciled report
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkuRegionKey {
    pub sku: String,
    pub region: String,
}

impl SkuRegionKey {
    pub fn new(sku: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            region: region.into(),
        }
    }

    /// Build from an ARM size and region (`Standard_D2s_v3`, `EastUS` -> `d2s-v3_eastus`)
    pub fn from_arm(arm_sku: &str, region: &str) -> Self {
        Self::new(Self::catalog_sku(arm_sku), region.to_lowercase())
    }

    /// `Standard_D2s_v3` -> `d2s-v3`
    pub fn catalog_sku(arm_sku: &str) -> String {
        arm_sku
            .replace(SIZE_FAMILY_PREFIX, "")
            .to_lowercase()
            .replace('_', "-")
    }
}

impl fmt::Display for SkuRegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.sku, self.region)
    }
}

impl FromStr for SkuRegionKey {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('_') {
            Some((sku, region)) if !sku.is_empty() && !region.is_empty() => {
                Ok(Self::new(sku, region))
            }
            _ => Err(ReservationError::InvalidKey(s.to_string())),
        }
    }
}

impl TryFrom<String> for SkuRegionKey {
    type Error = ReservationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SkuRegionKey> for String {
    fn from(key: SkuRegionKey) -> Self {
        key.to_string()
    }
}

// ============================================================================
// Canonical price items
// ============================================================================

/// Billing type of a retail price item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PriceType {
    Consumption,
    Reservation,
    DevTestConsumption,
    #[default]
    #[serde(other)]
    Other,
}

/// One line item from the canonical retail price source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    #[serde(rename = "type", default)]
    pub price_type: PriceType,
    #[serde(default)]
    pub meter_name: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub unit_price: f64,
    #[serde(default)]
    pub reservation_term: Option<String>,
    #[serde(default)]
    pub arm_sku_name: Option<String>,
    #[serde(default)]
    pub arm_region_name: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

impl PriceQuote {
    pub fn term(&self) -> &str {
        self.reservation_term.as_deref().unwrap_or("")
    }

    /// Product and meter text, lowercased, for substring rules
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.product_name.to_lowercase().contains(needle)
            || self.meter_name.to_lowercase().contains(needle)
    }
}
