//! Inventory indexing
//!
//! Collapses the wide "one row per VM per tag" inventory table into one
//! record per VM, then buckets records by (size, region) for matching.

use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::models::{InventoryKey, InventoryRecord, OsFamily, UNKNOWN, VmRow};

/// Power state of VMs that are eligible for reservations
pub const RUNNING_STATE: &str = "VM running";

const APPLICATION_TAG: &str = "ApplicationName";
const COST_CENTER_TAGS: [&str; 2] = ["CostCenter", "Cost Center"];

/// The "Virtual Machines" table plus the column facts the indexer depends on
#[derive(Debug, Clone, Default)]
pub struct VmSheet {
    pub rows: Vec<VmRow>,
    /// Whether the source table carried a "Power State" column at all
    pub has_power_state: bool,
}

/// Inventory keyed by VM name and by matching key
#[derive(Debug, Clone, Default)]
pub struct InventoryIndex {
    records: BTreeMap<String, InventoryRecord>,
    pools: HashMap<InventoryKey, Vec<InventoryRecord>>,
}

impl InventoryIndex {
    /// Candidate VMs for a key, in insertion order; empty when the key is unknown
    pub fn pool(&self, key: &InventoryKey) -> &[InventoryRecord] {
        self.pools.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, vm_name: &str) -> Option<&InventoryRecord> {
        self.records.get(vm_name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, record: InventoryRecord) {
        self.pools
            .entry(record.key())
            .or_default()
            .push(record.clone());
        self.records.insert(record.name.clone(), record);
    }
}

/// Builds an [`InventoryIndex`] from raw inventory rows
#[derive(Debug, Clone)]
pub struct InventoryIndexer {
    running_state: String,
}

impl Default for InventoryIndexer {
    fn default() -> Self {
        Self::new(RUNNING_STATE)
    }
}

impl InventoryIndexer {
    pub fn new(running_state: impl Into<String>) -> Self {
        Self {
            running_state: running_state.into(),
        }
    }

    pub fn index(&self, sheet: &VmSheet) -> InventoryIndex {
        let rows: Vec<&VmRow> = if sheet.has_power_state {
            let running: Vec<&VmRow> = sheet
                .rows
                .iter()
                .filter(|row| {
                    row.power_state
                        .as_deref()
                        .is_some_and(|state| state.trim() == self.running_state)
                })
                .collect();
            info!(
                running = running.len(),
                total = sheet.rows.len(),
                state = %self.running_state,
                "Filtered inventory rows by power state"
            );
            running
        } else {
            warn!("Power State column not found, including all VMs");
            sheet.rows.iter().collect()
        };

        // Groups are visited in VM name order; pools inherit that order.
        let mut groups: BTreeMap<&str, Vec<&VmRow>> = BTreeMap::new();
        for row in rows {
            match row.vm_name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => groups.entry(name).or_default().push(row),
                _ => continue,
            }
        }

        let mut index = InventoryIndex::default();
        for (name, group) in groups {
            index.insert(Self::resolve(name, &group));
        }

        info!(vms = index.len(), pools = index.pools.len(), "Inventory indexed");
        index
    }

    fn resolve(name: &str, group: &[&VmRow]) -> InventoryRecord {
        let os_type = first_present(group, |row| row.os_type.as_deref());

        InventoryRecord {
            name: name.to_string(),
            size: first_present(group, |row| row.vm_size.as_deref()),
            os_family: OsFamily::from_label(&os_type),
            os_type,
            os_name: first_present(group, |row| row.os_name.as_deref()),
            region: first_present(group, |row| row.location.as_deref()),
            tag: resolve_tag(group),
        }
    }
}

/// First non-empty value of a field across the group, or "Unknown"
fn first_present<F>(group: &[&VmRow], field: F) -> String
where
    F: Fn(&VmRow) -> Option<&str>,
{
    group
        .iter()
        .filter_map(|row| field(row).map(str::trim))
        .find(|value| !value.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// ApplicationName tag, else CostCenter / Cost Center, else "Unknown"
fn resolve_tag(group: &[&VmRow]) -> String {
    find_tag(group, &[APPLICATION_TAG])
        .or_else(|| find_tag(group, &COST_CENTER_TAGS))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn find_tag(group: &[&VmRow], names: &[&str]) -> Option<String> {
    group
        .iter()
        .find(|row| {
            row.tag_name
                .as_deref()
                .is_some_and(|tag| names.contains(&tag.trim()))
        })
        .map(|row| {
            row.tag_value
                .as_deref()
                .map(str::trim)
                .unwrap_or(UNKNOWN)
                .to_string()
        })
}
