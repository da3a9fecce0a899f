//! Inventory report discovery and loading
//!
//! A report export is a directory named like `AzureResourceInventory_Report_*`
//! holding one CSV file per table. Column names are mapped to typed rows here
//! and nowhere else.

use domain_reservations::{AdvisorRow, VmRow, VmSheet};
use eyre::{Result, WrapErr, eyre};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

pub const ADVISOR_TABLE: &str = "Advisor.csv";
pub const VM_TABLE: &str = "Virtual Machines.csv";

const POWER_STATE_COLUMN: &str = "Power State";

/// A located inventory report export
#[derive(Debug, Clone)]
pub struct InventoryReport {
    pub dir: PathBuf,
}

impl InventoryReport {
    /// Newest directory under `input_dir` whose name matches `pattern`
    pub fn locate(input_dir: &Path, pattern: &str) -> Result<Self> {
        let full_pattern = input_dir.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();

        let newest = glob::glob(&full_pattern)
            .wrap_err_with(|| format!("Invalid report pattern: {}", full_pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_dir())
            .max_by_key(|path| modified(path));

        let dir = newest.ok_or_else(|| {
            eyre!(
                "No inventory report matching '{}' found in {}",
                pattern,
                input_dir.display()
            )
        })?;

        info!(report = %dir.display(), "Using inventory report");
        Ok(Self { dir })
    }

    pub fn advisor_rows(&self) -> Result<Vec<AdvisorRow>> {
        let (_, rows) = read_table(&self.dir.join(ADVISOR_TABLE))?;
        Ok(rows)
    }

    pub fn vm_sheet(&self) -> Result<VmSheet> {
        let (headers, rows) = read_table(&self.dir.join(VM_TABLE))?;
        Ok(VmSheet {
            rows,
            has_power_state: headers.iter().any(|h| h == POWER_STATE_COLUMN),
        })
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Header names (trimmed) and typed rows of one table
fn read_table<T: DeserializeOwned>(path: &Path) -> Result<(Vec<String>, Vec<T>)> {
    if !path.is_file() {
        return Err(eyre!("Missing report table: {}", path.display()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .wrap_err_with(|| format!("Failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .wrap_err_with(|| format!("Failed to read headers of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, csv::Error>>()
        .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

    debug!(table = %path.display(), rows = rows.len(), "Loaded report table");
    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    const VMS: &str = "\
VM Name,VM Size,OS Type,OS Name,Location,Power State,Tag Name,Tag Value
vm-a,Standard_D2s_v3,Windows,Windows Server 2019,eastus,VM running,ApplicationName,Billing
vm-a,Standard_D2s_v3,Windows,Windows Server 2019,eastus,VM running,Env,prod
vm-b,Standard_B2s,Linux,Ubuntu 22.04,westus,VM deallocated,,
";

    const ADVISOR: &str = "\
Category,Impact,Description,SKU,Savings Region,Quantity,Annual Savings,Name
Cost,High,Buy virtual machine reserved instances to save money,Standard_D2s_v3,eastus,2,\"1,250.50\",sub-prod
Security,Medium,Enable MFA,,,,,sub-prod
";

    fn report_dir(root: &Path, name: &str, mtime_secs: u64) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(VM_TABLE), VMS).unwrap();
        fs::write(dir.join(ADVISOR_TABLE), ADVISOR).unwrap();
        File::open(&dir)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
            .unwrap();
        dir
    }

    #[test]
    fn test_locate_picks_newest_matching_directory() {
        let root = TempDir::new().unwrap();
        report_dir(root.path(), "AzureResourceInventory_Report_2024-01-01", 1_700_000_000);
        let newest = report_dir(root.path(), "AzureResourceInventory_Report_2023-06-01", 1_800_000_000);
        report_dir(root.path(), "SomethingElse", 1_900_000_000);

        let report = InventoryReport::locate(root.path(), "AzureResourceInventory_Report_*").unwrap();
        assert_eq!(report.dir, newest);
    }

    #[test]
    fn test_locate_fails_without_match() {
        let root = TempDir::new().unwrap();
        let err = InventoryReport::locate(root.path(), "AzureResourceInventory_Report_*").unwrap_err();
        assert!(err.to_string().contains("No inventory report"));
    }

    #[test]
    fn test_reads_typed_rows() {
        let root = TempDir::new().unwrap();
        let dir = report_dir(root.path(), "AzureResourceInventory_Report_1", 1_700_000_000);
        let report = InventoryReport { dir };

        let sheet = report.vm_sheet().unwrap();
        assert!(sheet.has_power_state);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0].tag_value.as_deref(), Some("Billing"));
        assert_eq!(sheet.rows[2].tag_name, None);

        let advisor = report.advisor_rows().unwrap();
        assert_eq!(advisor.len(), 2);
        assert_eq!(advisor[0].annual_savings.as_deref(), Some("1,250.50"));
        assert_eq!(advisor[1].sku, None);
    }

    #[test]
    fn test_missing_power_state_column_is_reported() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("AzureResourceInventory_Report_1");
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join(VM_TABLE),
            "VM Name,VM Size,OS Type,OS Name,Location,Tag Name,Tag Value\nvm-a,Standard_B2s,Linux,Ubuntu,westus,,\n",
        )
        .unwrap();

        let sheet = InventoryReport { dir }.vm_sheet().unwrap();
        assert!(!sheet.has_power_state);
        assert_eq!(sheet.rows[0].power_state, None);
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("AzureResourceInventory_Report_1");
        fs::create_dir(&dir).unwrap();

        let err = InventoryReport { dir }.advisor_rows().unwrap_err();
        assert!(err.to_string().contains("Missing report table"));
    }
}
