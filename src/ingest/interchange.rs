use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::domain::email::EmailRecord;

pub fn write_records(path: &Path, records: &[EmailRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(records)?;
    fs::write(path, s).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Records in the file, or an empty list when there is no file.
pub fn read_records(path: &Path) -> Result<Vec<EmailRecord>> {
    if !path.exists() {
        return Ok(vec![]);
    }
    let s = fs::read_to_string(path)?;
    let records = serde_json::from_str(&s).with_context(|| format!("parsing {}", path.display()))?;
    Ok(records)
}
