//! Atomic JSON snapshot writers.
//!
//! The candidate file and dashboard snapshot are consumed by external
//! readers, so they are written to a sibling temp file and renamed into
//! place; a reader never observes a partial write.

use crate::domain::candidate::CandidateBatch;
use crate::domain::dashboard::DashboardSnapshot;
use crate::domain::error::CycletraderError;
use std::fs;
use std::path::Path;

fn write_atomic(path: &Path, json: String) -> Result<(), CycletraderError> {
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn write_candidate_file(path: &Path, batch: &CandidateBatch) -> Result<(), CycletraderError> {
    let json = serde_json::to_string_pretty(batch).map_err(|e| CycletraderError::Database {
        reason: format!("candidate file serialization: {e}"),
    })?;
    write_atomic(path, json)
}

pub fn write_dashboard_file(
    path: &Path,
    snapshot: &DashboardSnapshot,
) -> Result<(), CycletraderError> {
    let json = serde_json::to_string_pretty(snapshot).map_err(|e| CycletraderError::Database {
        reason: format!("dashboard serialization: {e}"),
    })?;
    write_atomic(path, json)
}
