//! JSON report generation

use super::ReportResult;
use crate::finding::ScanPayload;

/// The stored payload, unchanged
pub fn generate(payload: &ScanPayload) -> ReportResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(payload)?)
}
