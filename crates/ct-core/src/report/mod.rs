//! Report generation

pub mod json;
pub mod pdf;

use crate::lifecycle::ScanRecord;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("No results for scan {0}")]
    NotFound(Uuid),

    #[error("Invalid format: {0}")]
    InvalidArgument(String),

    #[error("Report rendering failed: {0}")]
    Render(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Pdf,
}

impl ReportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Pdf => "pdf",
        }
    }

    /// Download name, e.g. `scan_report_<id>.pdf`
    pub fn file_name(&self, scan_id: Uuid) -> String {
        format!("scan_report_{}.{}", scan_id, self.extension())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> ReportResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "pdf" => Ok(ReportFormat::Pdf),
            _ => Err(ReportError::InvalidArgument(s.to_string())),
        }
    }
}

/// Export a scan in the format named by `format`
pub fn export(record: &ScanRecord, format: &str) -> ReportResult<Vec<u8>> {
    let format: ReportFormat = format.parse()?;
    generate_report(record, format)
}

/// Generate report in specified format
pub fn generate_report(record: &ScanRecord, format: ReportFormat) -> ReportResult<Vec<u8>> {
    let payload = record
        .results()
        .ok_or_else(|| ReportError::NotFound(record.id()))?;

    match format {
        ReportFormat::Json => json::generate(payload),
        ReportFormat::Pdf => pdf::generate(record, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("PDF".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert!(matches!(
            "xml".parse::<ReportFormat>(),
            Err(ReportError::InvalidArgument(f)) if f == "xml"
        ));
    }

    #[test]
    fn test_file_name() {
        let id = Uuid::nil();
        assert_eq!(
            ReportFormat::Pdf.file_name(id),
            "scan_report_00000000-0000-0000-0000-000000000000.pdf"
        );
        assert_eq!(ReportFormat::Json.content_type(), "application/json");
    }
}
