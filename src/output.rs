//! Result types returned by the scan entry points.

use crate::error::ScanIssue;
use crate::model::SubscriptionRecord;
use serde::{Deserialize, Serialize};

/// What one file contributed to a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileScan {
    pub filename: String,
    /// Records from this file, ids local to the file (`s0`, `s1`, …).
    pub records: Vec<SubscriptionRecord>,
    /// Characters of text extracted from the file.
    pub extracted_chars: usize,
    /// Characters actually sent to the model.
    pub input_chars: usize,
    /// Whether the statement text was cut at `max_input_chars`.
    pub truncated: bool,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub retries: u32,
    pub duration_ms: u64,
    /// Set when the file yielded nothing because something went wrong.
    pub issue: Option<ScanIssue>,
}

impl FileScan {
    pub fn is_ok(&self) -> bool {
        self.issue.is_none()
    }
}

/// Combined result of scanning every file in one upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutput {
    /// All records in upload order, renumbered `s0..sN-1` across files.
    pub records: Vec<SubscriptionRecord>,
    pub files: Vec<FileScan>,
    pub stats: ScanStats,
}

/// Aggregate numbers for a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub truncated_files: usize,
    pub total_records: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

impl ScanStats {
    pub fn from_files(files: &[FileScan], total_duration_ms: u64) -> Self {
        Self {
            total_files: files.len(),
            files_with_issues: files.iter().filter(|f| !f.is_ok()).count(),
            truncated_files: files.iter().filter(|f| f.truncated).count(),
            total_records: files.iter().map(|f| f.records.len()).sum(),
            total_input_tokens: files.iter().map(|f| f.input_tokens as u64).sum(),
            total_output_tokens: files.iter().map(|f| f.output_tokens as u64).sum(),
            total_duration_ms,
        }
    }
}
