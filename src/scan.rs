//! Scan entry points: uploaded files → subscription records.
//!
//! Per file the pipeline runs
//!
//! ```text
//! extract ──▶ credential check ──▶ build request ──▶ complete ──▶ normalise
//! ```
//!
//! and the per-file record lists are concatenated in upload order.
//!
//! Two kinds of failure are treated very differently:
//!
//! * unreadable input and a missing API key abort the whole scan with a
//!   [`SubTrackError`] before any network call is made;
//! * a failed or malformed completion only empties that file's list. The
//!   reason is logged and kept as a [`ScanIssue`] on the [`FileScan`].

use crate::config::TrackerConfig;
use crate::error::{ScanIssue, SubTrackError};
use crate::output::{FileScan, ScanOutput, ScanStats};
use crate::pipeline::llm::{complete_with_retry, CompletionClient, OpenRouterClient};
use crate::pipeline::normalize::{normalize_response, ID_PREFIX};
use crate::pipeline::{extract, request};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One uploaded statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Scan one file's bytes.
///
/// # Errors
/// * [`SubTrackError::UnreadableFile`]: no text could be extracted
/// * [`SubTrackError::MissingCredential`]: no API key configured
///
/// Completion and parsing failures are *not* errors: they yield an empty
/// [`FileScan`] with `issue` set.
pub async fn scan_file(
    bytes: &[u8],
    filename: &str,
    config: &TrackerConfig,
    client: &dyn CompletionClient,
) -> Result<FileScan, SubTrackError> {
    let start = Instant::now();

    // ── Step 1: Extract text ─────────────────────────────────────────────
    let text = extract::extract_text(bytes, filename);
    if text.trim().is_empty() {
        warn!("{}: no readable text ({} bytes)", filename, bytes.len());
        return Err(SubTrackError::UnreadableFile {
            filename: filename.to_string(),
        });
    }
    let extracted_chars = text.chars().count();
    debug!("{}: {} chars of text", filename, extracted_chars);

    // ── Step 2: Credential ───────────────────────────────────────────────
    let api_key = config.resolve_api_key()?;

    // ── Step 3: Build request ────────────────────────────────────────────
    let req = request::build_request(&text, config);

    let mut scan = FileScan {
        filename: filename.to_string(),
        records: Vec::new(),
        extracted_chars,
        input_chars: req.input_chars,
        truncated: req.truncated,
        input_tokens: 0,
        output_tokens: 0,
        retries: 0,
        duration_ms: 0,
        issue: None,
    };

    // ── Step 4: Complete ─────────────────────────────────────────────────
    let completion = match complete_with_retry(client, &req, &api_key, config).await {
        Ok((completion, retries)) => {
            scan.retries = retries;
            scan.input_tokens = completion.prompt_tokens;
            scan.output_tokens = completion.completion_tokens;
            completion
        }
        Err(e) => {
            warn!("{}: completion failed: {}", filename, e);
            scan.retries = if e.is_retryable() { config.max_retries } else { 0 };
            scan.issue = Some(ScanIssue::Completion {
                filename: filename.to_string(),
                retries: scan.retries,
                detail: e.to_string(),
            });
            scan.duration_ms = start.elapsed().as_millis() as u64;
            return Ok(scan);
        }
    };

    // ── Step 5: Normalise ────────────────────────────────────────────────
    match normalize_response(&completion.content, req.shape.mode()) {
        Ok(records) => {
            info!("{}: {} subscriptions", filename, records.len());
            scan.records = records;
        }
        Err(e) => {
            warn!("{}: could not parse model response: {}", filename, e);
            debug!("{}: raw response: {}", filename, completion.content);
            scan.issue = Some(ScanIssue::MalformedResponse {
                filename: filename.to_string(),
                detail: e.to_string(),
            });
        }
    }

    scan.duration_ms = start.elapsed().as_millis() as u64;
    Ok(scan)
}

/// Scan every file of an upload and concatenate the results in upload order.
///
/// Up to `config.concurrency` files are in flight at once; output order
/// always matches input order. Records are renumbered `s0..sN-1` across the
/// whole upload so ids stay unique when several files are scanned together.
///
/// # Errors
/// The first fatal per-file error in upload order (files not yet started
/// at that point are skipped), [`SubTrackError::NoFiles`]
/// for an empty upload, or [`SubTrackError::NoSubscriptionsFound`] when
/// every file came back empty.
pub async fn scan_files(
    files: &[UploadedFile],
    config: &TrackerConfig,
    client: &dyn CompletionClient,
) -> Result<ScanOutput, SubTrackError> {
    let total_start = Instant::now();
    let total = files.len();
    if total == 0 {
        return Err(SubTrackError::NoFiles);
    }
    info!("Scanning {} file(s)", total);

    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_start(total);
    }

    // Collected up front; a lazy `map` here leaves the upload handler's
    // future not `Send` for every borrow lifetime.
    let tasks: Vec<_> = files
        .iter()
        .enumerate()
        .map(|(i, file)| async move {
            let index = i + 1;
            if let Some(ref cb) = config.progress_callback {
                cb.on_file_start(index, total, &file.filename);
            }
            let result = scan_file(&file.bytes, &file.filename, config, client).await;
            if let Some(ref cb) = config.progress_callback {
                match &result {
                    Ok(scan) => match &scan.issue {
                        None => cb.on_file_complete(index, total, &file.filename, scan.records.len()),
                        Some(issue) => cb.on_file_error(index, total, &file.filename, &issue.to_string()),
                    },
                    Err(e) => cb.on_file_error(index, total, &file.filename, &e.to_string()),
                }
            }
            result
        })
        .collect();

    // `try_collect` stops polling at the first fatal error, so files queued
    // behind it are never sent to the model.
    let scans: Vec<FileScan> = stream::iter(tasks)
        .buffered(config.concurrency.max(1))
        .try_collect()
        .await?;

    let mut records: Vec<_> = scans.iter().flat_map(|s| s.records.iter().cloned()).collect();
    for (i, record) in records.iter_mut().enumerate() {
        record.id = format!("{ID_PREFIX}{i}");
    }

    let stats = ScanStats::from_files(&scans, total_start.elapsed().as_millis() as u64);

    if let Some(ref cb) = config.progress_callback {
        cb.on_scan_complete(total, records.len());
    }

    if records.is_empty() {
        info!("No subscriptions found in {} file(s)", total);
        return Err(SubTrackError::NoSubscriptionsFound);
    }

    info!(
        "Scan complete: {} subscriptions from {} file(s), {}ms",
        records.len(),
        total,
        stats.total_duration_ms
    );

    Ok(ScanOutput {
        records,
        files: scans,
        stats,
    })
}

/// Read files from disk and scan them with an [`OpenRouterClient`].
pub async fn scan_paths<P: AsRef<Path>>(
    paths: &[P],
    config: &TrackerConfig,
) -> Result<ScanOutput, SubTrackError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SubTrackError::InputReadFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadedFile::new(filename, bytes));
    }

    let client = OpenRouterClient::new(config)?;
    scan_files(&files, config, &client).await
}
