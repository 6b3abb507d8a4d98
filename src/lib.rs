//! # subtrack
//!
//! Find recurring subscriptions in bank statements with an LLM, then triage
//! them and see what cancelling would save.
//!
//! ## Why this crate?
//!
//! Statements list every charge once per occurrence, in whatever layout the
//! bank chose. Rules that spot "the same merchant every month" break on the
//! first renamed descriptor. Instead this crate hands the statement text to
//! a model via OpenRouter, asks for a JSON list of recurring charges, and
//! normalises whatever comes back into priced [`SubscriptionRecord`]s.
//!
//! ## Pipeline Overview
//!
//! ```text
//! statement (PDF / CSV / TXT)
//!  │
//!  ├─ 1. Extract    PDF text via pdf-extract, else UTF-8 / Latin-1 decode
//!  ├─ 2. Request    prompt + first 50 000 chars (+ JSON schema if structured)
//!  ├─ 3. Complete   OpenRouter chat-completions, optional retry/backoff
//!  ├─ 4. Normalise  repair JSON, fill defaults, monthly/yearly at 2 dp
//!  └─ 5. Session    replace the session's list; triage; savings report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use subtrack::{scan_paths, TrackerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key read from OPENROUTER_API_KEY at call time
//!     let config = TrackerConfig::default();
//!     let output = scan_paths(&["statement.pdf"], &config).await?;
//!     for r in &output.records {
//!         println!("{:<24} {:>8.2}/mo {:>9.2}/yr", r.name, r.monthly, r.yearly);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `web`   | on      | axum routes + askama pages for the browser triage UI |
//! | `cli`   | on      | Enables the `subtrack` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable both when using only the library:
//! ```toml
//! subtrack = { version = "0.1", default-features = false }
//! ```
//!
//! ## Extraction Modes
//!
//! | Mode | Request | Parsing |
//! |------|---------|---------|
//! | `unstructured` (default) | prompt only | fences stripped, first `{` to last `}`, lenient |
//! | `structured` | prompt + strict `json_schema` response format | strict, no repair |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod scan;
pub mod session;
#[cfg(feature = "web")]
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ApiKey, ExtractionMode, ServerConfig, TrackerConfig, TrackerConfigBuilder};
pub use error::{ScanIssue, SubTrackError};
pub use model::{BillingCycle, Category, SubscriptionRecord, UnknownCategory};
pub use output::{FileScan, ScanOutput, ScanStats};
pub use pipeline::llm::{Completion, CompletionClient, OpenRouterClient};
pub use progress::{NoopProgressCallback, ProgressCallback, ScanProgressCallback};
pub use report::{Report, Totals};
pub use scan::{scan_file, scan_files, scan_paths, UploadedFile};
pub use session::SessionStore;
