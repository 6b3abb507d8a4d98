//! Pipeline stages for statement-to-subscriptions extraction.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested on its own.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ request ──▶ llm ──▶ normalize
//! (PDF/text)  (prompt)    (HTTP)  (JSON → records)
//! ```
//!
//! 1. [`extract`]: bytes to plain text; PDFs go through `pdf-extract`,
//!    everything else is decoded as UTF-8 with a Latin-1 fallback
//! 2. [`request`]: truncate the text and wrap it in the extraction prompt,
//!    optionally with a JSON schema for structured output
//! 3. [`llm`]: the completion call with retry/backoff; the only stage
//!    with network I/O
//! 4. [`normalize`]: repair and parse the model's JSON, fill defaults and
//!    compute monthly/yearly costs

pub mod extract;
pub mod llm;
pub mod normalize;
pub mod request;
