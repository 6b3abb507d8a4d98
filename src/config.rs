//! Configuration types for subscription scanning and the web UI.
//!
//! Every knob of the extraction pipeline lives in [`TrackerConfig`], built
//! via its [`TrackerConfigBuilder`]. The web server's own settings live in
//! [`ServerConfig`].
//!
//! The API key is not required at build time; it is resolved per scan (see
//! [`TrackerConfig::resolve_api_key`]), and a missing key surfaces as an
//! error banner on the next upload.

use crate::error::SubTrackError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default OpenRouter model.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// Default OpenRouter API root.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Environment variable holding the OpenRouter key.
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Statement text beyond this many characters is dropped before prompting.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;

/// Configuration for a subscription scan.
///
/// Built via [`TrackerConfig::builder()`] or using [`TrackerConfig::default()`].
///
/// # Example
/// ```rust
/// use subtrack::{ExtractionMode, TrackerConfig};
///
/// let config = TrackerConfig::builder()
///     .model("openai/gpt-4.1-mini")
///     .mode(ExtractionMode::Structured)
///     .max_input_chars(20_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_input_chars, 20_000);
/// ```
#[derive(Clone)]
pub struct TrackerConfig {
    /// OpenRouter model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per file. Default: 8000.
    pub max_tokens: u32,

    /// Hard character cutoff applied to extracted text. Default: 50 000.
    pub max_input_chars: usize,

    /// Free-text-with-repair or schema-constrained output. Default: unstructured.
    pub mode: ExtractionMode,

    /// Explicit API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is `None`.
    pub api_key_env: String,

    /// API root; `/chat/completions` is appended. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Per-call timeout in seconds. `None` leaves it to the HTTP client.
    pub api_timeout_secs: Option<u64>,

    /// Retries on a retryable completion failure. Default: 0.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Files scanned at once in a multi-file upload. Default: 1.
    ///
    /// Results are always concatenated in upload order regardless.
    pub concurrency: usize,

    /// Replacement for the built-in instruction prompt.
    pub prompt: Option<String>,

    /// Optional per-file progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 8000,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            mode: ExtractionMode::default(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_timeout_secs: None,
            max_retries: 0,
            retry_backoff_ms: 500,
            concurrency: 1,
            prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl TrackerConfig {
    /// Create a new builder for `TrackerConfig`.
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Find the API key: the explicit override first, then the environment.
    ///
    /// Blank values count as missing.
    pub fn resolve_api_key(&self) -> Result<ApiKey, SubTrackError> {
        let from_config = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        let key = match from_config {
            Some(k) => Some(k),
            None => std::env::var(&self.api_key_env)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        };

        key.map(ApiKey).ok_or_else(|| SubTrackError::MissingCredential {
            var: self.api_key_env.clone(),
        })
    }

    /// The chat-completions endpoint under `base_url`.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`TrackerConfig`].
#[derive(Debug)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<TrackerConfig, SubTrackError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(SubTrackError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_input_chars == 0 {
            return Err(SubTrackError::InvalidConfig(
                "max_input_chars must be ≥ 1".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(SubTrackError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(SubTrackError::InvalidConfig(format!(
                "base_url must be an http(s) URL, got '{}'",
                c.base_url
            )));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(SubTrackError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── API key ──────────────────────────────────────────────────────────────

/// A resolved OpenRouter key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the model is asked to shape its answer.
///
/// | Mode | Request | Response handling |
/// |------|---------|-------------------|
/// | `Unstructured` | prompt describes the JSON shape | fences stripped, `{…}` sliced out, then parsed |
/// | `Structured` | request carries a JSON schema | parsed as-is |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    #[default]
    Unstructured,
    Structured,
}

// ── Server ───────────────────────────────────────────────────────────────

/// Settings for the browser UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request body cap for `/upload`. Default: 25 MiB.
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_documented_values() {
        let c = TrackerConfig::default();
        assert_eq!(c.model, "google/gemini-2.0-flash-001");
        assert_eq!(c.temperature, 0.1);
        assert_eq!(c.max_tokens, 8000);
        assert_eq!(c.max_input_chars, 50_000);
        assert_eq!(c.mode, ExtractionMode::Unstructured);
        assert_eq!(c.max_retries, 0);
        assert!(c.api_timeout_secs.is_none());
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = TrackerConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);

        assert!(TrackerConfig::builder().max_input_chars(0).build().is_err());
        assert!(TrackerConfig::builder().model("  ").build().is_err());
        assert!(TrackerConfig::builder().base_url("ftp://x").build().is_err());
        assert!(TrackerConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let c = TrackerConfig::builder()
            .api_key("sk-explicit")
            .api_key_env("SUBTRACK_TEST_KEY_UNSET_1")
            .build()
            .unwrap();
        assert_eq!(c.resolve_api_key().unwrap().expose(), "sk-explicit");
    }

    #[test]
    fn missing_key_reports_env_var() {
        let c = TrackerConfig::builder()
            .api_key("   ")
            .api_key_env("SUBTRACK_TEST_KEY_UNSET_2")
            .build()
            .unwrap();
        match c.resolve_api_key() {
            Err(SubTrackError::MissingCredential { var }) => {
                assert_eq!(var, "SUBTRACK_TEST_KEY_UNSET_2")
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_key() {
        let c = TrackerConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(!format!("{:?}", ApiKey::new("sk-secret")).contains("sk-secret"));
    }

    #[test]
    fn completions_url_handles_trailing_slash() {
        let c = TrackerConfig::builder()
            .base_url("http://127.0.0.1:9999/api/v1/")
            .build()
            .unwrap();
        assert_eq!(c.completions_url(), "http://127.0.0.1:9999/api/v1/chat/completions");
    }
}
