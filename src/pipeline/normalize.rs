//! Response normalisation: model output → [`SubscriptionRecord`]s.
//!
//! ## Why repair at all?
//!
//! Even when told to "return ONLY this JSON", free-text completions come back
//! wrapped in ```` ```json ```` fences, prefixed with "Here you go:", or
//! followed by a friendly sign-off. Unstructured mode therefore:
//!
//! 1. strips code-fence markers (with or without a language tag)
//! 2. slices from the first `{` to the last `}`
//! 3. parses the slice as JSON
//!
//! Structured mode skips the repair and the lenient field decoding: the
//! answer must match the schema exactly (all six item fields, correct types,
//! no extra keys), or it is reported as invalid.
//!
//! Both modes then share one item-to-record step ([`normalize_items`]).

use crate::config::ExtractionMode;
use crate::model::SubscriptionRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

/// Prefix of every record id; the item index follows it.
pub const ID_PREFIX: char = 's';

/// Why a response could not be turned into records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResponseError {
    #[error("response is empty")]
    Empty,

    #[error("no JSON object found in response")]
    NoJsonObject,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// One subscription as the model reported it, before normalisation.
///
/// Every field is optional; missing or `null` values take the defaults
/// applied in [`normalize_items`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawSubscription {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub frequency: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_charged: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cancel_url: Option<String>,
}

/// Free-text payload: a missing `subscriptions` key means "none found".
#[derive(Debug, Deserialize)]
struct LenientPayload {
    #[serde(default)]
    subscriptions: Vec<RawSubscription>,
}

/// Schema-constrained payload: `subscriptions` is required and nothing else
/// is allowed.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictPayload {
    subscriptions: Vec<StrictSubscription>,
}

/// One item exactly as [`crate::prompts::subscription_schema`] describes it:
/// every field present and correctly typed, no coercion.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictSubscription {
    name: String,
    amount: f64,
    #[serde(deserialize_with = "schema_frequency")]
    frequency: String,
    last_charged: String,
    count: u32,
    cancel_url: String,
}

impl From<StrictSubscription> for RawSubscription {
    fn from(item: StrictSubscription) -> Self {
        Self {
            name: Some(item.name),
            amount: Some(item.amount),
            frequency: Some(item.frequency),
            last_charged: Some(item.last_charged),
            count: Some(item.count),
            cancel_url: Some(item.cancel_url),
        }
    }
}

/// Parse and normalise a completion in the given mode.
pub fn normalize_response(
    raw: &str,
    mode: ExtractionMode,
) -> Result<Vec<SubscriptionRecord>, ResponseError> {
    let items = parse_items(raw, mode)?;
    Ok(normalize_items(items))
}

/// Parse a completion into raw items without normalising them.
pub fn parse_items(raw: &str, mode: ExtractionMode) -> Result<Vec<RawSubscription>, ResponseError> {
    if raw.trim().is_empty() {
        return Err(ResponseError::Empty);
    }

    match mode {
        ExtractionMode::Unstructured => {
            let json = repair_json_text(raw)?;
            serde_json::from_str::<LenientPayload>(&json)
                .map(|p| p.subscriptions)
                .map_err(|e| ResponseError::InvalidJson(e.to_string()))
        }
        ExtractionMode::Structured => serde_json::from_str::<StrictPayload>(raw.trim())
            .map(|p| p.subscriptions.into_iter().map(RawSubscription::from).collect())
            .map_err(|e| ResponseError::InvalidJson(e.to_string())),
    }
}

/// Turn raw items into pending records with ids `s0`, `s1`, …
pub fn normalize_items(items: Vec<RawSubscription>) -> Vec<SubscriptionRecord> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            SubscriptionRecord::new(
                format!("{ID_PREFIX}{i}"),
                item.name.unwrap_or_else(|| "?".to_string()),
                item.amount.unwrap_or(0.0),
                item.frequency.as_deref().unwrap_or("monthly"),
                item.last_charged.unwrap_or_default(),
                item.count.unwrap_or(1),
                item.cancel_url.unwrap_or_default(),
            )
        })
        .collect()
}

// ── Repair ───────────────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").unwrap());

/// Remove every code-fence marker, keeping what was between them.
pub fn strip_code_fences(input: &str) -> String {
    if input.contains("```") {
        RE_FENCE.replace_all(input, "").trim().to_string()
    } else {
        input.trim().to_string()
    }
}

/// Slice from the first `{` to the last `}` inclusive.
pub fn slice_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

fn repair_json_text(raw: &str) -> Result<String, ResponseError> {
    let stripped = strip_code_fences(raw);
    slice_json_object(&stripped)
        .map(str::to_string)
        .ok_or(ResponseError::NoJsonObject)
}

// ── Lenient field decoding ───────────────────────────────────────────────

/// A JSON scalar of any kind.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => None,
        Some(Scalar::Text(s)) => Some(s),
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Bool(b)) => Some(b.to_string()),
    })
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Scalar>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Scalar::Int(n)) => Ok(Some(n as f64)),
        Some(Scalar::Float(f)) => Ok(Some(f)),
        Some(Scalar::Text(s)) => parse_amount(&s)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("amount '{s}' is not a number"))),
        Some(Scalar::Bool(_)) => Err(de::Error::custom("amount must be a number")),
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let n = match Option::<Scalar>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Scalar::Int(n)) => n,
        Some(Scalar::Float(f)) if f.is_finite() => f.trunc() as i64,
        Some(Scalar::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| de::Error::custom(format!("count '{s}' is not an integer")))?,
        Some(_) => return Err(de::Error::custom("count must be an integer")),
    };
    u32::try_from(n)
        .map(Some)
        .map_err(|_| de::Error::custom(format!("count {n} is out of range")))
}

/// The schema's frequency enum, matched case-insensitively.
fn schema_frequency<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let label = String::deserialize(deserializer)?;
    match label.to_lowercase().as_str() {
        "monthly" | "yearly" | "weekly" => Ok(label),
        _ => Err(de::Error::unknown_variant(&label, &["monthly", "yearly", "weekly"])),
    }
}

/// Parse "15.99", " $15.99 " or "1,299.00" as a number.
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches(['$', '€', '£'])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}
