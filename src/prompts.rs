//! Instruction prompt and JSON schema for subscription extraction.
//!
//! Callers can override the prompt via
//! [`crate::config::TrackerConfig::prompt`]; the constants here are used only
//! when no override is provided. The statement text is always appended after
//! the prompt.

use serde_json::{json, Value};

/// Default instruction prompt. The statement text follows it directly.
pub const EXTRACTION_PROMPT: &str = r#"Extract subscriptions from this bank statement.

Known services (with cancel URLs):
- Netflix (netflix.com/cancelplan), Spotify (spotify.com/account), YouTube Premium, Hulu, Disney+, HBO Max, Amazon Prime, Apple TV+
- ChatGPT Plus (chat.openai.com/settings), Claude Pro (claude.ai/settings), GitHub Copilot (github.com/settings/copilot), Cursor, Midjourney
- Notion (notion.so/my-account), Dropbox, Adobe, Microsoft 365, 1Password, iCloud, Google One
- X Premium, Discord Nitro (discord.com/settings/subscriptions), LinkedIn Premium
- NYTimes, WSJ, Substack, Planet Fitness, Equinox, Peloton, ClassPass

Return ONLY this JSON:
{"subscriptions": [{"name": "Netflix", "amount": 15.99, "frequency": "monthly", "last_charged": "2024-01-15", "count": 3, "cancel_url": "netflix.com/cancelplan"}]}

Bank statement:
"#;

/// Name sent alongside the schema in structured mode.
pub const SCHEMA_NAME: &str = "subscription_list";

/// JSON schema the structured-mode answer must satisfy.
///
/// Every field is required (strict mode); `cancel_url` may be an empty string
/// when no link is known.
pub fn subscription_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "subscriptions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "description": "Service name" },
                        "amount": { "type": "number", "description": "Charge per billing cycle" },
                        "frequency": {
                            "type": "string",
                            "enum": ["monthly", "yearly", "weekly"]
                        },
                        "last_charged": {
                            "type": "string",
                            "description": "Most recent charge date, YYYY-MM-DD"
                        },
                        "count": {
                            "type": "integer",
                            "description": "Times the charge appears in the statement"
                        },
                        "cancel_url": {
                            "type": "string",
                            "description": "Cancellation link, or empty string"
                        }
                    },
                    "required": ["name", "amount", "frequency", "last_charged", "count", "cancel_url"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["subscriptions"],
        "additionalProperties": false
    })
}
