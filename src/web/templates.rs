//! askama page types and the view rows they render.
//!
//! Numbers are formatted to two decimals here so the templates stay free of
//! filters.

use crate::model::{Category, SubscriptionRecord};
use crate::report::{Report, Totals};
use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::error;

fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Only web links are rendered as anchors; bare `host/path` gets `https://`.
fn linkable(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else if url.contains('.') && !url.contains(':') && !url.contains(char::is_whitespace) {
        format!("https://{url}")
    } else {
        String::new()
    }
}

pub struct CategoryOption {
    pub value: &'static str,
    pub selected: bool,
}

/// One table row.
pub struct RecordRow {
    pub id: String,
    pub name: String,
    pub amount: String,
    pub frequency: String,
    pub last_charged: String,
    pub count: u32,
    pub monthly: String,
    pub yearly: String,
    pub cancel_url: String,
    pub category: &'static str,
    pub options: Vec<CategoryOption>,
}

impl From<&SubscriptionRecord> for RecordRow {
    fn from(r: &SubscriptionRecord) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            amount: money(r.amount),
            frequency: r.frequency.clone(),
            last_charged: r.last_charged.clone(),
            count: r.count,
            monthly: money(r.monthly),
            yearly: money(r.yearly),
            cancel_url: linkable(&r.cancel_url),
            category: r.category.as_str(),
            options: Category::ALL
                .iter()
                .map(|c| CategoryOption {
                    value: c.as_str(),
                    selected: *c == r.category,
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    pub sid: String,
    pub error: Option<String>,
    pub rows: Vec<RecordRow>,
    pub total_monthly: String,
    pub total_yearly: String,
}

impl IndexPage {
    /// Upload form only.
    pub fn empty(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            error: None,
            rows: Vec::new(),
            total_monthly: money(0.0),
            total_yearly: money(0.0),
        }
    }

    /// Upload form with an error banner and no table.
    pub fn with_error(sid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(sid)
        }
    }

    /// Upload form plus the session's table and totals.
    pub fn with_records(sid: impl Into<String>, records: &[SubscriptionRecord]) -> Self {
        let totals = Totals::from_records(records);
        Self {
            sid: sid.into(),
            error: None,
            rows: records.iter().map(RecordRow::from).collect(),
            total_monthly: money(totals.total_monthly),
            total_yearly: money(totals.total_yearly),
        }
    }
}

pub struct ReportSection {
    pub title: &'static str,
    pub category: &'static str,
    pub rows: Vec<RecordRow>,
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportPage {
    pub sid: String,
    pub sections: Vec<ReportSection>,
    pub savings: String,
    pub total_yearly: String,
    pub total: usize,
}

impl ReportPage {
    pub fn new(sid: impl Into<String>, report: &Report) -> Self {
        let section = |title, category: Category| ReportSection {
            title,
            category: category.as_str(),
            rows: report.bucket(category).iter().map(RecordRow::from).collect(),
        };
        Self {
            sid: sid.into(),
            sections: vec![
                section("Cancel", Category::Cancel),
                section("Investigate", Category::Investigate),
                section("Keep", Category::Keep),
                section("Pending", Category::Pending),
            ],
            savings: money(report.savings),
            total_yearly: money(report.total_yearly),
            total: report.total,
        }
    }
}

/// Render any page, turning template failures into a bare 500.
pub fn render<T: Template>(page: &T) -> Response {
    match page.render() {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            error!("template render failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response()
        }
    }
}
