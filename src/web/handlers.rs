use super::templates::{render, IndexPage, ReportPage};
use super::AppState;
use crate::error::SubTrackError;
use crate::model::Category;
use crate::scan::{scan_files, UploadedFile};
use axum::extract::multipart::MultipartError;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Deserialize)]
pub struct CategorizeForm {
    pub category: String,
    pub sid: String,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub sid: String,
}

/// GET /: a fresh session and an empty upload form.
pub async fn index(State(state): State<AppState>) -> Response {
    let sid = state.sessions.create().await;
    render(&IndexPage::empty(sid))
}

/// POST /upload
///
/// The session is only replaced when the scan succeeds; any error leaves the
/// previous list in place and shows a banner.
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let (sid, files) = match read_upload(multipart).await {
        Ok(parts) => parts,
        Err(e) => {
            warn!("upload: unreadable multipart body: {}", e);
            return e.into_response();
        }
    };
    let Some(sid) = sid else {
        warn!("upload: missing sid field");
        return render(&IndexPage::with_error(
            state.sessions.create().await,
            "Session expired, please upload again",
        ));
    };

    info!(sid = %sid, files = files.len(), "upload received");

    match scan_files(&files, &state.config, state.client.as_ref()).await {
        Ok(output) => {
            state.sessions.replace(&sid, output.records).await;
            let records = state.sessions.records(&sid).await;
            render(&IndexPage::with_records(sid, &records))
        }
        Err(e) => {
            if !matches!(e, SubTrackError::NoSubscriptionsFound) {
                warn!(sid = %sid, "upload failed: {}", e);
            }
            render(&IndexPage::with_error(sid, e.to_string()))
        }
    }
}

/// Pull the `sid` text field and every `files` part out of the body.
///
/// Browsers send an empty, unnamed part when no file was chosen; those are
/// skipped.
async fn read_upload(
    mut multipart: Multipart,
) -> Result<(Option<String>, Vec<UploadedFile>), MultipartError> {
    let mut sid = None;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "sid" => sid = Some(field.text().await?),
            "files" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field.bytes().await?;
                if filename.is_empty() && bytes.is_empty() {
                    continue;
                }
                files.push(UploadedFile::new(filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    Ok((sid.filter(|s| !s.trim().is_empty()), files))
}

/// POST /categorize/:id
pub async fn categorize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<CategorizeForm>,
) -> Response {
    match form.category.parse::<Category>() {
        Ok(category) => {
            state.sessions.set_category(&form.sid, &id, category).await;
        }
        Err(e) => warn!(sid = %form.sid, record_id = %id, "categorize: {}", e),
    }
    let records = state.sessions.records(&form.sid).await;
    render(&IndexPage::with_records(form.sid, &records))
}

/// GET /report?sid=…
pub async fn report(State(state): State<AppState>, Query(q): Query<ReportQuery>) -> Response {
    let report = state.sessions.report(&q.sid).await;
    render(&ReportPage::new(q.sid, &report))
}

pub async fn health() -> &'static str {
    "ok"
}
