//! End-to-end pipeline tests: uploaded bytes → records → session → report.
//!
//! The model is replaced by scripted [`CompletionClient`]s, so these run
//! offline and deterministically.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subtrack::pipeline::request::ExtractionRequest;
use subtrack::{
    scan_files, ApiKey, Category, Completion, CompletionClient, ExtractionMode, ScanIssue,
    ScanProgressCallback, SessionStore, SubTrackError, TrackerConfig, UploadedFile,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Picks a reply by looking for a merchant keyword in the prompt.
///
/// Files whose keyword comes earlier in `routes` answer more slowly, so with
/// concurrency > 1 they finish last.
struct ByKeyword {
    routes: Vec<(&'static str, &'static str)>,
    calls: AtomicUsize,
}

impl ByKeyword {
    fn new(routes: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            routes,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CompletionClient for ByKeyword {
    async fn complete(
        &self,
        request: &ExtractionRequest,
        _api_key: &ApiKey,
    ) -> Result<Completion, SubTrackError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = self.routes.len();
        for (i, (keyword, reply)) in self.routes.iter().enumerate() {
            if request.prompt.contains(keyword) {
                tokio::time::sleep(Duration::from_millis(((n - i) * 15) as u64)).await;
                return Ok(Completion {
                    content: reply.to_string(),
                    prompt_tokens: 50,
                    completion_tokens: 10,
                });
            }
        }
        Ok(Completion {
            content: r#"{"subscriptions":[]}"#.into(),
            ..Completion::default()
        })
    }
}

fn keyed() -> TrackerConfig {
    TrackerConfig::builder().api_key("sk-test").build().unwrap()
}

const NETFLIX: &str = r#"{"subscriptions":[{"name":"Netflix","amount":15.99,"frequency":"monthly","last_charged":"2024-01-15","count":3}]}"#;
const SPOTIFY_FENCED: &str = "Here you go:\n```json\n{\"subscriptions\":[{\"name\":\"Spotify\",\"amount\":\"9.99\",\"frequency\":\"Monthly\",\"count\":2}]}\n```";
const DOMAIN_YEARLY: &str = r#"{"subscriptions":[{"name":"Domain","amount":12,"frequency":"yearly","last_charged":"2023-11-02","count":1,"cancel_url":"https://registrar.example/cancel"}]}"#;

// ── Scanning ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn netflix_statement_yields_one_pending_record() {
    let client = ByKeyword::new(vec![("NETFLIX", NETFLIX)]);
    let files = vec![UploadedFile::new(
        "jan.csv",
        "2024-01-15,NETFLIX.COM,-15.99\n2023-12-15,NETFLIX.COM,-15.99\n",
    )];

    let out = scan_files(&files, &keyed(), &client).await.unwrap();

    assert_eq!(out.records.len(), 1);
    let r = &out.records[0];
    assert_eq!(r.id, "s0");
    assert_eq!(r.name, "Netflix");
    assert_eq!(r.monthly, 15.99);
    assert_eq!(r.yearly, 191.88);
    assert_eq!(r.count, 3);
    assert_eq!(r.category, Category::Pending);
    assert_eq!(r.cancel_url, "");
}

#[tokio::test]
async fn prose_and_fences_around_json_are_tolerated() {
    let client = ByKeyword::new(vec![("SPOTIFY", SPOTIFY_FENCED)]);
    let files = vec![UploadedFile::new("feb.txt", "SPOTIFY AB 9.99")];

    let out = scan_files(&files, &keyed(), &client).await.unwrap();

    let r = &out.records[0];
    assert_eq!(r.name, "Spotify");
    assert_eq!(r.amount, 9.99);
    assert_eq!(r.frequency, "monthly");
    assert_eq!(r.last_charged, "");
    assert_eq!(r.yearly, 119.88);
}

#[tokio::test]
async fn files_keep_upload_order_under_concurrency() {
    let client = ByKeyword::new(vec![
        ("NETFLIX", NETFLIX),
        ("SPOTIFY", SPOTIFY_FENCED),
        ("REGISTRAR", DOMAIN_YEARLY),
    ]);
    let config = TrackerConfig::builder()
        .api_key("sk-test")
        .concurrency(3)
        .build()
        .unwrap();
    let files = vec![
        UploadedFile::new("a.txt", "NETFLIX 15.99"),
        UploadedFile::new("b.txt", "SPOTIFY 9.99"),
        UploadedFile::new("c.txt", "REGISTRAR 12.00"),
    ];

    let out = scan_files(&files, &config, &client).await.unwrap();

    let names: Vec<_> = out.records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Netflix", "Spotify", "Domain"]);
    let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["s0", "s1", "s2"]);
    assert_eq!(out.stats.total_records, 3);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn one_malformed_file_does_not_sink_the_upload() {
    let client = ByKeyword::new(vec![
        ("NETFLIX", NETFLIX),
        ("GARBLED", "I could not find any subscriptions, sorry!"),
    ]);
    let files = vec![
        UploadedFile::new("good.txt", "NETFLIX 15.99"),
        UploadedFile::new("bad.txt", "GARBLED"),
    ];

    let out = scan_files(&files, &keyed(), &client).await.unwrap();

    assert_eq!(out.records.len(), 1);
    assert!(out.files[0].is_ok());
    assert!(matches!(
        out.files[1].issue,
        Some(ScanIssue::MalformedResponse { ref filename, .. }) if filename == "bad.txt"
    ));
    assert_eq!(out.stats.files_with_issues, 1);
}

#[tokio::test]
async fn corrupt_pdf_is_unreadable() {
    let client = ByKeyword::new(vec![("NETFLIX", NETFLIX)]);
    let files = vec![UploadedFile::new("statement.pdf", b"%PDF-1.7 not really".to_vec())];

    let err = scan_files(&files, &keyed(), &client).await.unwrap_err();

    assert!(matches!(err, SubTrackError::UnreadableFile { ref filename } if filename == "statement.pdf"));
    assert_eq!(err.to_string(), "Could not read file contents");
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn latin1_statement_reaches_the_model() {
    let client = ByKeyword::new(vec![("Café", NETFLIX)]);
    // "Café NETFLIX" in ISO-8859-1.
    let bytes = vec![b'C', b'a', b'f', 0xE9, b' ', b'N', b'E', b'T'];
    let files = vec![UploadedFile::new("latin1.txt", bytes)];

    let out = scan_files(&files, &keyed(), &client).await.unwrap();
    assert_eq!(out.records[0].name, "Netflix");
}

#[tokio::test]
async fn long_statements_are_truncated() {
    let client = ByKeyword::new(vec![("NETFLIX", NETFLIX)]);
    let config = TrackerConfig::builder()
        .api_key("sk-test")
        .max_input_chars(20)
        .build()
        .unwrap();
    let text = format!("NETFLIX 15.99 {}", "x".repeat(500));
    let files = vec![UploadedFile::new("long.txt", text)];

    let out = scan_files(&files, &config, &client).await.unwrap();

    let file = &out.files[0];
    assert!(file.truncated);
    assert_eq!(file.input_chars, 20);
    assert_eq!(file.extracted_chars, 514);
    assert_eq!(out.stats.truncated_files, 1);
}

#[tokio::test]
async fn structured_mode_reads_schema_answers() {
    let client = ByKeyword::new(vec![("REGISTRAR", DOMAIN_YEARLY)]);
    let config = TrackerConfig::builder()
        .api_key("sk-test")
        .mode(ExtractionMode::Structured)
        .build()
        .unwrap();
    let files = vec![UploadedFile::new("c.txt", "REGISTRAR 12.00")];

    let out = scan_files(&files, &config, &client).await.unwrap();

    let r = &out.records[0];
    assert_eq!(r.yearly, 12.0);
    assert_eq!(r.monthly, 1.0);
    assert_eq!(r.cancel_url, "https://registrar.example/cancel");
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    started: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    finished_with: AtomicUsize,
}

impl ScanProgressCallback for Counting {
    fn on_file_start(&self, _index: usize, _total: usize, _filename: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_complete(&self, _index: usize, _total: usize, _filename: &str, _records: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_file_error(&self, _index: usize, _total: usize, _filename: &str, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_scan_complete(&self, _total_files: usize, total_records: usize) {
        self.finished_with.store(total_records, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_file() {
    let counter = Arc::new(Counting::default());
    let config = TrackerConfig::builder()
        .api_key("sk-test")
        .progress_callback(counter.clone())
        .build()
        .unwrap();
    let client = ByKeyword::new(vec![("NETFLIX", NETFLIX), ("GARBLED", "nope")]);
    let files = vec![
        UploadedFile::new("a.txt", "NETFLIX"),
        UploadedFile::new("b.txt", "GARBLED"),
    ];

    scan_files(&files, &config, &client).await.unwrap();

    assert_eq!(counter.started.load(Ordering::SeqCst), 2);
    assert_eq!(counter.completed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.failed.load(Ordering::SeqCst), 1);
    assert_eq!(counter.finished_with.load(Ordering::SeqCst), 1);
}

// ── Session + report ─────────────────────────────────────────────────────────

#[tokio::test]
async fn triage_flow_computes_savings() {
    let client = ByKeyword::new(vec![
        ("NETFLIX", NETFLIX),
        ("SPOTIFY", SPOTIFY_FENCED),
        ("REGISTRAR", DOMAIN_YEARLY),
    ]);
    let files = vec![
        UploadedFile::new("a.txt", "NETFLIX"),
        UploadedFile::new("b.txt", "SPOTIFY"),
        UploadedFile::new("c.txt", "REGISTRAR"),
    ];
    let store = SessionStore::new();
    let sid = store.create().await;

    let out = scan_files(&files, &keyed(), &client).await.unwrap();
    store.replace(&sid, out.records).await;

    assert!(store.set_category(&sid, "s0", Category::Cancel).await);
    assert!(store.set_category(&sid, "s1", Category::Keep).await);
    assert!(store.set_category(&sid, "s2", Category::Cancel).await);

    let totals = store.totals(&sid).await;
    assert_eq!(totals.count, 3);
    assert_eq!(totals.total_yearly, 323.76);

    let report = store.report(&sid).await;
    // 191.88 + 12.00
    assert_eq!(report.savings, 203.88);
    assert_eq!(report.keep[0].name, "Spotify");
    assert!(report.pending.is_empty());
}

#[tokio::test]
async fn reupload_replaces_the_session_list() {
    let client = ByKeyword::new(vec![("NETFLIX", NETFLIX)]);
    let files = vec![UploadedFile::new("a.txt", "NETFLIX")];
    let store = SessionStore::new();
    let sid = store.create().await;

    for _ in 0..2 {
        let out = scan_files(&files, &keyed(), &client).await.unwrap();
        store.replace(&sid, out.records).await;
    }

    let records = store.records(&sid).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "s1");
}
