//! End-to-end tests driving the timesheet through HTTP
//!
//! These tests build the full router with the shipped templates and
//! in-memory (or temporary directory) storage, then exercise every route.

use async_trait::async_trait;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use chrono::Duration;
use hightech::core::error::HightechError;
use hightech::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// =============================================================================
// Test Collaborators
// =============================================================================

#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

impl CapturingMailer {
    fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for CapturingMailer {
    async fn send(&self, message: MailMessage) -> hightech::core::error::Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Session provider that treats every request as logged in, or none
struct FixedSessions {
    logged_in: bool,
}

#[async_trait]
impl SessionProvider for FixedSessions {
    fn parse(&self, _headers: &HeaderMap) -> Option<Session> {
        self.logged_in.then(|| Session {
            token: "fixed".to_string(),
        })
    }

    async fn verify(&self, _key: &str) -> hightech::core::error::Result<Session> {
        Err(HightechError::upstream("session provider", "not supported"))
    }

    async fn send_verify(&self) -> hightech::core::error::Result<()> {
        Ok(())
    }

    fn save(&self, _session: &Session, _response: &mut HeaderMap, _persistent: bool) {}
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    server: TestServer,
    store: InMemoryInvoiceStore,
    archive: InMemoryArchive,
    mailer: Arc<CapturingMailer>,
}

fn templates_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates")
}

fn clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::from_key("2024-01-05").unwrap())
}

fn document() -> InvoiceDocument {
    let mut doc = InvoiceDocument::create("2024-01-01", Duration::zero()).unwrap();
    doc.user = User {
        name: "Ada Lovelace".to_string(),
        company: "Analytical Engines".to_string(),
        supervisor: "Charles".to_string(),
        prefix: "ADA".to_string(),
        last_invoice: String::new(),
    };
    doc
}

fn harness(sessions: Option<Arc<dyn SessionProvider>>) -> Harness {
    let mut config = AppConfig::for_dir("/tmp/hightech-http-tests");
    config.templates = templates_dir();

    let store = InMemoryInvoiceStore::new(document()).with_clock(clock());
    let archive = InMemoryArchive::new();
    let mailer = Arc::new(CapturingMailer::default());

    let mut builder = ServerBuilder::new(config)
        .with_store(Arc::new(store.clone()))
        .with_archive(Arc::new(archive.clone()))
        .with_mailer(mailer.clone())
        .with_clock(clock());
    if let Some(sessions) = sessions {
        builder = builder.with_sessions(sessions);
    }

    let app = builder.build().expect("Failed to build app");
    let server = TestServer::new(app).expect("Failed to create test server");

    Harness {
        server,
        store,
        archive,
        mailer,
    }
}

fn logged_in() -> Harness {
    harness(Some(Arc::new(FixedSessions { logged_in: true })))
}

fn logged_out() -> Harness {
    harness(Some(Arc::new(FixedSessions { logged_in: false })))
}

fn location(response: &TestResponse) -> String {
    response
        .headers()
        .get(LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// The `name=value` part of the first cookie set by `response`
fn cookie_pair(response: &TestResponse) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

// =============================================================================
// Home
// =============================================================================

mod home_tests {
    use super::*;

    #[tokio::test]
    async fn test_home_renders_period() {
        let h = logged_out();

        let response = h.server.get("/hightech").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body = response.text();
        assert!(body.contains("Analytical Engines timesheet"));
        assert!(body.contains("/hightech/2024-01-14"));
        assert!(body.contains("Send login link"));
        assert!(!body.contains("Close period"));
    }

    #[tokio::test]
    async fn test_home_selects_today() {
        let h = logged_in();

        let body = h.server.get("/hightech").await.text();

        assert!(body.contains(r#"name="key" value="2024-01-05""#));
        assert!(body.contains("Close period"));
    }

    #[tokio::test]
    async fn test_date_path_selects_day() {
        let h = logged_in();

        let body = h.server.get("/hightech/2024-01-03").await.text();

        assert!(body.contains(r#"name="key" value="2024-01-03""#));
    }

    #[tokio::test]
    async fn test_unknown_day_falls_back_to_first_entry() {
        let h = logged_in();

        let response = h.server.get("/hightech/2099-99-99").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert!(response.text().contains(r#"name="key" value="2024-01-01""#));
    }

    #[tokio::test]
    async fn test_trailing_slash_is_home() {
        let h = logged_out();
        let response = h.server.get("/hightech/").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
}

// =============================================================================
// Update
// =============================================================================

mod update_tests {
    use super::*;

    #[tokio::test]
    async fn test_update_sets_hours_and_redirects() {
        let h = logged_in();

        let response = h
            .server
            .post("/hightech/update")
            .form(&[
                ("key", "2024-01-02"),
                ("hours", "8"),
                ("url", "/hightech/2024-01-02"),
            ])
            .await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(location(&response), "/hightech/2024-01-02");

        let live = h.store.load().await.unwrap();
        assert_eq!(live.invoice.entries[1].hours, 8);
        assert_eq!(live.invoice.total, 8);
    }

    #[tokio::test]
    async fn test_update_without_url_goes_home() {
        let h = logged_in();

        let response = h
            .server
            .post("/hightech/update")
            .form(&[("key", "2024-01-02"), ("hours", "3")])
            .await;

        assert_eq!(location(&response), "/hightech");
    }

    #[tokio::test]
    async fn test_unparseable_hours_become_zero() {
        let h = logged_in();
        h.server
            .post("/hightech/update")
            .form(&[("key", "2024-01-02"), ("hours", "8")])
            .await;

        h.server
            .post("/hightech/update")
            .form(&[("key", "2024-01-02"), ("hours", "eight")])
            .await;

        let live = h.store.load().await.unwrap();
        assert_eq!(live.invoice.entries[1].hours, 0);
        assert_eq!(live.invoice.total, 0);
    }

    #[tokio::test]
    async fn test_unknown_key_saves_unchanged_document() {
        let h = logged_in();

        let response = h
            .server
            .post("/hightech/update")
            .form(&[("key", "2031-01-01"), ("hours", "8")])
            .await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(h.store.load().await.unwrap().invoice.total, 0);
    }

    #[tokio::test]
    async fn test_update_reads_query_string_fields() {
        let h = logged_in();

        let response = h
            .server
            .post("/hightech/update")
            .add_query_param("key", "2024-01-02")
            .add_query_param("hours", "4")
            .form(&[("url", "/hightech/2024-01-02")])
            .await;

        assert_eq!(location(&response), "/hightech/2024-01-02");
        let live = h.store.load().await.unwrap();
        assert_eq!(live.invoice.entries[1].hours, 4);
        assert_eq!(live.invoice.total, 4);
    }

    #[tokio::test]
    async fn test_update_body_wins_over_query_string() {
        let h = logged_in();

        h.server
            .post("/hightech/update")
            .add_query_param("hours", "2")
            .form(&[("key", "2024-01-03"), ("hours", "6")])
            .await;

        let live = h.store.load().await.unwrap();
        assert_eq!(live.invoice.entries[2].hours, 6);
    }

    #[tokio::test]
    async fn test_update_without_body_uses_query_string() {
        let h = logged_in();

        let response = h
            .server
            .post("/hightech/update?key=2024-01-04&hours=5")
            .await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(h.store.load().await.unwrap().invoice.entries[3].hours, 5);
    }

    #[tokio::test]
    async fn test_update_requires_session() {
        let h = logged_out();

        let response = h
            .server
            .post("/hightech/update")
            .form(&[("key", "2024-01-02"), ("hours", "8")])
            .await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.text().contains("Something went wrong"));
        assert_eq!(h.store.snapshot().unwrap(), document());
    }
}

// =============================================================================
// Close
// =============================================================================

mod close_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_rolls_over() {
        let h = logged_in();
        h.server
            .post("/hightech/update")
            .form(&[("key", "2024-01-14"), ("hours", "6")])
            .await;

        let response = h.server.post("/hightech/close").await;

        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(location(&response), "/hightech");

        let html = h.archive.get("ADA-2024-01-14.html").unwrap();
        assert!(String::from_utf8(html).unwrap().contains("Ada Lovelace"));
        let snapshot: Value =
            serde_json::from_slice(&h.archive.get("ADA-2024-01-14.txt").unwrap()).unwrap();
        assert_eq!(snapshot["Invoice"]["Total"], 6);

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "High Tech Timesheet 01/14/2024");
        assert_eq!(sent[0].body, "6 Hours");
        assert_eq!(sent[0].attachments.len(), 2);

        let live = h.store.load().await.unwrap();
        assert_eq!(live.invoice.entries[0].key, "2024-01-15");
        assert_eq!(live.invoice.entries[13].key, "2024-01-28");
        assert_eq!(live.invoice.total, 0);
        assert_eq!(live.user.prefix, "ADA");
        assert_eq!(
            live.user.last_invoice,
            "/hightech/archive/ADA-2024-01-14.html"
        );
    }

    #[tokio::test]
    async fn test_close_requires_session() {
        let h = logged_out();

        let response = h.server.post("/hightech/close").await;

        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(h.archive.list().await.unwrap().is_empty());
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_post_only() {
        let h = logged_in();

        let response = h.server.get("/hightech/close").await;

        // `close` is not date shaped, so no GET rule matches
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(h.mailer.sent().is_empty());
    }
}

// =============================================================================
// Pull / Purge / Not found
// =============================================================================

mod misc_tests {
    use super::*;

    #[tokio::test]
    async fn test_pull_exports_document_and_archive() {
        let h = logged_in();
        h.server.post("/hightech/close").await;

        let response = h.server.get("/hightech/pull").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));

        let body = response.text();
        assert!(body.contains("\n    \"Invoice\""));
        let export: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(export["Invoice"]["Invoice"]["Entries"][0]["Key"], "2024-01-15");
        assert_eq!(export["Archive"][0]["Name"], "ADA-2024-01-14.html");
        assert_eq!(
            export["Archive"][0]["Url"],
            "/hightech/hightech/archive/ADA-2024-01-14.html"
        );
        assert_eq!(export["Archive"][1]["Name"], "ADA-2024-01-14.txt");
    }

    #[tokio::test]
    async fn test_purge_reloads_templates() {
        let h = logged_out();

        let response = h.server.get("/hightech/purge").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "Templates Reloaded");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let h = logged_out();

        let response = h.server.get("/elsewhere").await;

        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert!(response.text().contains("Not Found"));
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_wrong_method_is_404() {
        let h = logged_out();
        let response = h.server.post("/hightech").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Verification
// =============================================================================

mod verify_tests {
    use super::*;

    #[tokio::test]
    async fn test_verification_flow() {
        let h = harness(None);

        // request a link
        let response = h.server.post("/hightech/verify").await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        assert_eq!(location(&response), "/hightech");
        let flash = cookie_pair(&response);
        assert!(flash.starts_with("hightech_flash="));

        // the flash message shows once
        let page = h
            .server
            .get("/hightech")
            .add_header(COOKIE, HeaderValue::from_str(&flash).unwrap())
            .await
            .text();
        assert!(page.contains("Verification link sent to your email address"));
        let again = h
            .server
            .get("/hightech")
            .add_header(COOKIE, HeaderValue::from_str(&flash).unwrap())
            .await
            .text();
        assert!(!again.contains("Verification link sent"));

        // follow the mailed link
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        let link = sent[0].body.clone();
        assert!(link.starts_with("/hightech/verify/"));

        let response = h.server.get(&link).await;
        assert_eq!(response.status_code(), StatusCode::FOUND);
        let session = cookie_pair(&response);
        assert!(session.starts_with("hightech_session="));
        let set_cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set_cookie.contains("Max-Age=2592000"));

        // the session now unlocks the edit forms
        let page = h
            .server
            .get("/hightech")
            .add_header(COOKIE, HeaderValue::from_str(&session).unwrap())
            .await
            .text();
        assert!(page.contains("Close period"));

        // links are single use
        let replay = h.server.get(&link).await;
        assert_eq!(replay.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_unknown_token_fails() {
        let h = harness(None);
        let response = h.server.get("/hightech/verify/not-a-key").await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// File-backed storage
// =============================================================================

mod file_storage_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_writes_archive_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_dir(dir.path());
        config.templates = templates_dir();
        std::fs::create_dir_all(&config.archive_path).unwrap();

        let store = JsonFileStore::new(&config.invoice_data).with_clock(clock());
        store.save(&document()).await.unwrap();

        let archive_path = config.archive_path.clone();
        let invoice_path = config.invoice_data.clone();
        let app = ServerBuilder::new(config)
            .with_sessions(Arc::new(FixedSessions { logged_in: true }))
            .with_mailer(Arc::new(CapturingMailer::default()))
            .with_clock(clock())
            .build()
            .expect("Failed to build app");
        let server = TestServer::new(app).expect("Failed to create test server");

        server
            .post("/hightech/update")
            .form(&[("key", "2024-01-01"), ("hours", "7")])
            .await;
        let response = server.post("/hightech/close").await;
        assert_eq!(response.status_code(), StatusCode::FOUND);

        assert!(archive_path.join("ADA-2024-01-14.html").exists());
        let snapshot = std::fs::read_to_string(archive_path.join("ADA-2024-01-14.txt")).unwrap();
        assert!(snapshot.contains("\"Total\": 7"));

        let live: InvoiceDocument =
            serde_json::from_slice(&std::fs::read(&invoice_path).unwrap()).unwrap();
        assert_eq!(live.invoice.entries[0].key, "2024-01-15");
    }
}
