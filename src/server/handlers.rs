//! HTTP handlers for the timesheet
//!
//! Every handler receives the raw request and owns the response. Failures
//! are logged with the request id and answered with the generic server
//! error page; nothing is retried.

use crate::config::AppConfig;
use crate::core::clock::Clock;
use crate::core::close::PeriodCloser;
use crate::core::error::{HightechError, Result};
use crate::core::flash::FlashStore;
use crate::core::invoice::{InvoiceDocument, to_indented_json};
use crate::core::mail::MailSender;
use crate::core::session::{Session, SessionProvider};
use crate::core::templates::TemplateRenderer;
use crate::server::router::{Handler, PatternRouter, RequestId, RouteParams};
use crate::storage::{ArchiveStore, InvoiceStore};
use axum::Form;
use axum::body::Body;
use axum::extract::{FromRequest, Query};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;

/// Flash message queued after a verification mail goes out
pub const VERIFY_SENT_MESSAGE: &str = "Verification link sent to your email address";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn InvoiceStore>,
    pub archive: Arc<dyn ArchiveStore>,
    pub sessions: Arc<dyn SessionProvider>,
    pub flash: Arc<dyn FlashStore>,
    pub templates: Arc<dyn TemplateRenderer>,
    pub mailer: Arc<dyn MailSender>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    fn closer(&self) -> PeriodCloser {
        PeriodCloser::new(
            self.store.clone(),
            self.archive.clone(),
            self.templates.clone(),
            self.mailer.clone(),
            self.config.archive_baseurl.clone(),
        )
    }

    fn require_session(&self, headers: &HeaderMap) -> Result<Session> {
        self.sessions
            .parse(headers)
            .ok_or_else(|| HightechError::upstream("session provider", "no valid session"))
    }
}

/// Build the route table, most specific patterns first
pub fn build_routes(state: Arc<AppState>) -> Result<PatternRouter> {
    PatternRouter::builder(state.config.response_header.clone())
        .route("GET:/hightech", bind(&state, handle_home))
        .route("GET:/hightech/{date}", bind(&state, handle_home))
        .route("GET:/hightech/pull", bind(&state, handle_pull))
        .route("GET:/hightech/purge", bind(&state, handle_purge))
        .route("GET:/hightech/verify/{token}", bind(&state, handle_verify))
        .route("POST:/hightech/close", bind(&state, handle_close))
        .route("POST:/hightech/update", bind(&state, handle_update))
        .route("POST:/hightech/verify", bind(&state, handle_verify_post))
        .fallback(bind(&state, handle_not_found))
        .build()
}

fn bind<F, Fut>(state: &Arc<AppState>, handler: F) -> impl Handler + 'static
where
    F: Fn(Arc<AppState>, Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    let state = state.clone();
    move |req: Request<Body>| handler(state.clone(), req)
}

fn request_id(req: &Request<Body>) -> Option<RequestId> {
    req.extensions().get::<RequestId>().copied()
}

fn param(req: &Request<Body>, index: usize) -> Option<String> {
    req.extensions()
        .get::<RouteParams>()
        .and_then(|params| params.get(index))
        .map(str::to_string)
}

fn respond(state: &AppState, id: Option<RequestId>, result: Result<Response>) -> Response {
    match result {
        Ok(response) => response,
        Err(e) => {
            match id {
                Some(id) => tracing::error!(request_id = %id, error = %e, "request failed"),
                None => tracing::error!(error = %e, "request failed"),
            }
            server_error(state)
        }
    }
}

/// 302 redirect, what browsers expect after a form post
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::FOUND, [(LOCATION, HeaderValue::from_static("/"))]).into_response(),
    }
}

fn plain_text(body: impl Into<String>) -> Response {
    (
        [(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        body.into(),
    )
        .into_response()
}

fn error_page(state: &AppState, status: StatusCode, template: &str) -> Response {
    let data = json!({ "baseurl": state.config.baseurl });
    match state.templates.render(template, &data) {
        Ok(page) => (status, Html(page)).into_response(),
        Err(e) => {
            tracing::warn!(template, error = %e, "error page failed to render");
            (status, status.canonical_reason().unwrap_or("Error").to_string()).into_response()
        }
    }
}

/// 500 page
pub fn server_error(state: &AppState) -> Response {
    error_page(state, StatusCode::INTERNAL_SERVER_ERROR, "error500.html")
}

// =============================================================================
// Home
// =============================================================================

/// Render the timesheet, optionally with a selected day from the path
pub async fn handle_home(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = home(&state, req).await;
    respond(&state, id, result)
}

async fn home(state: &AppState, req: Request<Body>) -> Result<Response> {
    let mut headers = HeaderMap::new();

    let session = state.sessions.parse(req.headers());
    if let Some(session) = &session {
        state.sessions.save(session, &mut headers, true);
    }

    let mut doc = state.store.load().await?;
    if let Some(day) = param(&req, 0) {
        doc.set_selected_as_of(&day, state.clock.today());
    }

    let message = state.flash.get(&mut headers, req.headers());
    let invoice = serde_json::to_value(&doc)?;

    let page = state.templates.render(
        "home.html",
        &json!({
            "Hours": (0..=24).collect::<Vec<i64>>(),
            "Invoice": invoice,
            "LoggedIn": session.is_some(),
            "Message": message.unwrap_or_default(),
            "Url": req.uri().path(),
        }),
    )?;

    Ok((headers, Html(page)).into_response())
}

// =============================================================================
// Pull
// =============================================================================

/// Export of the live document plus links to every archived invoice
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PullExport {
    pub invoice: InvoiceDocument,
    pub archive: Vec<ArchiveLink>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveLink {
    pub name: String,
    pub url: String,
}

pub async fn handle_pull(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = pull(&state).await;
    respond(&state, id, result)
}

async fn pull(state: &AppState) -> Result<Response> {
    let invoice = state.store.load().await?;
    let archive = state
        .archive
        .list()
        .await?
        .into_iter()
        .map(|name| ArchiveLink {
            url: format!(
                "{}{}/{}",
                state.config.baseurl, state.config.archive_baseurl, name
            ),
            name,
        })
        .collect();

    let body = to_indented_json(&PullExport { invoice, archive })?;
    Ok(plain_text(String::from_utf8_lossy(&body)))
}

// =============================================================================
// Purge
// =============================================================================

/// Re-read the page templates from disk
pub async fn handle_purge(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = state
        .templates
        .reload()
        .map(|_| plain_text("Templates Reloaded"));
    respond(&state, id, result)
}

// =============================================================================
// Verification
// =============================================================================

/// Exchange the mailed key for a persistent session
pub async fn handle_verify(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = verify(&state, req).await;
    respond(&state, id, result)
}

async fn verify(state: &AppState, req: Request<Body>) -> Result<Response> {
    let key = param(&req, 0).unwrap_or_default();
    let session = state.sessions.verify(&key).await?;

    let mut response = found(&state.config.baseurl);
    state.sessions.save(&session, response.headers_mut(), true);
    Ok(response)
}

/// Mail a verification link
pub async fn handle_verify_post(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = verify_post(&state).await;
    respond(&state, id, result)
}

async fn verify_post(state: &AppState) -> Result<Response> {
    state.sessions.send_verify().await?;

    let mut response = found(&state.config.baseurl);
    state.flash.set(response.headers_mut(), VERIFY_SENT_MESSAGE);
    Ok(response)
}

// =============================================================================
// Close
// =============================================================================

/// Close the current period and start the next one
pub async fn handle_close(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = close(&state, req).await;
    respond(&state, id, result)
}

async fn close(state: &AppState, req: Request<Body>) -> Result<Response> {
    state.require_session(req.headers())?;
    state.closer().close_current().await?;
    Ok(found(&state.config.baseurl))
}

// =============================================================================
// Update
// =============================================================================

/// Form posted when hours change
///
/// Missing fields read as empty and unparseable hours as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateForm {
    pub key: String,
    pub hours: String,
    pub url: String,
}

impl UpdateForm {
    /// Fill the fields left empty by the body from `fallback`
    fn or(self, fallback: UpdateForm) -> Self {
        let pick = |body: String, query: String| if body.is_empty() { query } else { body };
        Self {
            key: pick(self.key, fallback.key),
            hours: pick(self.hours, fallback.hours),
            url: pick(self.url, fallback.url),
        }
    }
}

/// Set one day's hours and go back to where the user was
pub async fn handle_update(state: Arc<AppState>, req: Request<Body>) -> Response {
    let id = request_id(&req);
    let result = update(&state, req).await;
    respond(&state, id, result)
}

async fn update(state: &AppState, req: Request<Body>) -> Result<Response> {
    state.require_session(req.headers())?;

    let mut doc = state.store.load().await?;

    let query = Query::<UpdateForm>::try_from_uri(req.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();
    let form = match Form::<UpdateForm>::from_request(req, &()).await {
        Ok(Form(form)) => form.or(query),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "update form unreadable, using query string");
            query
        }
    };
    let hours = form.hours.parse::<i64>().unwrap_or(0);

    doc.set_hours(&form.key, hours);
    state.store.save(&doc).await?;

    let target = if form.url.is_empty() {
        state.config.baseurl.as_str()
    } else {
        form.url.as_str()
    };
    Ok(found(target))
}

// =============================================================================
// Not found
// =============================================================================

pub async fn handle_not_found(state: Arc<AppState>, _req: Request<Body>) -> Response {
    error_page(&state, StatusCode::NOT_FOUND, "error404.html")
}
