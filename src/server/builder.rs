//! ServerBuilder for fluent API to build the HTTP server

use super::handlers::{AppState, build_routes};
use crate::config::AppConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::flash::{FlashStore, InMemoryFlash};
use crate::core::mail::{LogMailSender, MailSender};
use crate::core::session::{InMemorySessions, SessionProvider};
use crate::core::templates::{TemplateRenderer, TeraRenderer};
use crate::storage::{ArchiveStore, DirArchive, InvoiceStore, JsonFileStore};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Builder wiring configuration and collaborators into a router
///
/// Every collaborator has a default derived from the configuration; tests
/// and embedders replace individual pieces with the `with_*` methods.
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::from_yaml_file("hightech.yaml")?;
/// ServerBuilder::new(config)
///     .with_mailer(Arc::new(MyMailer::default()))
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: Arc<AppConfig>,
    store: Option<Arc<dyn InvoiceStore>>,
    archive: Option<Arc<dyn ArchiveStore>>,
    sessions: Option<Arc<dyn SessionProvider>>,
    flash: Option<Arc<dyn FlashStore>>,
    templates: Option<Arc<dyn TemplateRenderer>>,
    mailer: Option<Arc<dyn MailSender>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: None,
            archive: None,
            sessions: None,
            flash: None,
            templates: None,
            mailer: None,
            clock: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn InvoiceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionProvider>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_flash(mut self, flash: Arc<dyn FlashStore>) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn with_templates(mut self, templates: Arc<dyn TemplateRenderer>) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Set the mail transport
    ///
    /// The default session provider mails through this sender too, so set
    /// it before relying on the default sessions.
    pub fn with_mailer(mut self, mailer: Arc<dyn MailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Set the clock used for "today" by the default store and the home page
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Resolve defaults and assemble the shared state
    pub fn build_state(self) -> Result<Arc<AppState>> {
        let config = self.config;

        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let store: Arc<dyn InvoiceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(JsonFileStore::new(&config.invoice_data).with_clock(clock.clone())),
        };

        let archive: Arc<dyn ArchiveStore> = match self.archive {
            Some(archive) => archive,
            None => Arc::new(DirArchive::new(&config.archive_path)),
        };

        let templates: Arc<dyn TemplateRenderer> = match self.templates {
            Some(templates) => templates,
            None => Arc::new(TeraRenderer::from_dir(&config.templates)?),
        };

        let mailer: Arc<dyn MailSender> = match self.mailer {
            Some(mailer) => mailer,
            None => Arc::new(LogMailSender::new(config.mail_sender.clone())),
        };

        let sessions: Arc<dyn SessionProvider> = match self.sessions {
            Some(sessions) => sessions,
            None => Arc::new(InMemorySessions::new(
                config.session_cookie.clone(),
                config.verify_url(),
                mailer.clone(),
            )),
        };

        let flash: Arc<dyn FlashStore> = match self.flash {
            Some(flash) => flash,
            None => Arc::new(InMemoryFlash::new(config.flash_cookie.clone())),
        };

        Ok(Arc::new(AppState {
            config,
            store,
            archive,
            sessions,
            flash,
            templates,
            mailer,
            clock,
        }))
    }

    /// Build the final router
    pub fn build(self) -> Result<Router> {
        let state = self.build_state()?;
        let router = build_routes(state)?;

        for pattern in router.patterns() {
            tracing::debug!(pattern, "route registered");
        }

        Ok(router.into_axum().layer(TraceLayer::new_for_http()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the configured `listen_addr`
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.listen_addr.clone();
        let app = self.build()?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::invoice::InvoiceDocument;
    use crate::core::mail::MailMessage;
    use crate::storage::{InMemoryArchive, InMemoryInvoiceStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingMailer {
        sent: Mutex<Vec<MailMessage>>,
    }

    #[async_trait]
    impl MailSender for CapturingMailer {
        async fn send(&self, message: MailMessage) -> crate::core::error::Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn in_memory(config: AppConfig) -> ServerBuilder {
        let doc = InvoiceDocument::create("2024-01-01", Duration::zero()).unwrap();
        ServerBuilder::new(config)
            .with_store(Arc::new(InMemoryInvoiceStore::new(doc)))
            .with_archive(Arc::new(InMemoryArchive::new()))
            .with_templates(Arc::new(TeraRenderer::from_raw(&[]).unwrap()))
    }

    #[test]
    fn test_build_with_collaborators() {
        let builder = in_memory(AppConfig::for_dir("/tmp/hightech-builder"));
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_state_uses_config() {
        let state = in_memory(AppConfig::for_dir("/tmp/hightech-builder"))
            .build_state()
            .unwrap();
        assert_eq!(state.config.baseurl, "/hightech");
    }

    #[test]
    fn test_missing_template_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerBuilder::new(AppConfig::for_dir(dir.path())).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_header_fails_build() {
        let mut config = AppConfig::for_dir("/tmp/hightech-builder");
        config.response_header = "not a header".to_string();
        assert!(in_memory(config).build().is_err());
    }

    #[tokio::test]
    async fn test_default_sessions_mail_absolute_link() {
        let mut config = AppConfig::for_dir("/tmp/hightech-builder");
        config.public_url = "https://time.example.com".to_string();

        let mailer = Arc::new(CapturingMailer::default());
        let state = in_memory(config)
            .with_mailer(mailer.clone())
            .build_state()
            .unwrap();
        state.sessions.send_verify().await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(
            sent[0]
                .body
                .contains("https://time.example.com/hightech/verify/")
        );
    }
}
