//! # High Tech Timesheet
//!
//! A personal timesheet and invoicing web application. Hours are logged
//! against a rolling two-week period; closing the period archives an HTML
//! invoice plus a JSON snapshot, mails both, and starts the next period.
//!
//! ## Features
//!
//! - **Timesheet model**: fourteen consecutive days with precomputed calendar
//!   fields, a selected day and an idempotent total
//! - **Period rollover**: archive, mail and replace in one close operation
//! - **Ordered routing**: first-match `METHOD:/path` patterns with date and
//!   token placeholders
//! - **Pluggable collaborators**: storage, templates, sessions, flash
//!   messages and mail are traits with in-memory and file-backed defaults
//! - **Configuration-Based**: every path and URL comes from a YAML file
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hightech::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_yaml_file("hightech.yaml")?;
//!     ServerBuilder::new(config).serve().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        clock::{Clock, FixedClock, SystemClock},
        close::{ClosedPeriod, PeriodCloser},
        error::HightechError,
        flash::{FlashStore, InMemoryFlash},
        invoice::{Entry, InvoiceDocument, Timesheet, User},
        mail::{Attachment, LogMailSender, MailMessage, MailSender},
        session::{InMemorySessions, Session, SessionProvider},
        templates::{TemplateRenderer, TeraRenderer},
    };

    // === Storage ===
    pub use crate::storage::{
        ArchiveStore, DirArchive, InMemoryArchive, InMemoryInvoiceStore, InvoiceStore,
        JsonFileStore,
    };

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{AppState, PatternRouter, RequestId, RouteParams, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{Duration, NaiveDate};
    pub use serde::{Deserialize, Serialize};
}
