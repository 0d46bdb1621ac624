//! Closing a period
//!
//! Closing is the only way a timesheet advances:
//!
//! 1. render the current document as an HTML invoice
//! 2. archive the HTML and an indented JSON snapshot under
//!    `{prefix}-{closing key}`
//! 3. mail both files to the user
//! 4. build the successor period starting the day after the closing entry,
//!    carrying the user forward with `LastInvoice` pointing at the archive
//! 5. save the successor over the live document
//!
//! Any failure aborts the close before step 5, leaving the live document
//! as it was. Archive files written before the failure stay behind.

use super::error::Result;
use super::invoice::InvoiceDocument;
use super::mail::{Attachment, MailMessage, MailSender};
use super::templates::TemplateRenderer;
use crate::storage::{ArchiveStore, InvoiceStore};
use std::sync::Arc;

/// Template used to render the archived invoice
pub const INVOICE_TEMPLATE: &str = "invoice.html";

/// Outcome of a successful close
#[derive(Debug, Clone)]
pub struct ClosedPeriod {
    /// Archive name of the HTML invoice
    pub html_name: String,
    /// Archive name of the JSON snapshot
    pub json_name: String,
    /// The document now stored as the live period
    pub successor: InvoiceDocument,
}

/// Archive names for a document: `({prefix}-{key}.html, {prefix}-{key}.txt)`
pub fn archive_names(doc: &InvoiceDocument) -> Result<(String, String)> {
    let key = &doc.closing_entry()?.key;
    let stem = format!("{}-{}", doc.user.prefix, key);
    Ok((format!("{}.html", stem), format!("{}.txt", stem)))
}

/// Runs the close procedure against the configured collaborators
pub struct PeriodCloser {
    store: Arc<dyn InvoiceStore>,
    archive: Arc<dyn ArchiveStore>,
    templates: Arc<dyn TemplateRenderer>,
    mailer: Arc<dyn MailSender>,
    archive_baseurl: String,
}

impl PeriodCloser {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        archive: Arc<dyn ArchiveStore>,
        templates: Arc<dyn TemplateRenderer>,
        mailer: Arc<dyn MailSender>,
        archive_baseurl: impl Into<String>,
    ) -> Self {
        Self {
            store,
            archive,
            templates,
            mailer,
            archive_baseurl: archive_baseurl.into(),
        }
    }

    /// Load the live document and close it
    pub async fn close_current(&self) -> Result<ClosedPeriod> {
        let doc = self.store.load().await?;
        self.close(&doc).await
    }

    /// Archive `doc`, mail it, and replace it with its successor
    pub async fn close(&self, doc: &InvoiceDocument) -> Result<ClosedPeriod> {
        let closing = doc.closing_entry()?;
        let (html_name, json_name) = archive_names(doc)?;

        let html = self
            .templates
            .render(INVOICE_TEMPLATE, &serde_json::to_value(doc)?)?;
        self.archive.write(&html_name, html.as_bytes()).await?;

        let json = doc.to_json()?;
        self.archive.write(&json_name, &json).await?;

        let message = MailMessage {
            subject: format!(
                "High Tech Timesheet {}/{}/{}",
                closing.mm, closing.dd, closing.yyyy
            ),
            body: format!("{} Hours", doc.invoice.total),
            attachments: vec![
                Attachment::new(html.into_bytes(), "text/html", html_name.clone()),
                Attachment::new(json, "text/plain", json_name.clone()),
            ],
        };
        self.mailer.send(message).await?;

        let last_invoice = format!("{}/{}", self.archive_baseurl, html_name);
        let successor = doc.successor(last_invoice)?;
        self.store.save(&successor).await?;

        tracing::info!(
            closed = %closing.key,
            total = doc.invoice.total,
            next_start = %successor.invoice.entries[0].key,
            "period closed"
        );

        Ok(ClosedPeriod {
            html_name,
            json_name,
            successor,
        })
    }
}
