//! Whole-document JSON file storage

use super::InvoiceStore;
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{HightechError, Result};
use crate::core::invoice::InvoiceDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const TMP_SUFFIX: &str = "tmp";

/// Invoice document stored as an indented JSON file
///
/// Loads and saves on one store instance are serialized by a mutex, and a
/// save goes through a temporary sibling file that is renamed into place,
/// so readers never observe a half written document.
#[derive(Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Arc<Mutex<()>>,
}

impl JsonFileStore {
    /// Create a store over `path` using the system clock
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            clock: Arc::new(SystemClock),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the clock used by the load normalization pass
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a document exists at the storage location
    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }
}

#[async_trait]
impl InvoiceStore for JsonFileStore {
    async fn load(&self) -> Result<InvoiceDocument> {
        let _guard = self.lock.lock().await;

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| HightechError::io_at(self.path.display(), e))?;
        let doc = InvoiceDocument::from_json(&bytes, self.clock.today())?;

        tracing::debug!(path = %self.path.display(), total = doc.invoice.total, "invoice loaded");
        Ok(doc)
    }

    async fn save(&self, doc: &InvoiceDocument) -> Result<()> {
        let json = doc.to_json()?;
        let _guard = self.lock.lock().await;

        let tmp = tmp_path(&self.path);
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| HightechError::io_at(tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| HightechError::io_at(self.path.display(), e))?;

        tracing::debug!(path = %self.path.display(), total = doc.invoice.total, "invoice saved");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}
