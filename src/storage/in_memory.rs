//! In-memory stores for testing and development

use super::{ArchiveStore, InvoiceStore, is_archive_name};
use crate::core::clock::{Clock, SystemClock};
use crate::core::error::{HightechError, Result};
use crate::core::invoice::InvoiceDocument;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

fn poisoned(e: impl std::fmt::Display) -> HightechError {
    HightechError::Internal(format!("Failed to acquire lock: {}", e))
}

/// In-memory invoice store
///
/// Stores the document as serialized JSON so a load goes through the same
/// parse and normalization path as the file store.
#[derive(Clone)]
pub struct InMemoryInvoiceStore {
    json: Arc<RwLock<Vec<u8>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryInvoiceStore {
    /// Create a store holding `doc`
    pub fn new(doc: InvoiceDocument) -> Self {
        // serializing plain structs cannot fail
        let json = doc.to_json().unwrap_or_default();
        Self {
            json: Arc::new(RwLock::new(json)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used by the load normalization pass
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The stored document exactly as last saved, without normalization
    pub fn snapshot(&self) -> Result<InvoiceDocument> {
        let json = self.json.read().map_err(poisoned)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[async_trait]
impl InvoiceStore for InMemoryInvoiceStore {
    async fn load(&self) -> Result<InvoiceDocument> {
        let json = self.json.read().map_err(poisoned)?.clone();
        InvoiceDocument::from_json(&json, self.clock.today())
    }

    async fn save(&self, doc: &InvoiceDocument) -> Result<()> {
        let json = doc.to_json()?;
        *self.json.write().map_err(poisoned)? = json;
        Ok(())
    }
}

/// In-memory invoice archive
#[derive(Clone, Default)]
pub struct InMemoryArchive {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of an archived file
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.read().ok()?.get(name).cloned()
    }
}

#[async_trait]
impl ArchiveStore for InMemoryArchive {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let files = self.files.read().map_err(poisoned)?;
        Ok(files
            .keys()
            .filter(|name| is_archive_name(name))
            .cloned()
            .collect())
    }
}
