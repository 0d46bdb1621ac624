//! Storage for the live invoice document and the invoice archive
//!
//! Both are whole-object stores: a document is loaded, mutated in memory
//! and saved back. There is no optimistic concurrency check; two requests
//! that load, mutate and save concurrently race and the last save wins.

pub mod archive;
pub mod in_memory;
pub mod json_file;

use crate::core::error::Result;
use crate::core::invoice::InvoiceDocument;
use async_trait::async_trait;

pub use archive::DirArchive;
pub use in_memory::{InMemoryArchive, InMemoryInvoiceStore};
pub use json_file::JsonFileStore;

/// Trait for live invoice document storage
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Read the document and run the selection/total normalization pass
    async fn load(&self) -> Result<InvoiceDocument>;

    /// Overwrite the stored document
    async fn save(&self, doc: &InvoiceDocument) -> Result<()>;
}

/// Trait for the invoice archive
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any previous file
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Names of archived invoices, sorted
    async fn list(&self) -> Result<Vec<String>>;
}

/// Whether a file name looks like an archived invoice
///
/// Matches names with a non-empty stem and an extension of at least three
/// characters, such as `ADA-2024-01-14.html` or `ADA-2024-01-14.txt`.
pub fn is_archive_name(name: &str) -> bool {
    name.char_indices()
        .any(|(i, c)| c == '.' && i >= 1 && name[i + 1..].chars().count() >= 3)
}
