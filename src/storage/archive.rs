//! Directory-backed invoice archive

use super::{ArchiveStore, is_archive_name};
use crate::core::error::{HightechError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Archive writing one file per invoice into a directory
#[derive(Debug, Clone)]
pub struct DirArchive {
    dir: PathBuf,
}

impl DirArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArchiveStore for DirArchive {
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        if name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(HightechError::Internal(format!(
                "refusing to archive under '{}'",
                name
            )));
        }

        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| HightechError::io_at(path.display(), e))?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "archived");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| HightechError::io_at(self.dir.display(), e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| HightechError::io_at(self.dir.display(), e))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if is_archive_name(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
