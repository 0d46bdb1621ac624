//! Template rendering seam backed by `tera`

use super::error::{HightechError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tera::{Context, Tera};

/// Trait for page renderers
pub trait TemplateRenderer: Send + Sync {
    /// Render the template `name` with `data` as its context
    fn render(&self, name: &str, data: &Value) -> Result<String>;

    /// Re-read templates from their source
    fn reload(&self) -> Result<()>;
}

/// Renderer over every file in a templates directory
///
/// Reloading parses the directory again and only swaps the template set in
/// when parsing succeeds, so a broken edit keeps the previous pages live.
pub struct TeraRenderer {
    dir: Option<PathBuf>,
    tera: RwLock<Tera>,
}

impl TeraRenderer {
    /// Load every template in `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let tera = Self::parse_dir(&dir)?;
        tracing::debug!(
            dir = %dir.display(),
            templates = tera.get_template_names().count(),
            "templates loaded"
        );
        Ok(Self {
            dir: Some(dir),
            tera: RwLock::new(tera),
        })
    }

    /// Build a renderer from in-memory `(name, source)` pairs
    pub fn from_raw(templates: &[(&str, &str)]) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.iter().copied())?;
        Ok(Self {
            dir: None,
            tera: RwLock::new(tera),
        })
    }

    fn parse_dir(dir: &Path) -> Result<Tera> {
        if !dir.is_dir() {
            return Err(HightechError::upstream(
                "template renderer",
                format!("templates directory '{}' not found", dir.display()),
            ));
        }
        let glob = dir.join("*.*");
        Ok(Tera::new(&glob.to_string_lossy())?)
    }
}

impl TemplateRenderer for TeraRenderer {
    fn render(&self, name: &str, data: &Value) -> Result<String> {
        let context = Context::from_serialize(data)?;
        let tera = self
            .tera
            .read()
            .map_err(|e| HightechError::Internal(format!("template lock poisoned: {}", e)))?;
        Ok(tera.render(name, &context)?)
    }

    fn reload(&self) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let fresh = Self::parse_dir(dir)?;
        let mut tera = self
            .tera
            .write()
            .map_err(|e| HightechError::Internal(format!("template lock poisoned: {}", e)))?;
        *tera = fresh;

        tracing::info!(dir = %dir.display(), "templates reloaded");
        Ok(())
    }
}
