//! Configuration loading
//!
//! The configuration is an explicit object built once at startup and handed
//! to every component that needs it.

use crate::core::error::{HightechError, Result};
use axum::http::HeaderName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Public URL of the timesheet home page, redirect target after posts
    #[serde(default = "default_baseurl")]
    pub baseurl: String,

    /// Scheme and host prefixed to links that leave the site, such as the
    /// mailed verification link (`https://example.com`)
    #[serde(default)]
    pub public_url: String,

    /// Response header carrying the per-request id
    #[serde(default = "default_response_header")]
    pub response_header: String,

    /// Location of the live invoice document
    pub invoice_data: PathBuf,

    /// Directory receiving archived invoices
    pub archive_path: PathBuf,

    /// URL path under which the archive directory is published
    #[serde(default = "default_archive_baseurl")]
    pub archive_baseurl: String,

    /// Directory of page templates
    #[serde(default = "default_templates")]
    pub templates: PathBuf,

    /// Address invoices and verification links are mailed to
    #[serde(default)]
    pub mail_sender: String,

    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,

    #[serde(default = "default_flash_cookie")]
    pub flash_cookie: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_baseurl() -> String {
    "/hightech".to_string()
}

fn default_response_header() -> String {
    "X-Request-Id".to_string()
}

fn default_archive_baseurl() -> String {
    "/hightech/archive".to_string()
}

fn default_templates() -> PathBuf {
    PathBuf::from("templates")
}

fn default_session_cookie() -> String {
    "hightech_session".to_string()
}

fn default_flash_cookie() -> String {
    "hightech_flash".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HightechError::configuration(format!("cannot read '{}': {}", path, e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would otherwise only fail on the first request
    pub fn validate(&self) -> Result<()> {
        self.response_header_name()?;
        if self.session_cookie.is_empty() || self.flash_cookie.is_empty() {
            return Err(HightechError::configuration("cookie names must not be empty"));
        }
        if self.session_cookie == self.flash_cookie {
            return Err(HightechError::configuration(
                "session and flash cookies must have different names",
            ));
        }
        Ok(())
    }

    /// Absolute base of the mailed verification links
    pub fn verify_url(&self) -> String {
        format!(
            "{}{}/verify",
            self.public_url.trim_end_matches('/'),
            self.baseurl.trim_end_matches('/')
        )
    }

    /// The request id header as a typed header name
    pub fn response_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.response_header.as_bytes()).map_err(|e| {
            HightechError::configuration(format!(
                "invalid response_header '{}': {}",
                self.response_header, e
            ))
        })
    }

    /// Look a value up by its configuration key
    ///
    /// Unknown keys yield an empty string.
    pub fn get(&self, key: &str) -> String {
        match key {
            "listen_addr" => self.listen_addr.clone(),
            "baseurl" => self.baseurl.clone(),
            "public_url" => self.public_url.clone(),
            "response_header" => self.response_header.clone(),
            "invoice_data" => self.invoice_data.display().to_string(),
            "archive_path" => self.archive_path.display().to_string(),
            "archive_baseurl" => self.archive_baseurl.clone(),
            "templates" => self.templates.display().to_string(),
            "mail_sender" => self.mail_sender.clone(),
            "session_cookie" => self.session_cookie.clone(),
            "flash_cookie" => self.flash_cookie.clone(),
            _ => String::new(),
        }
    }

    /// Create a configuration rooted in `dir`, for testing
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            listen_addr: default_listen_addr(),
            baseurl: default_baseurl(),
            public_url: String::new(),
            response_header: default_response_header(),
            invoice_data: dir.join("invoice.json"),
            archive_path: dir.join("archive"),
            archive_baseurl: default_archive_baseurl(),
            templates: dir.join("templates"),
            mail_sender: "me@example.com".to_string(),
            session_cookie: default_session_cookie(),
            flash_cookie: default_flash_cookie(),
        }
    }
}
