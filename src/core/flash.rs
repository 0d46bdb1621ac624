//! One-shot flash messages carried across a redirect

use super::session::{read_cookie, write_cookie};
use axum::http::HeaderMap;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Trait for flash message stores
pub trait FlashStore: Send + Sync {
    /// Take the pending message for this request, clearing it
    fn get(&self, response: &mut HeaderMap, request: &HeaderMap) -> Option<String>;

    /// Queue a message for the next request
    fn set(&self, response: &mut HeaderMap, message: &str);
}

/// Flash store keeping messages server side, keyed by a cookie
pub struct InMemoryFlash {
    cookie_name: String,
    messages: RwLock<HashMap<String, String>>,
}

impl InMemoryFlash {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            messages: RwLock::new(HashMap::new()),
        }
    }
}

impl FlashStore for InMemoryFlash {
    fn get(&self, response: &mut HeaderMap, request: &HeaderMap) -> Option<String> {
        let id = read_cookie(request, &self.cookie_name)?;
        let message = self.messages.write().ok()?.remove(&id)?;
        write_cookie(response, &self.cookie_name, "", Some(0));
        Some(message)
    }

    fn set(&self, response: &mut HeaderMap, message: &str) {
        let id = Uuid::new_v4().to_string();
        match self.messages.write() {
            Ok(mut messages) => {
                messages.insert(id.clone(), message.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "flash store lock poisoned, message dropped");
                return;
            }
        }
        write_cookie(response, &self.cookie_name, &id, None);
    }
}
