//! Proxy connection settings.

use std::time::Duration;

use crate::storage::{keys, KeyValueStore};

/// Default proxy URL when nothing is persisted.
pub const DEFAULT_PROXY_URL: &str = "http://localhost:3000";

/// Where the proxy lives and which ERP instance it should forward to.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyConfig {
    /// Proxy base URL (e.g. "http://localhost:3000"), no trailing `/`.
    pub base_url: String,

    /// Sent as `x-odoo-base` when set.
    pub odoo_base_url: Option<String>,

    /// Sent as `x-odoo-db` when set.
    pub odoo_db: Option<String>,

    /// Request timeout. `None` leaves reqwest's default in place.
    pub timeout: Option<Duration>,
}

impl ProxyConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            odoo_base_url: None,
            odoo_db: None,
            timeout: None,
        }
    }

    pub fn with_odoo(mut self, base_url: Option<String>, db: Option<String>) -> Self {
        self.odoo_base_url = base_url.filter(|s| !s.is_empty());
        self.odoo_db = db.filter(|s| !s.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build from persisted `proxy_url`, `odoo_base_url` and `odoo_db`.
    pub fn from_storage(store: &dyn KeyValueStore) -> Self {
        let base = store
            .get(keys::PROXY_URL)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PROXY_URL.to_string());
        Self::new(base).with_odoo(store.get(keys::ODOO_BASE_URL), store.get(keys::ODOO_DB))
    }
}
