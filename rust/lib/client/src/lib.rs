//! Stockroom client: session and entity cache for an Odoo-backed
//! warehouse dashboard.
//!
//! The ERP itself is reached through a thin JSON proxy. This crate owns
//! everything between the proxy and whatever renders the data:
//!
//! - [`SessionManager`]: sign in, validate a persisted session on load,
//!   sign out. Failures never propagate; they become `bool`/`()` outcomes.
//! - [`EntityCache`]: named ERP collections (`products`, `quants`, ...)
//!   fetched lazily, one in-flight request per name.
//! - [`Draft`]: the write path: collect edits, encode x2many commands,
//!   submit once, keep the edits on failure.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use stockroom_client::{Collection, EntityCache, MemoryStore, ProxyClient, ProxyConfig, SessionManager};
//!
//! let client = ProxyClient::new(ProxyConfig::new("http://localhost:3000"))?;
//! let session = Arc::new(SessionManager::new(client.clone(), Arc::new(MemoryStore::new())));
//! session.sign_in("admin@example.com", "secret").await;
//!
//! let cache = EntityCache::new(client, session.clone());
//! cache.fetch(Collection::Products).await;
//! let products = cache.get(Collection::Products);
//! ```

pub mod cache;
pub mod collection;
pub mod command;
pub mod config;
pub mod error;
pub mod http;
pub mod record;
pub mod session;
pub mod storage;
pub mod write;

pub use cache::{CollectionPhase, CollectionSnapshot, EntityCache, FetchOutcome, SubscriptionId, Topic};
pub use collection::{Collection, UnknownCollection};
pub use command::X2ManyCommand;
pub use config::ProxyConfig;
pub use error::{ApiError, StorageError};
pub use http::{ProxyClient, SessionCheck, SignInResponse};
pub use record::{Many2one, Record};
pub use session::{Session, SessionManager, StaticToken, TokenSource};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use write::{Draft, WriteNotice};
