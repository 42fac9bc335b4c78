//! Subcommand implementations.

pub mod config;
pub mod login;
pub mod resource;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use stockroom_client::{FileStore, ProxyClient, ProxyConfig, SessionManager};

/// Everything a command needs, opened from the state file.
pub struct Env {
    pub store: Arc<FileStore>,
    pub client: ProxyClient,
    pub session: Arc<SessionManager>,
}

impl Env {
    pub fn open(state_path: &Path) -> Result<Self> {
        let store = Arc::new(FileStore::open(state_path)?);
        let client = ProxyClient::new(ProxyConfig::from_storage(store.as_ref()))?;
        let session = Arc::new(SessionManager::new(client.clone(), store.clone()));
        Ok(Self {
            store,
            client,
            session,
        })
    }

    /// Restore and validate the stored session; fail if not signed in.
    pub async fn require_session(&self) -> Result<()> {
        self.session.load().await;
        if !self.session.is_authenticated() {
            anyhow::bail!("Not signed in. Run `stockctl login`.");
        }
        Ok(())
    }
}

/// Read one trimmed line from stdin after printing `label` to stderr.
pub fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut s = String::new();
    std::io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}
