//! Proxy / ERP target settings.

use std::path::Path;

use anyhow::Result;
use stockroom_client::storage::keys;
use stockroom_client::{FileStore, KeyValueStore, ProxyConfig};

/// Persist proxy URL and ERP target. Empty strings unset a value.
pub fn set(
    proxy: Option<&str>,
    odoo_base: Option<&str>,
    odoo_db: Option<&str>,
    state_path: &Path,
) -> Result<()> {
    if proxy.is_none() && odoo_base.is_none() && odoo_db.is_none() {
        anyhow::bail!("Nothing to set. Use --proxy, --odoo-base or --odoo-db.");
    }

    let store = FileStore::open(state_path)?;
    for (key, value) in [
        (keys::PROXY_URL, proxy),
        (keys::ODOO_BASE_URL, odoo_base),
        (keys::ODOO_DB, odoo_db),
    ] {
        match value {
            Some("") => store.remove(key)?,
            Some(v) => store.set(key, v)?,
            None => {}
        }
    }

    println!("Settings saved to {}.", state_path.display());
    Ok(())
}

/// Print settings and the stored identity (no network access).
pub fn show(state_path: &Path) -> Result<()> {
    let store = FileStore::open(state_path)?;
    let cfg = ProxyConfig::from_storage(&store);

    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("{:12} {}", "PROXY", cfg.base_url);
    println!("{:12} {}", "ODOO BASE", or_dash(cfg.odoo_base_url));
    println!("{:12} {}", "ODOO DB", or_dash(cfg.odoo_db));
    println!("{:12} {}", "LOGIN", or_dash(store.get(keys::LOGIN)));
    println!("{:12} {}", "NAME", or_dash(store.get(keys::NAME)));
    println!("{:12} {}", "UID", or_dash(store.get(keys::UID)));
    println!(
        "{:12} {}",
        "SESSION",
        if store.get(keys::SESSION_ID).is_some() { "stored" } else { "-" }
    );
    Ok(())
}
