//! Login / logout / status commands.

use std::path::Path;

use anyhow::Result;
use stockroom_client::storage::keys;
use stockroom_client::KeyValueStore;

use super::Env;

/// Sign in and persist the session.
pub async fn login(email: &str, password: &str, state_path: &Path) -> Result<()> {
    let env = Env::open(state_path)?;

    if !env.session.sign_in(email, password).await {
        anyhow::bail!(
            "Login failed for {} at {}. Check credentials and `stockctl config show`.",
            email,
            env.client.config().base_url
        );
    }

    let s = env.session.session();
    println!("Logged in as {} (uid {}).", s.display_name, s.user_id);
    println!("Session saved to {}.", state_path.display());
    Ok(())
}

/// Forget the stored session.
pub fn logout(state_path: &Path) -> Result<()> {
    let env = Env::open(state_path)?;
    env.session.sign_out();
    println!("Logged out.");
    Ok(())
}

/// Validate the stored session against the proxy.
pub async fn status(state_path: &Path) -> Result<()> {
    let env = Env::open(state_path)?;
    env.session.load().await;

    let s = env.session.session();
    if !s.is_authenticated {
        println!("Not signed in.");
        return Ok(());
    }
    println!("Signed in as {} (uid {}).", s.display_name, s.user_id);
    if let Some(login) = env.store.get(keys::LOGIN) {
        println!("Login: {}", login);
    }
    println!("Proxy: {}", env.client.config().base_url);
    Ok(())
}
