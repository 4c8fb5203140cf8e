use anyhow::{Context, Result, anyhow};
use keyring::{Entry, Error as KeyringError};

use crate::config::Config;

const SERVICE: &str = "email_helper";

pub const EMAIL_ADDRESS: &str = "email_address";
pub const AUTH_CODE: &str = "auth_code";

fn entry(service: &str, name: &str) -> Result<Entry> {
    Entry::new(service, name).with_context(|| format!("opening keyring entry {service}/{name}"))
}

/// Save a secret into the OS keyring under `name`.
pub fn save_secret(name: &str, value: &str) -> Result<()> {
    entry(SERVICE, name)?
        .set_password(value)
        .with_context(|| format!("storing {name} in the keyring"))
}

/// Load a secret from the keyring. A missing entry is `None`, not an error.
pub fn load_secret(name: &str) -> Result<Option<String>> {
    match entry(SERVICE, name)?.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(KeyringError::NoEntry) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {name} from the keyring")),
    }
}

#[derive(Debug, Clone)]
pub struct ImapCredentials {
    pub email: String,
    pub auth_code: String,
}

/// Address: config, then keyring, then `EMAIL_ADDRESS`.
/// Auth code: keyring, then `AUTH_CODE`.
pub fn imap_credentials(cfg: &Config) -> Result<ImapCredentials> {
    let email = first_present(
        cfg.imap.user_email.clone(),
        || load_secret(EMAIL_ADDRESS),
        "EMAIL_ADDRESS",
    )?
    .ok_or_else(|| anyhow!("no email address: set imap.user_email, run set-secret email_address, or export EMAIL_ADDRESS"))?;

    let auth_code = first_present(None, || load_secret(AUTH_CODE), "AUTH_CODE")?
        .ok_or_else(|| anyhow!("no auth code: run set-secret auth_code or export AUTH_CODE"))?;

    Ok(ImapCredentials { email, auth_code })
}

fn first_present(
    configured: Option<String>,
    keyring: impl FnOnce() -> Result<Option<String>>,
    env_var: &str,
) -> Result<Option<String>> {
    if let Some(v) = non_empty(configured) {
        return Ok(Some(v));
    }
    let stored = match keyring() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("keyring unavailable, falling back to {env_var}: {e}");
            None
        }
    };
    if let Some(v) = non_empty(stored) {
        return Ok(Some(v));
    }
    Ok(non_empty(std::env::var(env_var).ok()))
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
