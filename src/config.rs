use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub db_path: Option<String>,
    pub imap: ImapConfig,
    pub classifier: ClassifierConfig,
    pub digest: DigestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ImapConfig {
    /// Derived from the address domain when unset.
    pub server: Option<String>,
    pub port: u16,
    pub user_email: Option<String>,
    pub folder: String,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: 993,
            user_email: None,
            folder: "INBOX".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub model: String,
    /// Local executable used when the HTTP endpoint can't be reached.
    pub cli_program: String,
    pub temperature: f64,
    pub num_predict: u32,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub body_preview_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            cli_program: "ollama".to_string(),
            temperature: 0.3,
            num_predict: 50,
            timeout_secs: 60,
            probe_timeout_secs: 10,
            body_preview_chars: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DigestConfig {
    /// Program and leading arguments; the rendered body is appended last.
    /// When empty the digest is mailed over SMTP instead.
    pub send_command: Vec<String>,
    pub smtp_server: Option<String>,
    pub smtp_port: Option<u16>,
    /// Defaults to the sending address.
    pub recipient: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            send_command: Vec::new(),
            smtp_server: None,
            smtp_port: None,
            recipient: None,
            timeout_secs: 60,
        }
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("email_helper"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_db_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("emails.db");
    Ok(p)
}

/// Load the config at `path` (or the default location).
///
/// A missing file is replaced by a template holding the
/// defaults, and the defaults are used for this run.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };

    let mut cfg = if path.exists() {
        let s = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str::<Config>(&s).with_context(|| format!("parsing {}", path.display()))?
    } else {
        let sample = Config::default();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, toml::to_string_pretty(&sample)?)?;
        info!("created template config at {}", path.display());
        sample
    };

    if let Ok(host) = std::env::var("OLLAMA_HOST")
        && !host.trim().is_empty()
    {
        cfg.classifier.base_url = normalize_host(&host);
    }
    Ok(cfg)
}

/// `OLLAMA_HOST` is often given without a scheme (`127.0.0.1:11434`).
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

pub fn resolve_db_path(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.db_path {
        Ok(PathBuf::from(p))
    } else {
        default_db_path()
    }
}
