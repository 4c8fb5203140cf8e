//! Turning a message into a (category, urgency) pair with a language model.
//!
//! Backends are tried in order. A backend that fails to produce text (network
//! error, timeout, process failure) hands over to the next one; text that
//! doesn't parse is never retried elsewhere, it just yields the defaults.

pub mod local;
pub mod ollama;
pub mod parse;

use anyhow::Result;
use log::{debug, warn};

use crate::config::ClassifierConfig;
use crate::domain::Classification;
use crate::error::BackendError;

pub use local::OllamaCli;
pub use ollama::OllamaHttp;
pub use parse::parse_labels;

/// Something that can complete a prompt.
pub trait TextBackend {
    fn name(&self) -> &'static str;
    fn generate(&self, prompt: &str) -> Result<String, BackendError>;
    /// Cheap reachability check.
    fn probe(&self) -> bool;
}

/// The seam the pipeline classifies through.
pub trait Classify {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification>;
    fn test_connection(&self) -> bool;
}

pub struct Classifier {
    backends: Vec<Box<dyn TextBackend>>,
    preview_chars: usize,
}

impl Classifier {
    pub fn new(backends: Vec<Box<dyn TextBackend>>, preview_chars: usize) -> Self {
        Self {
            backends,
            preview_chars,
        }
    }

    /// HTTP endpoint first, local command second.
    pub fn from_config(cfg: &ClassifierConfig) -> Result<Self> {
        let backends: Vec<Box<dyn TextBackend>> = vec![
            Box::new(OllamaHttp::new(cfg)?) as Box<dyn TextBackend>,
            Box::new(OllamaCli::new(cfg)),
        ];
        Ok(Self::new(backends, cfg.body_preview_chars))
    }

    /// Always returns a label pair; unusable or missing model output maps to
    /// `(notification, normal)`.
    pub fn classify(&self, subject: &str, body: &str) -> Classification {
        let prompt = build_prompt(subject, preview(body, self.preview_chars));
        match self.generate(&prompt) {
            Some(text) => {
                let labels = parse_labels(&text);
                debug!(
                    "classified '{subject}' as {}/{}",
                    labels.category, labels.urgency
                );
                labels
            }
            None => {
                warn!("no backend produced output for '{subject}', using defaults");
                Classification::default()
            }
        }
    }

    fn generate(&self, prompt: &str) -> Option<String> {
        for backend in &self.backends {
            match backend.generate(prompt) {
                Ok(text) => return Some(text),
                Err(e) => warn!("{} failed, trying next backend: {e}", backend.name()),
            }
        }
        None
    }

    pub fn test_connection(&self) -> bool {
        self.backends.iter().any(|b| b.probe())
    }
}

impl Classify for Classifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification> {
        Ok(Classifier::classify(self, subject, body))
    }

    fn test_connection(&self) -> bool {
        Classifier::test_connection(self)
    }
}

/// The first `max_chars` characters of `body`.
pub fn preview(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

pub fn build_prompt(subject: &str, body_preview: &str) -> String {
    format!(
        "Classify the following email by type and urgency.

Subject: {subject}
Body: {body_preview}

Reply with exactly these two lines and nothing else:
category: task or notification
urgency: urgent or normal

Guidelines:
- task: work the recipient has to act on, such as assignments, meeting invitations, requests or to-dos
- notification: announcements, newsletters, reports and other information-only mail
- urgent: marked urgent, important or ASAP, has a near deadline, or is a direct instruction from a manager
- normal: routine mail without any sign of urgency
"
    )
}
