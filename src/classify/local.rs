use std::process::Command;
use std::time::Duration;

use log::debug;

use crate::classify::TextBackend;
use crate::config::ClassifierConfig;
use crate::error::BackendError;
use crate::process::run_with_timeout;

const NAME: &str = "ollama-cli";

/// Text generation through the local `ollama run <model> <prompt>` command.
pub struct OllamaCli {
    program: String,
    model: String,
    timeout: Duration,
    probe_timeout: Duration,
}

impl OllamaCli {
    pub fn new(cfg: &ClassifierConfig) -> Self {
        Self {
            program: cfg.cli_program.clone(),
            model: cfg.model.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
        }
    }
}

impl TextBackend for OllamaCli {
    fn name(&self) -> &'static str {
        NAME
    }

    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["run", self.model.as_str(), prompt]);

        let out = run_with_timeout(cmd, self.timeout)?;
        if !out.status.success() {
            return Err(BackendError::Exit {
                backend: NAME,
                status: out.status,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out.stdout.trim().to_string())
    }

    fn probe(&self) -> bool {
        let mut cmd = Command::new(&self.program);
        cmd.arg("list");
        match run_with_timeout(cmd, self.probe_timeout) {
            Ok(out) => out.status.success(),
            Err(e) => {
                debug!("{NAME} probe failed: {e}");
                false
            }
        }
    }
}
