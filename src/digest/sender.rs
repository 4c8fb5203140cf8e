use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use log::debug;

use crate::config::DigestConfig;
use crate::process::run_with_timeout;

/// Delivers a rendered digest body. Recipient and subject are the sender's
/// business; it only ever sees the body.
pub trait DigestSender {
    fn send(&self, body: &str) -> Result<()>;
}

/// Runs an external command with the body as its last argument.
pub struct CommandSender {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSender {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(cfg: &DigestConfig) -> Result<Self> {
        let (program, args) = cfg
            .send_command
            .split_first()
            .ok_or_else(|| anyhow!("digest.send_command is not set in config"))?;
        Ok(Self::new(
            program.clone(),
            args.to_vec(),
            Duration::from_secs(cfg.timeout_secs),
        ))
    }
}

impl DigestSender for CommandSender {
    fn send(&self, body: &str) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(body);

        let out = run_with_timeout(cmd, self.timeout)?;
        if !out.status.success() {
            let detail = if out.stderr.trim().is_empty() {
                out.stdout.trim()
            } else {
                out.stderr.trim()
            };
            bail!("{} exited with {}: {detail}", self.program, out.status);
        }
        debug!("{} accepted digest: {}", self.program, out.stdout.trim());
        Ok(())
    }
}
