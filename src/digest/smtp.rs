use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::auth::credentials::ImapCredentials;
use crate::config::DigestConfig;
use crate::digest::sender::DigestSender;

const SUBMISSION_PORT: u16 = 587;
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
}

/// Submission server for a mailbox address. Unknown domains get
/// `smtp.<domain>` with STARTTLS on 587.
pub fn smtp_server_for(email: &str) -> Option<SmtpEndpoint> {
    let domain = email.rsplit_once('@')?.1.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return None;
    }
    let (host, port) = match domain.as_str() {
        "gmail.com" => ("smtp.gmail.com".to_string(), SUBMISSION_PORT),
        "outlook.com" => ("smtp.office365.com".to_string(), SUBMISSION_PORT),
        "hotmail.com" => ("smtp.live.com".to_string(), SUBMISSION_PORT),
        "yahoo.com" => ("smtp.mail.yahoo.com".to_string(), SUBMISSION_PORT),
        "icloud.com" => ("smtp.mail.me.com".to_string(), SUBMISSION_PORT),
        "qq.com" | "163.com" | "126.com" | "139.com" => {
            (format!("smtp.{domain}"), IMPLICIT_TLS_PORT)
        }
        other => (format!("smtp.{other}"), SUBMISSION_PORT),
    };
    Some(SmtpEndpoint { host, port })
}

/// Mails the digest as HTML, by default to the sending account itself.
pub struct SmtpSender {
    endpoint: SmtpEndpoint,
    from: Mailbox,
    to: Mailbox,
    credentials: ImapCredentials,
    timeout: Duration,
}

impl SmtpSender {
    pub fn new(
        endpoint: SmtpEndpoint,
        credentials: ImapCredentials,
        recipient: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let from: Mailbox = credentials.email.parse()?;
        let to: Mailbox = match recipient {
            Some(r) => r.parse()?,
            None => from.clone(),
        };
        Ok(Self {
            endpoint,
            from,
            to,
            credentials,
            timeout,
        })
    }

    /// Endpoint from `digest.smtp_server`/`smtp_port`, else from the address domain.
    pub fn from_config(cfg: &DigestConfig, credentials: ImapCredentials) -> Result<Self> {
        let endpoint = match &cfg.smtp_server {
            Some(host) => SmtpEndpoint {
                host: host.clone(),
                port: cfg.smtp_port.unwrap_or(SUBMISSION_PORT),
            },
            None => {
                let mut ep = smtp_server_for(&credentials.email).ok_or_else(|| {
                    anyhow!("cannot derive an SMTP server from {}", credentials.email)
                })?;
                if let Some(port) = cfg.smtp_port {
                    ep.port = port;
                }
                ep
            }
        };
        Self::new(
            endpoint,
            credentials,
            cfg.recipient.as_deref(),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn build_message(&self, body: &str, now: DateTime<Local>) -> Result<Message> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(format!("Mail digest - {}", now.format("%Y-%m-%d %H:%M")))
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())?)
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let builder = if self.endpoint.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&self.endpoint.host)?
        } else {
            SmtpTransport::starttls_relay(&self.endpoint.host)?
        };
        Ok(builder
            .port(self.endpoint.port)
            .credentials(Credentials::new(
                self.credentials.email.clone(),
                self.credentials.auth_code.clone(),
            ))
            .timeout(Some(self.timeout))
            .build())
    }
}

impl DigestSender for SmtpSender {
    fn send(&self, body: &str) -> Result<()> {
        let message = self.build_message(body, Local::now())?;
        self.transport()?.send(&message)?;
        info!(
            "digest mailed to {} via {}:{}",
            self.to, self.endpoint.host, self.endpoint.port
        );
        Ok(())
    }
}
