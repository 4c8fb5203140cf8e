use anyhow::{Result, anyhow};
use log::{debug, warn};
use native_tls::TlsConnector;

/// One message as the server sent it.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub uid: u32,
    pub raw: Vec<u8>,
}

pub struct ImapClient {
    pub server: String,
    pub port: u16,
    pub user: String,
    password: String,
}

impl ImapClient {
    pub fn new(
        server: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port,
            user: user.into(),
            password: password.into(),
        }
    }

    fn connect_and_login(
        &self,
    ) -> Result<imap::Session<native_tls::TlsStream<std::net::TcpStream>>> {
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect((self.server.as_str(), self.port), self.server.as_str(), &tls)?;
        client
            .login(&self.user, &self.password)
            .map_err(|(e, _)| anyhow!("IMAP login as {} failed: {e}", self.user))
    }

    /// The newest `limit` messages in `folder`, newest first. Bodies are
    /// fetched with `BODY.PEEK[]` so the server's seen flags stay untouched.
    pub fn fetch_recent(&self, folder: &str, limit: usize) -> Result<Vec<FetchedMessage>> {
        let mut session = self.connect_and_login()?;
        session.select(folder)?;

        let mut uids: Vec<u32> = session.uid_search("ALL")?.into_iter().collect();
        uids.sort_unstable_by(|a, b| b.cmp(a));
        uids.truncate(limit);
        debug!("{} UIDs selected from {folder}", uids.len());

        let mut out = Vec::with_capacity(uids.len());
        for uid in uids {
            let fetches = session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
            match fetches.iter().next().and_then(|f| f.body()) {
                Some(raw) => out.push(FetchedMessage {
                    uid,
                    raw: raw.to_vec(),
                }),
                None => warn!("UID {uid} came back without a body, skipping"),
            }
        }

        session.logout()?;
        Ok(out)
    }

    /// Every mailbox name the account can see.
    pub fn list_folders(&self) -> Result<Vec<String>> {
        let mut session = self.connect_and_login()?;
        let names = session.list(None, Some("*"))?;
        let folders = names.iter().map(|n| n.name().to_string()).collect();
        session.logout()?;
        Ok(folders)
    }
}

/// IMAP host for a mailbox address, from a short table of known providers.
pub fn imap_server_for(email: &str) -> Option<String> {
    let domain = email.rsplit_once('@')?.1.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return None;
    }
    let known = match domain.as_str() {
        "qq.com" => "imap.qq.com",
        "163.com" => "imap.163.com",
        "126.com" => "imap.126.com",
        "gmail.com" => "imap.gmail.com",
        "outlook.com" | "hotmail.com" => "outlook.office365.com",
        "139.com" => "imap.139.com",
        "chinamobile.com" => "imap.chinamobile.com",
        other => return Some(format!("imap.{other}")),
    };
    Some(known.to_string())
}
