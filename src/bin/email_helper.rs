use std::io::{BufRead, Read};
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use log::info;

use email_helper::auth::credentials::{self, AUTH_CODE, EMAIL_ADDRESS};
use email_helper::classify::Classifier;
use email_helper::config::{Config, load_config, resolve_db_path};
use email_helper::digest::{DigestOutcome, DigestSelection, send_digest, sender_from_config};
use email_helper::domain::{Category, MessageFilter, Urgency};
use email_helper::mail::{ImapClient, imap_server_for};
use email_helper::pipeline::run_batch;
use email_helper::report;
use email_helper::store::{MessageStore, SqliteStore};
use email_helper::sync::ingest;

#[derive(Parser)]
#[command(name = "email_helper")]
#[command(about = "Fetch, classify and digest mail with a local model", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch recent mail over IMAP into the local store
    Sync {
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        folder: Option<String>,

        /// Mailbox address; saved to the keyring when given
        #[arg(long)]
        email: Option<String>,

        /// IMAP auth code; saved to the keyring when given
        #[arg(long)]
        auth_code: Option<String>,
    },

    /// Classify unprocessed messages
    Classify {
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,

        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List stored messages
    List {
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        #[arg(short, long)]
        category: Option<Category>,

        #[arg(short, long)]
        urgency: Option<Urgency>,

        /// Show attachment counts in the table
        #[arg(short, long)]
        attachments: bool,

        /// Table only
        #[arg(long)]
        no_details: bool,
    },

    /// Print store statistics
    Stats,

    /// List the mailbox folders on the IMAP server
    Folders,

    /// Send a digest of classified mail
    Summary {
        /// Include every recent processed message, not only urgent ones
        #[arg(short, long)]
        all: bool,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Store a secret in the keyring (value read from stdin)
    SetSecret { name: String },

    /// Print a secret, asking for it on stdin if it isn't stored yet
    GetSecret { name: String },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = || load_config(cli.config.as_deref()).map_err(|e| anyhow!("Configuration error: {e}"));

    match cli.cmd {
        Command::SetSecret { ref name } => {
            eprintln!("Paste value for {name} (end with Ctrl-D):");
            let mut value = String::new();
            std::io::stdin().read_to_string(&mut value)?;
            credentials::save_secret(name, value.trim())?;
            println!("Saved {name}");
            Ok(())
        }

        Command::GetSecret { ref name } => {
            let value = match credentials::load_secret(name)? {
                Some(v) => v,
                None => {
                    eprintln!("{name} not stored, enter it now:");
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        return Err(anyhow!("no value given for {name}"));
                    }
                    credentials::save_secret(name, &line)?;
                    line
                }
            };
            println!("{value}");
            Ok(())
        }

        Command::Sync {
            limit,
            ref folder,
            ref email,
            ref auth_code,
        } => {
            let cfg = cfg()?;
            if let Some(e) = email {
                credentials::save_secret(EMAIL_ADDRESS, e)?;
            }
            if let Some(code) = auth_code {
                credentials::save_secret(AUTH_CODE, code)?;
            }
            sync(&cfg, folder.as_deref(), limit)
        }

        Command::Classify { limit, ref model } => {
            let mut cfg = cfg()?;
            if let Some(m) = model {
                cfg.classifier.model = m.clone();
            }
            let store = open_store(&cfg)?;
            let classifier = Classifier::from_config(&cfg.classifier)?;
            info!("classifying with {}", cfg.classifier.model);

            let summary = run_batch(&store, &classifier, limit)?;
            println!(
                "Classified {} messages: {} succeeded, {} failed",
                summary.total, summary.succeeded, summary.failed
            );
            Ok(())
        }

        Command::List {
            limit,
            category,
            urgency,
            attachments,
            no_details,
        } => {
            let cfg = cfg()?;
            let store = open_store(&cfg)?;
            let records = store.list(MessageFilter { category, urgency }, limit)?;

            print!("{}", report::stats_block(&store.stats()?));

            let details = records
                .iter()
                .map(|r| {
                    if r.has_attachments {
                        store.attachments(r.id)
                    } else {
                        Ok(Vec::new())
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            let counts: Vec<usize> = details.iter().map(Vec::len).collect();

            print!(
                "{}",
                report::table(&records, attachments.then_some(counts.as_slice()))
            );
            if !no_details {
                for (r, atts) in records.iter().zip(&details) {
                    print!("{}", report::details(r, atts));
                }
            }
            Ok(())
        }

        Command::Stats => {
            let cfg = cfg()?;
            let store = open_store(&cfg)?;
            print!("{}", report::stats_block(&store.stats()?));
            Ok(())
        }

        Command::Folders => {
            let cfg = cfg()?;
            for folder in imap_client(&cfg)?.list_folders()? {
                println!("{folder}");
            }
            Ok(())
        }

        Command::Summary { all, limit } => {
            let cfg = cfg()?;
            let store = open_store(&cfg)?;
            let sender = sender_from_config(&cfg)?;
            let selection = if all {
                DigestSelection::RecentProcessed
            } else {
                DigestSelection::Urgent
            };

            match send_digest(&store, sender.as_ref(), selection, limit)? {
                DigestOutcome::Empty => println!("Nothing to send"),
                DigestOutcome::Sent { count } => println!("Digest sent with {count} messages"),
            }
            Ok(())
        }
    }
}

fn open_store(cfg: &Config) -> Result<SqliteStore> {
    let db_path = resolve_db_path(cfg)?;
    Ok(SqliteStore::open(&db_path)?)
}

fn imap_client(cfg: &Config) -> Result<ImapClient> {
    let creds = credentials::imap_credentials(cfg)?;
    let server = cfg
        .imap
        .server
        .clone()
        .or_else(|| imap_server_for(&creds.email))
        .ok_or_else(|| anyhow!("cannot derive an IMAP server from {}", creds.email))?;
    Ok(ImapClient::new(
        server,
        cfg.imap.port,
        creds.email,
        creds.auth_code,
    ))
}

fn sync(cfg: &Config, folder: Option<&str>, limit: usize) -> Result<()> {
    let folder = folder.unwrap_or(&cfg.imap.folder);
    let imap = imap_client(cfg)?;
    let store = open_store(cfg)?;
    let fetched = imap.fetch_recent(folder, limit)?;

    let summary = ingest(&store, fetched, folder);
    println!(
        "Fetched {}: {} new, {} duplicate, {} failed",
        summary.total, summary.new, summary.duplicate, summary.failed
    );
    Ok(())
}
