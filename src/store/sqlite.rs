use std::collections::BTreeMap;

use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::domain::{
    AddOutcome, AttachmentRecord, Classification, MessageFilter, MessageRecord, MessageRowId,
    NewMessage, StoreStats, sent_epoch,
};
use crate::error::StorageError;
use crate::store::repo::{MessageStore, StoreResult};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ','now')";

const RECORD_COLUMNS: &str = r#"
    id, message_id, uid, folder, subject, from_addr, to_addr, cc_addr,
    date_sent, date_received, body_plain, body_html, has_attachments,
    processed, category, urgency, created_at, updated_at
"#;

const NEWEST_FIRST: &str = "ORDER BY sent_epoch DESC, id DESC";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &std::path::Path) -> StoreResult<Self> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        debug!("opened message store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS emails (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id      TEXT UNIQUE NOT NULL,
                uid             TEXT NOT NULL DEFAULT '',
                folder          TEXT NOT NULL DEFAULT 'INBOX',
                subject         TEXT NOT NULL DEFAULT '',
                from_addr       TEXT NOT NULL DEFAULT '',
                to_addr         TEXT NOT NULL DEFAULT '',
                cc_addr         TEXT NOT NULL DEFAULT '',
                date_sent       TEXT NOT NULL DEFAULT '',
                sent_epoch      INTEGER NOT NULL DEFAULT 0,
                date_received   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                body_plain      TEXT,
                body_html       TEXT,
                has_attachments INTEGER NOT NULL DEFAULT 0,
                processed       INTEGER NOT NULL DEFAULT 0,
                category        TEXT,
                urgency         TEXT,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
                CHECK (processed = 1 OR (category IS NULL AND urgency IS NULL))
            );

            CREATE TABLE IF NOT EXISTS attachments (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id     INTEGER NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                filename     TEXT NOT NULL,
                size         INTEGER NOT NULL DEFAULT 0,
                content_type TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_message_id ON emails(message_id);
            CREATE INDEX IF NOT EXISTS idx_category   ON emails(category);
            CREATE INDEX IF NOT EXISTS idx_urgency    ON emails(urgency);
            CREATE INDEX IF NOT EXISTS idx_processed  ON emails(processed);
            CREATE INDEX IF NOT EXISTS idx_date_sent  ON emails(sent_epoch DESC, id DESC);
            CREATE INDEX IF NOT EXISTS idx_attachments_email ON attachments(email_id);
            "#,
        )?;
        Ok(())
    }

    fn query_records(&self, sql: &str, values: Vec<Value>) -> StoreResult<Vec<MessageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_record)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn row_to_record(r: &Row<'_>) -> rusqlite::Result<MessageRecord> {
    let category: Option<String> = r.get(14)?;
    let urgency: Option<String> = r.get(15)?;
    Ok(MessageRecord {
        id: r.get(0)?,
        message_id: r.get(1)?,
        uid: r.get(2)?,
        folder: r.get(3)?,
        subject: r.get(4)?,
        from: r.get(5)?,
        to: r.get(6)?,
        cc: r.get(7)?,
        date_sent: r.get(8)?,
        date_received: r.get(9)?,
        body_plain: r.get(10)?,
        body_html: r.get(11)?,
        has_attachments: r.get(12)?,
        processed: r.get(13)?,
        category: category.and_then(|c| c.parse().ok()),
        urgency: urgency.and_then(|u| u.parse().ok()),
        created_at: r.get(16)?,
        updated_at: r.get(17)?,
    })
}

fn limit_value(limit: usize) -> Value {
    Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX))
}

impl MessageStore for SqliteStore {
    fn exists(&self, message_id: &str) -> StoreResult<bool> {
        let hit = self
            .conn
            .query_row(
                "SELECT 1 FROM emails WHERE message_id = ?1",
                params![message_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    fn add(&self, m: &NewMessage) -> StoreResult<AddOutcome> {
        if m.message_id.trim().is_empty() {
            return Err(StorageError::InvalidRecord(format!(
                "message uid {} in {} has no Message-ID",
                m.uid, m.folder
            )));
        }
        if self.exists(&m.message_id)? {
            return Ok(AddOutcome::Duplicate);
        }

        // Dropping the transaction without commit rolls the parent row back too.
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            INSERT INTO emails (
                message_id, uid, folder, subject, from_addr, to_addr, cc_addr,
                date_sent, sent_epoch, body_plain, body_html, has_attachments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                m.message_id,
                m.uid,
                m.folder,
                m.subject,
                m.from,
                m.to,
                m.cc,
                m.date_sent,
                sent_epoch(&m.date_sent).unwrap_or(0),
                m.body_plain,
                m.body_html,
                m.has_attachments,
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO attachments (email_id, filename, size, content_type)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;
            for a in &m.attachments {
                let size = i64::try_from(a.size).unwrap_or(i64::MAX);
                stmt.execute(params![id, a.filename, size, a.content_type])?;
            }
        }
        tx.commit()?;
        Ok(AddOutcome::Inserted(id))
    }

    fn update_classification(
        &self,
        message_id: &str,
        classification: Classification,
    ) -> StoreResult<bool> {
        let sql = format!(
            r#"
            UPDATE emails
            SET category = ?1, urgency = ?2, processed = 1, updated_at = {NOW}
            WHERE message_id = ?3
            "#
        );
        let n = self.conn.execute(
            &sql,
            params![
                classification.category.as_str(),
                classification.urgency.as_str(),
                message_id
            ],
        )?;
        Ok(n > 0)
    }

    fn list_unprocessed(&self, limit: usize) -> StoreResult<Vec<MessageRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM emails WHERE processed = 0 {NEWEST_FIRST} LIMIT ?1"
        );
        self.query_records(&sql, vec![limit_value(limit)])
    }

    fn list_urgent_processed(&self) -> StoreResult<Vec<MessageRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM emails \
             WHERE processed = 1 AND urgency = 'urgent' {NEWEST_FIRST}"
        );
        self.query_records(&sql, vec![])
    }

    fn list_recent_processed(&self, limit: usize) -> StoreResult<Vec<MessageRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM emails WHERE processed = 1 {NEWEST_FIRST} LIMIT ?1"
        );
        self.query_records(&sql, vec![limit_value(limit)])
    }

    fn list(&self, filter: MessageFilter, limit: Option<usize>) -> StoreResult<Vec<MessageRecord>> {
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM emails WHERE 1=1");
        let mut values = Vec::new();

        if let Some(c) = filter.category {
            values.push(Value::Text(c.as_str().to_string()));
            sql.push_str(&format!(" AND category = ?{}", values.len()));
        }
        if let Some(u) = filter.urgency {
            values.push(Value::Text(u.as_str().to_string()));
            sql.push_str(&format!(" AND urgency = ?{}", values.len()));
        }
        sql.push(' ');
        sql.push_str(NEWEST_FIRST);
        if let Some(limit) = limit {
            values.push(limit_value(limit));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        self.query_records(&sql, values)
    }

    fn attachments(&self, id: MessageRowId) -> StoreResult<Vec<AttachmentRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, email_id, filename, size, content_type
            FROM attachments
            WHERE email_id = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![id], |r| {
            Ok(AttachmentRecord {
                id: r.get(0)?,
                message_row_id: r.get(1)?,
                filename: r.get(2)?,
                size: u64::try_from(r.get::<_, i64>(3)?).unwrap_or(0),
                content_type: r.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let count = |sql: &str| -> StoreResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |r| r.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        };
        let grouped = |column: &str| -> StoreResult<BTreeMap<String, u64>> {
            let sql = format!(
                "SELECT {column}, COUNT(*) FROM emails \
                 WHERE {column} IS NOT NULL GROUP BY {column}"
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, u64::try_from(r.get::<_, i64>(1)?).unwrap_or(0)))
            })?;
            Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
        };

        let latest_date_sent = self
            .conn
            .query_row(
                &format!("SELECT date_sent FROM emails {NEWEST_FIRST} LIMIT 1"),
                [],
                |r| r.get::<_, String>(0),
            )
            .optional()?;

        Ok(StoreStats {
            total: count("SELECT COUNT(*) FROM emails")?,
            processed: count("SELECT COUNT(*) FROM emails WHERE processed = 1")?,
            unprocessed: count("SELECT COUNT(*) FROM emails WHERE processed = 0")?,
            by_category: grouped("category")?,
            by_urgency: grouped("urgency")?,
            latest_date_sent,
        })
    }

    fn mark_summary_sent(&self, ids: &[MessageRowId]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!("UPDATE emails SET updated_at = {NOW} WHERE id IN ({placeholders})");
        self.conn.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(())
    }
}
