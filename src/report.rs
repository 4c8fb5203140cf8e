//! Plain-text console output for `list` and `stats`.

use std::fmt::Write as _;

use crate::digest::render::{format_date, truncate};
use crate::domain::{AttachmentRecord, MessageRecord, StoreStats};

const RULE_WIDTH: usize = 145;
const DETAIL_BODY_CHARS: usize = 500;

pub fn stats_block(stats: &StoreStats) -> String {
    let mut out = String::from("=== Store ===\n");
    let _ = writeln!(out, "Total:       {}", stats.total);
    let _ = writeln!(out, "Processed:   {}", stats.processed);
    let _ = writeln!(out, "Unprocessed: {}", stats.unprocessed);
    if !stats.by_category.is_empty() {
        let _ = writeln!(out, "By category: {}", counts(&stats.by_category));
    }
    if !stats.by_urgency.is_empty() {
        let _ = writeln!(out, "By urgency:  {}", counts(&stats.by_urgency));
    }
    if let Some(latest) = &stats.latest_date_sent {
        let _ = writeln!(out, "Latest:      {latest}");
    }
    out
}

fn counts(map: &std::collections::BTreeMap<String, u64>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per record. `attachment_counts` is parallel to `records` when
/// attachment lines are wanted.
pub fn table(records: &[MessageRecord], attachment_counts: Option<&[usize]>) -> String {
    if records.is_empty() {
        return "\nNo messages.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{:<5} {:<16} {:<18} {:<30} {:<60} {:<12} {:<6}",
        "ID", "Date", "From", "Subject", "Summary", "Category", "Urgency"
    );
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');

    for (i, r) in records.iter().enumerate() {
        let category = r.category.map(|c| c.as_str()).unwrap_or("unclassified");
        let urgency = r.urgency.map(|u| u.as_str()).unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<5} {:<16} {:<18} {:<30} {:<60} {:<12} {:<6}",
            r.id,
            format_date(&r.date_sent),
            truncate(&r.from, 18),
            truncate(&r.subject, 30),
            body_summary(r.body_plain.as_deref().unwrap_or_default(), 60),
            category,
            urgency
        );
        if r.has_attachments
            && let Some(n) = attachment_counts.and_then(|c| c.get(i))
        {
            let _ = writeln!(out, "      attachments: {n}");
        }
    }

    out.push_str(&"=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "\n{} messages", records.len());
    out
}

/// First eight words on one line, cut to `max` characters.
pub fn body_summary(body: &str, max: usize) -> String {
    let words: Vec<&str> = body.split_whitespace().collect();
    let mut summary = words.iter().take(8).copied().collect::<Vec<_>>().join(" ");
    if words.len() > 8 {
        summary.push_str("...");
    }
    truncate(&summary, max)
}

pub fn details(record: &MessageRecord, attachments: &[AttachmentRecord]) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);
    let _ = writeln!(out, "\n{rule}\nMessage #{}\n{rule}", record.id);
    let _ = writeln!(out, "  Date:     {}", or_na(&record.date_sent));
    let _ = writeln!(out, "  From:     {}", or_na(&record.from));
    let _ = writeln!(out, "  To:       {}", or_na(&record.to));
    if !record.cc.is_empty() {
        let _ = writeln!(out, "  Cc:       {}", record.cc);
    }
    let _ = writeln!(
        out,
        "  Category: {}",
        record.category.map(|c| c.as_str()).unwrap_or("unclassified")
    );
    let _ = writeln!(
        out,
        "  Urgency:  {}",
        record.urgency.map(|u| u.as_str()).unwrap_or("-")
    );
    let _ = writeln!(out, "\n  Subject:\n    {}", or_na(&record.subject));

    if let Some(body) = record.body_plain.as_deref()
        && !body.trim().is_empty()
    {
        out.push_str("\n  Body:\n");
        let total = body.chars().count();
        let shown: String = body.chars().take(DETAIL_BODY_CHARS).collect();
        for line in shown.lines() {
            let _ = writeln!(out, "    {line}");
        }
        if total > DETAIL_BODY_CHARS {
            let _ = writeln!(out, "    ... (truncated, {total} characters)");
        }
    }

    if !attachments.is_empty() {
        let _ = writeln!(out, "\n  Attachments ({}):", attachments.len());
        for a in attachments {
            let _ = writeln!(out, "    - {}", a.filename);
            let _ = writeln!(
                out,
                "      size: {:.1} KB, type: {}",
                a.size as f64 / 1024.0,
                a.content_type
            );
        }
    }
    out
}

fn or_na(s: &str) -> &str {
    if s.is_empty() { "N/A" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, Urgency};

    fn record() -> MessageRecord {
        MessageRecord {
            id: 3,
            message_id: "<r@x>".into(),
            uid: "9".into(),
            folder: "INBOX".into(),
            subject: "Quarterly report".into(),
            from: "finance@example.com".into(),
            to: "me@example.com".into(),
            cc: String::new(),
            date_sent: "Mon, 12 Oct 2026 16:45:00 +0000".into(),
            date_received: String::new(),
            body_plain: Some("one two three four five six seven eight nine ten".into()),
            body_html: None,
            has_attachments: true,
            processed: true,
            category: Some(Category::Notification),
            urgency: Some(Urgency::Normal),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn summary_keeps_eight_words() {
        assert_eq!(
            body_summary("one two\nthree four five six seven eight nine", 60),
            "one two three four five six seven eight..."
        );
        assert_eq!(body_summary("short body", 60), "short body");
        assert_eq!(body_summary("", 60), "");
    }

    #[test]
    fn table_lists_rows_and_attachment_counts() {
        let out = table(&[record()], Some(&[2]));
        assert!(out.contains("2026-10-12 16:45"));
        assert!(out.contains("Quarterly report"));
        assert!(out.contains("notification"));
        assert!(out.contains("attachments: 2"));
        assert!(out.contains("1 messages"));
    }

    #[test]
    fn empty_table_says_so() {
        assert!(table(&[], None).contains("No messages."));
    }

    #[test]
    fn details_show_attachments_and_skip_empty_cc() {
        let att = AttachmentRecord {
            id: 1,
            message_row_id: 3,
            filename: "q3.pdf".into(),
            size: 2048,
            content_type: "application/pdf".into(),
        };
        let out = details(&record(), &[att]);
        assert!(!out.contains("Cc:"));
        assert!(out.contains("Attachments (1):"));
        assert!(out.contains("size: 2.0 KB, type: application/pdf"));
        assert!(out.contains("    one two three"));
    }

    #[test]
    fn stats_block_lists_breakdowns() {
        let mut stats = StoreStats {
            total: 3,
            processed: 2,
            unprocessed: 1,
            ..Default::default()
        };
        stats.by_category.insert("task".into(), 2);
        let out = stats_block(&stats);
        assert!(out.contains("Total:       3"));
        assert!(out.contains("By category: task=2"));
        assert!(!out.contains("By urgency"));
    }
}
