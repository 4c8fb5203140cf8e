use chrono::{DateTime, Local};

use crate::domain::{Category, MessageRecord, Urgency};

const SENDER_WIDTH: usize = 30;
const SUBJECT_WIDTH: usize = 50;

const STYLE: &str = r#"<style>
  table { border-collapse: collapse; width: 100%; font-size: 14px; }
  th { background-color: #4CAF50; color: white; padding: 8px; text-align: left; }
  td { border: 1px solid #ddd; padding: 8px; }
  tr:nth-child(even) { background-color: #f2f2f2; }
  .stats { margin: 10px 0; padding: 10px; background-color: #f9f9f9; border-radius: 5px; }
  .urgency-urgent { color: #f44336; font-weight: bold; }
  .urgency-normal { color: #666; }
</style>"#;

/// Records split by category, each bucket keeping the input order.
#[derive(Debug, Default)]
pub struct Buckets<'a> {
    pub tasks: Vec<&'a MessageRecord>,
    pub notifications: Vec<&'a MessageRecord>,
    pub other: Vec<&'a MessageRecord>,
}

pub fn partition(records: &[MessageRecord]) -> Buckets<'_> {
    let mut b = Buckets::default();
    for r in records {
        match r.category {
            Some(Category::Task) => b.tasks.push(r),
            Some(Category::Notification) => b.notifications.push(r),
            None => b.other.push(r),
        }
    }
    b
}

pub fn render_html(records: &[MessageRecord], generated_at: DateTime<Local>) -> String {
    let buckets = partition(records);
    let mut out = vec![
        "<html><head>".to_string(),
        r#"<meta charset="utf-8">"#.to_string(),
        STYLE.to_string(),
        "</head><body>".to_string(),
        "<h2>Mail digest</h2>".to_string(),
        "<div class='stats'>".to_string(),
        format!(
            "<p>Generated: {}</p>",
            generated_at.format("%Y-%m-%d %H:%M:%S")
        ),
        format!("<p><strong>{}</strong> messages</p>", records.len()),
        "</div>".to_string(),
    ];

    section(&mut out, "Tasks", &buckets.tasks);
    section(&mut out, "Notifications", &buckets.notifications);
    section(&mut out, "Other", &buckets.other);

    out.push("<hr><p><small>Generated by email_helper</small></p>".to_string());
    out.push("</body></html>".to_string());
    out.join("\n")
}

fn section(out: &mut Vec<String>, title: &str, records: &[&MessageRecord]) {
    if records.is_empty() {
        return;
    }
    out.push(format!("<h3>{title} ({})</h3>", records.len()));
    out.push(
        "<table><tr><th>ID</th><th>Date</th><th>From</th><th>Subject</th><th>Urgency</th></tr>"
            .to_string(),
    );
    for r in records {
        let (class, marker) = urgency_marker(r.urgency);
        out.push("<tr>".to_string());
        out.push(format!("<td>{}</td>", r.id));
        out.push(format!("<td>{}</td>", escape(&format_date(&r.date_sent))));
        out.push(format!(
            "<td>{}</td>",
            escape(&truncate(&r.from, SENDER_WIDTH))
        ));
        out.push(format!(
            "<td>{}</td>",
            escape(&truncate(&r.subject, SUBJECT_WIDTH))
        ));
        out.push(format!("<td class='{class}'>{marker}</td>"));
        out.push("</tr>".to_string());
    }
    out.push("</table>".to_string());
}

fn urgency_marker(urgency: Option<Urgency>) -> (&'static str, &'static str) {
    match urgency {
        Some(Urgency::Urgent) => ("urgency-urgent", "🔴 URGENT"),
        Some(Urgency::Normal) => ("urgency-normal", "🟢 NORMAL"),
        None => ("urgency-normal", "-"),
    }
}

/// `YYYY-MM-DD HH:MM` in the sender's own offset; unparseable values are cut
/// to 16 characters.
pub fn format_date(date_sent: &str) -> String {
    let s = date_sent.trim();
    if s.is_empty() {
        return "N/A".to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    s.chars().take(16).collect()
}

/// Cut to `max` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
