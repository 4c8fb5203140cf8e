use anyhow::{Context, Result};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

use crate::domain::{NewAttachment, NewMessage};

#[derive(Default)]
struct Parts {
    plain: Option<String>,
    html: Option<String>,
    attachments: Vec<NewAttachment>,
}

/// Parse a raw RFC 822 message into the shape the store accepts.
///
/// Header values are RFC 2047 decoded. `Date` is kept as written; the store
/// derives its sort key from it.
pub fn normalize(raw: &[u8], uid: &str, folder: &str) -> Result<NewMessage> {
    let parsed = mailparse::parse_mail(raw).context("malformed message")?;
    let header = |name: &str| {
        parsed
            .headers
            .get_first_value(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut parts = Parts::default();
    collect_parts(&parsed, &mut parts);

    Ok(NewMessage {
        message_id: header("Message-ID"),
        uid: uid.to_string(),
        folder: folder.to_string(),
        subject: header("Subject"),
        from: header("From"),
        to: header("To"),
        cc: header("Cc"),
        date_sent: header("Date"),
        body_plain: parts.plain,
        body_html: parts.html,
        has_attachments: !parts.attachments.is_empty(),
        attachments: parts.attachments,
    })
}

fn collect_parts(part: &ParsedMail, acc: &mut Parts) {
    let disposition = part.get_content_disposition();
    if disposition.disposition == DispositionType::Attachment {
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .map(|f| decode_mime_words(f.as_bytes()))
            .unwrap_or_default();
        acc.attachments.push(NewAttachment {
            filename,
            size: part.get_body_raw().map(|b| b.len() as u64).unwrap_or(0),
            content_type: part.ctype.mimetype.to_ascii_lowercase(),
        });
        return;
    }

    if !part.subparts.is_empty() {
        for sp in &part.subparts {
            collect_parts(sp, acc);
        }
        return;
    }

    let mime = part.ctype.mimetype.to_ascii_lowercase();
    let slot = match mime.as_str() {
        "text/plain" => &mut acc.plain,
        "text/html" => &mut acc.html,
        _ => return,
    };
    if slot.is_none()
        && let Ok(body) = part.get_body()
    {
        *slot = Some(body);
    }
}

/// Decode RFC 2047 encoded words in a bare header value.
pub fn decode_mime_words(raw: &[u8]) -> String {
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw);
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = concat!(
        "Message-ID: <meeting-1@example.com>\r\n",
        "Date: Tue, 13 Oct 2026 09:15:00 +0800\r\n",
        "From: =?UTF-8?B?5Lya6K6u6YCa55+l?= <boss@example.com>\r\n",
        "To: me@example.com\r\n",
        "Cc: team@example.com\r\n",
        "Subject: =?UTF-8?B?5Lya6K6u6YCa55+l?=\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Meeting at 3pm.\r\n",
        "--inner\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>Meeting at <b>3pm</b>.</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"=?UTF-8?B?5oql5ZGKLnBkZg==?=\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "aGVsbG8gd29ybGQ=\r\n",
        "--outer--\r\n",
    );

    #[test]
    fn headers_are_decoded_and_date_kept_raw() {
        let msg = normalize(MULTIPART.as_bytes(), "42", "INBOX").unwrap();
        assert_eq!(msg.message_id, "<meeting-1@example.com>");
        assert_eq!(msg.uid, "42");
        assert_eq!(msg.folder, "INBOX");
        assert_eq!(msg.subject, "会议通知");
        assert_eq!(msg.from, "会议通知 <boss@example.com>");
        assert_eq!(msg.to, "me@example.com");
        assert_eq!(msg.cc, "team@example.com");
        assert_eq!(msg.date_sent, "Tue, 13 Oct 2026 09:15:00 +0800");
    }

    #[test]
    fn bodies_come_from_nested_alternative_parts() {
        let msg = normalize(MULTIPART.as_bytes(), "42", "INBOX").unwrap();
        assert_eq!(msg.body_plain.as_deref().map(str::trim), Some("Meeting at 3pm."));
        assert!(msg.body_html.unwrap().contains("<b>3pm</b>"));
    }

    #[test]
    fn attachment_metadata_uses_decoded_size_and_name() {
        let msg = normalize(MULTIPART.as_bytes(), "42", "INBOX").unwrap();
        assert!(msg.has_attachments);
        assert_eq!(msg.attachments.len(), 1);
        let a = &msg.attachments[0];
        assert_eq!(a.filename, "报告.pdf");
        assert_eq!(a.size, 11);
        assert_eq!(a.content_type, "application/pdf");
    }

    #[test]
    fn single_part_message_without_optional_headers() {
        let raw = concat!(
            "Message-ID: <plain@example.com>\r\n",
            "Subject: hi\r\n",
            "\r\n",
            "just text\r\n",
        );
        let msg = normalize(raw.as_bytes(), "7", "Archive").unwrap();
        assert_eq!(msg.subject, "hi");
        assert_eq!(msg.from, "");
        assert_eq!(msg.date_sent, "");
        assert_eq!(msg.body_plain.as_deref().map(str::trim), Some("just text"));
        assert!(msg.body_html.is_none());
        assert!(!msg.has_attachments);
    }

    #[test]
    fn plain_words_pass_through_decoder() {
        assert_eq!(decode_mime_words(b"plain value"), "plain value");
        assert_eq!(decode_mime_words(b"=?UTF-8?B?5Lya6K6u6YCa55+l?="), "会议通知");
    }
}
