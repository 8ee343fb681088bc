use crate::shelf::normalize::strip_duplicate_rendition;
use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use mailparse::{MailAddr, MailHeaderMap, ParsedMail};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub identifier: String,
    pub sender: String,
    pub subject: String,
    pub delivery_date: DateTime<FixedOffset>,
    pub body: String,
    pub folder: Option<String>,
}

fn fallback_identifier(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    format!("sha256:{:x}", hasher.finalize())
}

/// `Message-ID` of a header block, if present.
pub fn identifier_from_headers(raw_headers: &[u8]) -> Option<String> {
    let (headers, _) = mailparse::parse_headers(raw_headers).ok()?;
    headers
        .get_first_value("Message-ID")
        .map(|v| v.split_whitespace().collect::<Vec<_>>().join(""))
        .filter(|v| !v.is_empty())
}

fn normalize_sender(from: &str) -> String {
    let parsed = mailparse::addrparse(from).ok().and_then(|list| {
        list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some(info.addr.clone()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
        })
    });
    parsed
        .unwrap_or_else(|| from.to_string())
        .trim()
        .to_ascii_lowercase()
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date);
    }
    let epoch = mailparse::dateparse(trimmed).ok()?;
    Utc.timestamp_opt(epoch, 0)
        .single()
        .map(|utc| utc.fixed_offset())
}

fn body_text(parsed: &ParsedMail, raw: &[u8], body_offset: usize) -> String {
    let text = if parsed.subparts.is_empty() {
        parsed
            .get_body()
            .unwrap_or_else(|_| String::from_utf8_lossy(&raw[body_offset..]).into_owned())
    } else {
        // Multipart text is rendered as a header-less entity (empty line,
        // then the raw section), which puts the opening boundary on line 2.
        format!("\n{}", String::from_utf8_lossy(&raw[body_offset..]))
    };
    strip_duplicate_rendition(&text.replace("\r\n", "\n"))
}

/// Turn one raw RFC 822 message into a record ready for archiving.
///
/// `received_at` stands in for a missing or unreadable `Date` header.
pub fn parse_message(
    raw: &[u8],
    folder: Option<&str>,
    received_at: DateTime<FixedOffset>,
) -> Result<MessageRecord> {
    let parsed = mailparse::parse_mail(raw).context("failed to parse message")?;
    let (_, body_offset) =
        mailparse::parse_headers(raw).context("failed to parse message headers")?;
    let headers = &parsed.headers;

    let identifier = identifier_from_headers(raw).unwrap_or_else(|| fallback_identifier(raw));
    let sender = headers
        .get_first_value("From")
        .map(|from| normalize_sender(&from))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let subject = headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let delivery_date = headers
        .get_first_value("Date")
        .and_then(|d| parse_date(&d))
        .unwrap_or(received_at);

    Ok(MessageRecord {
        identifier,
        sender,
        subject,
        delivery_date,
        body: body_text(&parsed, raw, body_offset.min(raw.len())),
        folder: folder.map(ToOwned::to_owned),
    })
}
