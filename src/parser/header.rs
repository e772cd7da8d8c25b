//! Raw header access and lenient date parsing.
//!
//! `mail-parser` covers the headers we index directly; this module handles
//! the leftovers: reading an unfolded header value straight from the raw
//! bytes (used for `Received:`) and parsing the odd date formats real
//! servers emit.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::debug;

/// Extract the raw header block (everything before the first blank line).
pub fn extract_raw_headers(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let end = match (text.find("\n\n"), text.find("\r\n\r\n")) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => text.len(),
    };
    text[..end].to_string()
}

/// First value of header `name` (case-insensitive), with continuation lines
/// unfolded into single spaces.
pub fn header_value(raw_headers: &str, name: &str) -> Option<String> {
    let mut current: Option<String> = None;
    for line in raw_headers.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(ref mut value) = current {
                value.push(' ');
                value.push_str(line.trim());
            }
            continue;
        }
        if current.is_some() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                current = Some(value.trim().to_string());
            }
        }
    }
    current
}

/// Date of the topmost `Received:` header (the text after its last `;`).
pub fn received_date(raw_headers: &str) -> Option<DateTime<Utc>> {
    let received = header_value(raw_headers, "received")?;
    let (_, date_part) = received.rsplit_once(';')?;
    parse_date(date_part)
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Trailing comments such as "(PST)" confuse chrono
    let no_comment = match trimmed.find('(') {
        Some(pos) => trimmed[..pos].trim(),
        None => trimmed,
    };
    let candidate = replace_named_tz(strip_day_of_week(no_comment));

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&candidate, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    debug!(date = trimmed, "Could not parse date");
    None
}

/// Strip a leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> &str {
    const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in DAYS {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim_start_matches(',').trim_start();
        }
    }
    s
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    const ZONES: [(&str, &str); 10] = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
    ];
    let mut out = s.to_string();
    for (name, offset) in ZONES {
        if let Some(stripped) = out.strip_suffix(name) {
            out = format!("{stripped}{offset}");
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_raw_headers() {
        let data = b"From: alice@example.com\nSubject: Hi\n\nBody here\n";
        let headers = extract_raw_headers(data);
        assert!(headers.contains("From: alice@example.com"));
        assert!(headers.contains("Subject: Hi"));
        assert!(!headers.contains("Body here"));
    }

    #[test]
    fn test_header_value_unfolds() {
        let raw = "Received: from mx.example.com\n\tby inbound.example.com;\n Tue, 2 Jan 2024 10:00:00 +0000\nSubject: x";
        let value = header_value(raw, "RECEIVED").unwrap();
        assert_eq!(
            value,
            "from mx.example.com by inbound.example.com; Tue, 2 Jan 2024 10:00:00 +0000"
        );
    }

    #[test]
    fn test_received_date_uses_first_header() {
        let raw = "Received: by a; Tue, 2 Jan 2024 10:00:00 +0000\nReceived: by b; Mon, 1 Jan 2024 09:00:00 +0000";
        let date = received_date(raw).unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-02T10:00:00+00:00");
    }

    #[test]
    fn test_parse_date_variants() {
        assert!(parse_date("Tue, 2 Jan 2024 10:00:00 +0000").is_some());
        assert!(parse_date("2024-01-02T10:00:00Z").is_some());
        assert!(parse_date("Tue, 2 Jan 2024 10:00:00 PST").is_some());
        assert!(parse_date("2 Jan 2024 10:00:00 +0000 (UTC)").is_some());
        assert!(parse_date("garbage").is_none());
        assert!(parse_date("   ").is_none());
    }
}
