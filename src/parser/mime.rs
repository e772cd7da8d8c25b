//! MIME body handling: plain-text extraction, attachment names, HTML-to-text.

use mail_parser::{Message, MimeHeaders};

/// Plain-text body of a parsed message.
///
/// Prefers the first `text/plain` part and falls back to the first HTML part
/// converted to text.
pub fn body_text(msg: &Message<'_>) -> Option<String> {
    msg.body_text(0)
        .map(|s| s.into_owned())
        .or_else(|| msg.body_html(0).map(|html| html_to_text(&html)))
}

/// Attachment file names in MIME order, generating a name when missing.
pub fn attachment_names(msg: &Message<'_>) -> Vec<String> {
    msg.attachments()
        .enumerate()
        .map(|(idx, part)| {
            part.attachment_name()
                .map(String::from)
                .unwrap_or_else(|| format!("attachment_{idx}"))
        })
        .collect()
}

/// Skip a leading mbox `From ` separator line (and a UTF-8 BOM) if present.
///
/// Some archivers store single messages with their mbox envelope line.
pub fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Convert HTML to plain text suitable for indexing.
///
/// - Block elements become line breaks
/// - Scripts and styles are removed
/// - Common HTML entities are decoded
/// - Blank lines are collapsed
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    // Strip tags; block-level tags become newlines
    let mut result = String::with_capacity(text.len());
    let mut tag = String::new();
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                if is_block_tag(&tag) {
                    result.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => result.push(ch),
        }
    }

    let result = result
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&");

    let mut cleaned = String::with_capacity(result.len());
    let mut prev_was_blank = false;
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank && !cleaned.is_empty() {
                cleaned.push('\n');
            }
            prev_was_blank = true;
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }
    cleaned.trim().to_string()
}

fn is_block_tag(tag: &str) -> bool {
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    matches!(
        name.as_str(),
        "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table"
    )
}

/// Remove an entire tag block (e.g. `<script>…</script>`), case-insensitively.
fn remove_tag_block(html: &str, tag: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `html`
    let lower = html.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    let mut result = String::with_capacity(html.len());
    let mut pos = 0;
    while let Some(start) = lower[pos..].find(&open) {
        let start = pos + start;
        result.push_str(&html[pos..start]);
        match lower[start..].find(&close) {
            Some(end) => pos = start + end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
        let plain = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(plain), plain);
    }

    #[test]
    fn test_html_to_text_basic() {
        let text = html_to_text("<p>Hello <b>world</b></p><p>Second paragraph</p>");
        assert!(text.contains("Hello world"));
        assert!(text.contains("Second paragraph"));
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("Tom &amp; Jerry &lt;3&gt;"), "Tom & Jerry <3>");
    }

    #[test]
    fn test_html_to_text_removes_scripts() {
        assert_eq!(
            html_to_text("Before<SCRIPT>alert('xss')</script>After"),
            "BeforeAfter"
        );
    }

    #[test]
    fn test_body_text_falls_back_to_html() {
        let raw = b"Subject: x\nContent-Type: text/html\n\n<p>Only <i>html</i> here</p>\n";
        let msg = MessageParser::default().parse(&raw[..]).unwrap();
        let text = body_text(&msg).unwrap();
        assert!(text.contains("Only html here"));
    }
}
