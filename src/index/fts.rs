//! Escaping of user text for FTS5 `MATCH` expressions.
//!
//! User input is never handed to FTS5 as query syntax. Everything is wrapped
//! in a quoted phrase so operators (`AND`, `OR`, `NOT`, `NEAR`), column
//! filters and parentheses lose their meaning. A single trailing `*` is the
//! one piece of syntax that survives, placed after the closing quote as a
//! prefix query.

/// Quote `text` as an FTS5 phrase, doubling embedded quotes.
///
/// `None` and `Some("")` pass through unchanged. If the trimmed text ends in
/// exactly one `*` after a non-empty remainder, the remainder is quoted and
/// the `*` re-appended outside the quotes:
///
/// ```
/// use mailsift::index::fts::escape_fts5_query;
///
/// assert_eq!(escape_fts5_query(Some("a OR b")).as_deref(), Some("\"a OR b\""));
/// assert_eq!(escape_fts5_query(Some("proj*")).as_deref(), Some("\"proj\"*"));
/// assert_eq!(escape_fts5_query(None), None);
/// ```
pub fn escape_fts5_query(text: Option<&str>) -> Option<String> {
    let text = text?;
    if text.is_empty() {
        return Some(String::new());
    }

    let cleaned = strip_controls(text);
    let trimmed = cleaned.trim();
    if let Some(prefix) = trimmed.strip_suffix('*') {
        if !prefix.is_empty() && !prefix.ends_with('*') {
            return Some(format!("{}*", quote(prefix)));
        }
    }
    Some(quote(trimmed))
}

/// Build the `MATCH` operand for free-text `text`.
///
/// Returns `None` for absent, empty or whitespace-only input so callers can
/// skip the full-text predicate entirely.
pub fn prepare_fts5_match_query(text: Option<&str>) -> Option<String> {
    let cleaned = strip_controls(text?);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }
    escape_fts5_query(Some(trimmed))
}

/// FTS5 stops reading an expression at NUL, so control characters become
/// spaces.
fn strip_controls(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}
