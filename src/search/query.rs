//! Search query model and parser.
//!
//! Parses user-typed query strings into a structured [`SearchQuery`].
//!
//! # Supported syntax
//!
//! **Free text**: `kafka outage`, matched against subject, body, sender and
//! recipients through the full-text index (as one literal phrase).
//!
//! **Field filters** (keywords are case-insensitive):
//! - `from:alice@example.com` / `from:*@example.com`
//! - `to:bob@example.com`
//! - `subject:"project update"`
//! - `account:work`
//! - `folder:INBOX`
//!
//! **Date filters**:
//! - `after:2024-01-01` / `before:2024-06-01`
//! - `date:2024-01-15` (sets the lower bound only)
//! - `date:2024-01..2024-06-30` (partial dates accepted in ranges)
//!
//! A `*` inside a field value turns it into a wildcard match. Dates that do
//! not parse are dropped. Unknown `key:value` tokens are plain text.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// Result ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// Newest first.
    #[default]
    DateDesc,
    /// Oldest first.
    DateAsc,
    /// Best full-text match first; behaves like `DateDesc` without content terms.
    Relevance,
}

/// A structured search over the index.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchQuery {
    /// Sender address, exact or with `*` wildcards.
    pub from_address: Option<String>,
    /// Recipient address (any `To:` entry), exact or with `*` wildcards.
    pub to_address: Option<String>,
    /// Subject, exact or with `*` wildcards.
    pub subject: Option<String>,
    /// Free text for the full-text index.
    pub content_terms: Option<String>,
    /// Inclusive lower bound on the sent date.
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the sent date.
    pub date_to: Option<DateTime<Utc>>,
    /// Account name, exact or with `*` wildcards.
    pub account: Option<String>,
    /// Folder name, exact or with `*` wildcards.
    pub folder: Option<String>,
    /// Rows to skip before the page starts.
    pub skip: usize,
    /// Maximum rows in the page.
    pub take: usize,
    /// Result ordering.
    pub sort: SortOrder,
}

/// Page size used when nothing overrides it.
pub const DEFAULT_TAKE: usize = 100;

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            from_address: None,
            to_address: None,
            subject: None,
            content_terms: None,
            date_from: None,
            date_to: None,
            account: None,
            folder: None,
            skip: 0,
            take: DEFAULT_TAKE,
            sort: SortOrder::default(),
        }
    }
}

impl SearchQuery {
    /// Return a copy positioned at a different page.
    pub fn page(mut self, skip: usize, take: usize) -> Self {
        self.skip = skip;
        self.take = take;
        self
    }

    /// Return a copy with a different ordering.
    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Whether any filter is set (an empty query matches everything).
    pub fn has_filters(&self) -> bool {
        self.from_address.is_some()
            || self.to_address.is_some()
            || self.subject.is_some()
            || self.content_terms.is_some()
            || self.date_from.is_some()
            || self.date_to.is_some()
            || self.account.is_some()
            || self.folder.is_some()
    }
}

/// Parse a query string into a structured [`SearchQuery`].
///
/// Never fails: unrecognized syntax is treated as free text.
pub fn parse_query(input: &str) -> SearchQuery {
    let mut query = SearchQuery::default();
    let mut content: Vec<String> = Vec::new();

    for token in tokenize(input.trim()) {
        let Some((key, raw_value)) = token
            .split_once(':')
            .filter(|_| !token.starts_with('"'))
        else {
            content.push(unquote(&token).to_string());
            continue;
        };
        let value = unquote(raw_value);
        let value = (!value.is_empty()).then(|| value.to_string());

        match key.to_ascii_lowercase().as_str() {
            "from" => query.from_address = value.or(query.from_address),
            "to" => query.to_address = value.or(query.to_address),
            "subject" => query.subject = value.or(query.subject),
            "account" => query.account = value.or(query.account),
            "folder" => query.folder = value.or(query.folder),
            "after" => {
                if let Some(d) = value.as_deref().and_then(parse_period_start) {
                    query.date_from = Some(d);
                }
            }
            "before" => {
                if let Some(d) = value.as_deref().and_then(parse_period_start) {
                    // Upper bounds are inclusive; `before` excludes the day itself.
                    query.date_to = Some(d - chrono::Duration::seconds(1));
                }
            }
            "date" => {
                if let Some(v) = value.as_deref() {
                    apply_date_filter(&mut query, v);
                }
            }
            _ => content.push(format!("{key}:{}", unquote(raw_value))),
        }
    }

    let joined = content
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    query.content_terms = (!joined.is_empty()).then_some(joined);
    query
}

/// `date:<d>` sets the lower bound; `date:<a>..<b>` sets both bounds.
/// Nothing changes if either side fails to parse.
fn apply_date_filter(query: &mut SearchQuery, value: &str) {
    if let Some((start, end)) = value.split_once("..") {
        if let (Some(s), Some(e)) = (parse_period_start(start), parse_period_end(end)) {
            query.date_from = Some(s);
            query.date_to = Some(e);
        }
    } else if let Some(d) = parse_period_start(value) {
        query.date_from = Some(d);
    }
}

/// Strip one pair of surrounding double quotes.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(value)
}

/// Tokenize input on whitespace, keeping quoted runs together.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Parse `YYYY-MM-DD` or `YYYY/MM/DD`.
fn parse_naive_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

/// Split `YYYY-MM` or `YYYY` into year and optional month.
fn parse_partial(s: &str) -> Option<(i32, Option<u32>)> {
    let parts: Vec<&str> = s.split(['-', '/']).collect();
    match parts.as_slice() {
        [year] if year.len() == 4 => Some((year.parse().ok()?, None)),
        [year, month] if year.len() == 4 => {
            let month: u32 = month.parse().ok()?;
            (1..=12)
                .contains(&month)
                .then_some((year.parse().ok()?, Some(month)))
        }
        _ => None,
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59)?))
}

/// First instant of the given day, month or year.
fn parse_period_start(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(d) = parse_naive_date(s) {
        return Some(start_of_day(d));
    }
    let (year, month) = parse_partial(s)?;
    NaiveDate::from_ymd_opt(year, month.unwrap_or(1), 1).map(start_of_day)
}

/// Last second of the given day, month or year.
fn parse_period_end(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Some(d) = parse_naive_date(s) {
        return end_of_day(d);
    }
    let last_day = match parse_partial(s)? {
        (year, None) => NaiveDate::from_ymd_opt(year, 12, 31)?,
        (year, Some(12)) => NaiveDate::from_ymd_opt(year, 12, 31)?,
        (year, Some(month)) => NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()?,
    };
    end_of_day(last_day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_field_and_text_query() {
        let q = parse_query("from:alice@example.com subject:\"project update\" kafka");
        assert_eq!(q.from_address.as_deref(), Some("alice@example.com"));
        assert_eq!(q.subject.as_deref(), Some("project update"));
        assert!(q.content_terms.as_deref().unwrap().contains("kafka"));
    }

    #[test]
    fn test_invalid_date_dropped_not_reinserted() {
        let q = parse_query("after:not-a-date foo");
        assert_eq!(q.date_from, None);
        assert_eq!(q.content_terms.as_deref(), Some("foo"));
    }

    #[test]
    fn test_keywords_case_insensitive() {
        let q = parse_query("FROM:a@b.com To:c@d.com FOLDER:Sent Account:work");
        assert_eq!(q.from_address.as_deref(), Some("a@b.com"));
        assert_eq!(q.to_address.as_deref(), Some("c@d.com"));
        assert_eq!(q.folder.as_deref(), Some("Sent"));
        assert_eq!(q.account.as_deref(), Some("work"));
        assert_eq!(q.content_terms, None);
    }

    #[test]
    fn test_defaults() {
        let q = parse_query("");
        assert_eq!(q, SearchQuery::default());
        assert_eq!(q.skip, 0);
        assert_eq!(q.take, 100);
        assert_eq!(q.sort, SortOrder::DateDesc);
        assert!(!q.has_filters());
    }

    #[test]
    fn test_bare_date_sets_only_lower_bound() {
        let q = parse_query("date:2024-01-15");
        assert_eq!(q.date_from, Some(ymd(2024, 1, 15)));
        assert_eq!(q.date_to, None);
    }

    #[test]
    fn test_date_range() {
        let q = parse_query("date:2024-01..2024-06");
        assert_eq!(q.date_from, Some(ymd(2024, 1, 1)));
        assert_eq!(
            q.date_to,
            Some(Utc.with_ymd_and_hms(2024, 6, 30, 23, 59, 59).unwrap())
        );

        let q = parse_query("date:2023..2023");
        assert_eq!(
            q.date_to,
            Some(Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_bad_range_is_dropped() {
        let q = parse_query("date:2024-01-01..whenever invoice");
        assert_eq!(q.date_from, None);
        assert_eq!(q.date_to, None);
        assert_eq!(q.content_terms.as_deref(), Some("invoice"));
    }

    #[test]
    fn test_before_after() {
        let q = parse_query("after:2024/01/01 before:2024-06-01");
        assert_eq!(q.date_from, Some(ymd(2024, 1, 1)));
        assert_eq!(
            q.date_to,
            Some(Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn test_unknown_keys_are_text() {
        let q = parse_query("cc:x@y.com  \"exact phrase\"  tail");
        assert_eq!(q.content_terms.as_deref(), Some("cc:x@y.com exact phrase tail"));

        let q = parse_query("cc:\"x y\" tail");
        assert_eq!(q.content_terms.as_deref(), Some("cc:x y tail"));

        let q = parse_query("\"note: hello\"");
        assert_eq!(q.content_terms.as_deref(), Some("note: hello"));
    }

    #[test]
    fn test_empty_value_ignored() {
        let q = parse_query("from: hello");
        assert_eq!(q.from_address, None);
        assert_eq!(q.content_terms.as_deref(), Some("hello"));
    }

    #[test]
    fn test_wildcard_value_kept_verbatim() {
        let q = parse_query("from:*@example.com");
        assert_eq!(q.from_address.as_deref(), Some("*@example.com"));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "from:a@b.com date:2024-01..2024-02 \"x y\" z";
        assert_eq!(parse_query(input), parse_query(input));
    }

    #[test]
    fn test_page_and_sort_helpers() {
        let q = parse_query("kafka").page(20, 10).sorted(SortOrder::Relevance);
        assert_eq!((q.skip, q.take), (20, 10));
        assert_eq!(q.sort, SortOrder::Relevance);
        assert!(q.has_filters());
    }
}
