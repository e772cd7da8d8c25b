//! Compiles a [`SearchQuery`] into SQL over the `emails` table.
//!
//! The page query and the count query share one predicate set so the total
//! never depends on `skip`/`take`.

use rusqlite::types::Value;

use crate::index::fts::prepare_fts5_match_query;
use crate::search::query::{SearchQuery, SortOrder};

/// Columns selected for a full document, in [`crate::index::store`] row order.
pub const DOCUMENT_COLUMNS: &str = "e.id, e.message_id, e.file_path, e.from_address, e.from_name, \
     e.to_addresses, e.cc_addresses, e.bcc_addresses, e.subject, e.date_sent, e.date_received, \
     e.folder, e.account, e.has_attachments, e.attachment_names, e.body_preview, e.body_text, \
     e.indexed_at, e.last_modified_ticks";

/// Predicates and bound values shared by page and count queries.
#[derive(Debug, Default)]
pub struct CompiledFilter {
    /// `WHERE` conditions joined with `AND`.
    pub conditions: Vec<String>,
    /// Positional parameters in condition order.
    pub params: Vec<Value>,
    /// Whether the FTS shadow must be joined.
    pub uses_fts: bool,
}

impl CompiledFilter {
    /// Build the predicate set for `query`.
    pub fn new(query: &SearchQuery) -> Self {
        let mut filter = Self::default();

        if let Some(ref from) = query.from_address {
            filter.text_predicate("e.from_address", from);
        }
        if let Some(ref to) = query.to_address {
            // Recipients are stored as a JSON array; match one whole element
            filter.push(
                "e.to_addresses LIKE ?".to_string(),
                Value::Text(format!("%\"{}\"%", to.replace('*', "%"))),
            );
        }
        if let Some(ref subject) = query.subject {
            filter.text_predicate("e.subject", subject);
        }
        if let Some(ref account) = query.account {
            filter.text_predicate("e.account", account);
        }
        if let Some(ref folder) = query.folder {
            filter.text_predicate("e.folder", folder);
        }
        if let Some(from) = query.date_from {
            filter.push("e.date_sent >= ?".to_string(), Value::Integer(from.timestamp()));
        }
        if let Some(to) = query.date_to {
            filter.push("e.date_sent <= ?".to_string(), Value::Integer(to.timestamp()));
        }
        if let Some(fts) = prepare_fts5_match_query(query.content_terms.as_deref()) {
            filter.push("emails_fts MATCH ?".to_string(), Value::Text(fts));
            filter.uses_fts = true;
        }

        filter
    }

    fn push(&mut self, condition: String, value: Value) {
        self.conditions.push(condition);
        self.params.push(value);
    }

    /// Exact match, or `LIKE` when the value contains `*`.
    ///
    /// Columns are declared `COLLATE NOCASE`, so both forms ignore ASCII case.
    fn text_predicate(&mut self, column: &str, value: &str) {
        if value.contains('*') {
            self.push(
                format!("{column} LIKE ?"),
                Value::Text(value.replace('*', "%")),
            );
        } else {
            self.push(format!("{column} = ?"), Value::Text(value.to_string()));
        }
    }

    /// `FROM` clause including the shadow join when needed.
    fn from_clause(&self) -> &'static str {
        if self.uses_fts {
            "FROM emails e JOIN emails_fts ON emails_fts.rowid = e.id"
        } else {
            "FROM emails e"
        }
    }

    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}

/// SQL and parameters for one compiled statement.
#[derive(Debug)]
pub struct CompiledSql {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Page query: documents plus a relevance score (`NULL` without FTS).
pub fn compile_page(query: &SearchQuery) -> CompiledSql {
    let filter = CompiledFilter::new(query);
    let score = if filter.uses_fts {
        "bm25(emails_fts)"
    } else {
        "NULL"
    };
    let order = match (query.sort, filter.uses_fts) {
        (SortOrder::Relevance, true) => "ORDER BY bm25(emails_fts), e.date_sent DESC, e.id DESC",
        (SortOrder::DateAsc, _) => "ORDER BY e.date_sent ASC, e.id ASC",
        _ => "ORDER BY e.date_sent DESC, e.id DESC",
    };

    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS}, {score} {}{} {order} LIMIT ? OFFSET ?",
        filter.from_clause(),
        filter.where_clause(),
    );
    let mut params = filter.params;
    params.push(Value::Integer(clamp_i64(query.take)));
    params.push(Value::Integer(clamp_i64(query.skip)));
    CompiledSql { sql, params }
}

/// Count query: same predicates, no ordering or pagination.
pub fn compile_count(query: &SearchQuery) -> CompiledSql {
    let filter = CompiledFilter::new(query);
    let sql = format!(
        "SELECT COUNT(*) {}{}",
        filter.from_clause(),
        filter.where_clause()
    );
    CompiledSql {
        sql,
        params: filter.params,
    }
}

fn clamp_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
