//! Behavioural tests for [`SearchIndex`] against an in-memory database.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use super::*;
use crate::error::MailsiftError;
use crate::model::document::EmailDocument;
use crate::search::query::{parse_query, SearchQuery, SortOrder};

fn index() -> SearchIndex {
    let index = SearchIndex::open_in_memory().unwrap();
    index.initialize().unwrap();
    index
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

fn doc(path: &str, from: &str, subject: &str, body: &str, day: u32) -> EmailDocument {
    let mut d = EmailDocument::new(path);
    d.message_id = format!("{path}@example.com");
    d.from_address = from.to_string();
    d.from_name = "Sender".to_string();
    d.to_addresses = vec!["bob@example.com".to_string(), "carol@example.com".to_string()];
    d.subject = subject.to_string();
    d.date_sent = Some(at(day));
    d.folder = "INBOX".to_string();
    d.account = "work".to_string();
    d.body_preview = body.chars().take(40).collect();
    d.body_text = Some(body.to_string());
    d.indexed_at = at(28);
    d.last_modified_ticks = 1_700_000_000_000_000_000;
    d
}

#[test]
fn test_initialize_is_idempotent() {
    let index = index();
    index.initialize().unwrap();
    index.initialize().unwrap();
    assert_eq!(index.email_count().unwrap(), 0);
    assert_eq!(
        index.get_metadata(store::META_SCHEMA_VERSION).unwrap().as_deref(),
        Some("1")
    );
}

#[test]
fn test_upsert_round_trip() {
    let index = index();
    let mut original = doc("/a/work/INBOX/1.eml", "alice@example.com", "Hello", "kafka body", 1);
    original.cc_addresses = vec!["dave@example.com".to_string()];
    original.attachment_names = vec!["report.pdf".to_string()];
    original.has_attachments = true;
    original.date_received = Some(at(2));

    let id = index.upsert(&original).unwrap();
    let stored = index
        .get_by_path(Path::new("/a/work/INBOX/1.eml"))
        .unwrap()
        .unwrap();

    original.id = Some(id);
    assert_eq!(stored, original);
}

#[test]
fn test_upsert_same_path_updates_in_place() {
    let index = index();
    let first = index
        .upsert(&doc("/a/1.eml", "a@x.com", "v1", "first body", 1))
        .unwrap();
    let second = index
        .upsert(&doc("/a/1.eml", "a@x.com", "v2", "second body", 1))
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(index.email_count().unwrap(), 1);
    let stored = index.get_by_path(Path::new("/a/1.eml")).unwrap().unwrap();
    assert_eq!(stored.subject, "v2");
}

#[test]
fn test_shadow_follows_updates() {
    let index = index();
    index
        .upsert(&doc("/a/1.eml", "a@x.com", "s", "the xylophone sings", 1))
        .unwrap();
    assert_eq!(index.total_count(&parse_query("xylophone")).unwrap(), 1);

    index
        .upsert(&doc("/a/1.eml", "a@x.com", "s", "the trumpet sings", 1))
        .unwrap();
    assert_eq!(index.total_count(&parse_query("xylophone")).unwrap(), 0);
    assert_eq!(index.total_count(&parse_query("trumpet")).unwrap(), 1);
    assert_shadow_consistent(&index);
}

#[test]
fn test_shadow_follows_deletes() {
    let index = index();
    index
        .batch_upsert(&[
            doc("/a/1.eml", "a@x.com", "s", "the xylophone sings", 1),
            doc("/a/2.eml", "a@x.com", "s", "the xylophone hums", 2),
        ])
        .unwrap();

    index
        .with_conn(|conn| {
            conn.execute("DELETE FROM emails WHERE file_path = ?1", ["/a/1.eml"])?;
            Ok(())
        })
        .unwrap();

    let hits = index.query(&parse_query("xylophone")).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document.file_path, PathBuf::from("/a/2.eml"));
    assert_eq!(index.total_count(&parse_query("sings")).unwrap(), 0);
    assert_shadow_consistent(&index);
}

/// FTS5 verifies the shadow against the content table.
fn assert_shadow_consistent(index: &SearchIndex) {
    index
        .with_conn(|conn| {
            conn.execute("INSERT INTO emails_fts(emails_fts) VALUES('integrity-check')", [])?;
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_duplicate_message_ids_are_separate_rows() {
    let index = index();
    let mut sent = doc("/a/work/Sent/1.eml", "a@x.com", "same", "body", 1);
    let mut trash = doc("/a/work/Trash/1.eml", "a@x.com", "same", "body", 1);
    sent.message_id = "dup@example.com".to_string();
    trash.message_id = "dup@example.com".to_string();

    index.batch_upsert(&[sent, trash]).unwrap();
    assert_eq!(index.email_count().unwrap(), 2);
}

#[test]
fn test_total_count_ignores_take() {
    let index = index();
    let docs: Vec<EmailDocument> = (0..150)
        .map(|i| {
            doc(
                &format!("/a/{i}.eml"),
                "alice@example.com",
                "status",
                "weekly kafka report",
                1 + (i % 28) as u32,
            )
        })
        .collect();
    index.batch_upsert(&docs).unwrap();

    let q = parse_query("from:alice@example.com kafka").page(0, 100);
    assert_eq!(index.total_count(&q).unwrap(), 150);
    assert_eq!(index.query(&q).unwrap().len(), 100);

    let last = q.page(140, 100);
    assert_eq!(index.query(&last).unwrap().len(), 10);
    assert_eq!(index.total_count(&last).unwrap(), 150);
}

#[test]
fn test_structured_filters() {
    let index = index();
    let mut sent = doc("/a/work/Sent/2.eml", "me@corp.com", "Budget", "numbers", 10);
    sent.folder = "Sent".to_string();
    sent.to_addresses = vec!["cfo@corp.com".to_string()];
    index
        .batch_upsert(&[
            doc("/a/work/INBOX/1.eml", "alice@example.com", "Hello", "hi", 5),
            sent,
            doc("/a/home/INBOX/3.eml", "bob@other.org", "Party", "cake", 20),
        ])
        .unwrap();

    let count = |q: &str| index.total_count(&parse_query(q)).unwrap();
    assert_eq!(count("from:ALICE@example.com"), 1);
    assert_eq!(count("from:*@example.com"), 1);
    assert_eq!(count("from:*.com"), 2);
    assert_eq!(count("to:cfo@corp.com"), 1);
    assert_eq!(count("to:*@corp.com"), 1);
    assert_eq!(count("to:corp.com"), 0);
    assert_eq!(count("folder:sent"), 1);
    assert_eq!(count("subject:budget"), 1);
    assert_eq!(count("subject:Bud*"), 1);
    assert_eq!(count("account:work"), 2);
    assert_eq!(count("after:2024-03-06"), 2);
    assert_eq!(count("before:2024-03-15"), 2);
    assert_eq!(count("date:2024-03-06..2024-03-15"), 1);
}

#[test]
fn test_sort_orders() {
    let index = index();
    index
        .batch_upsert(&[
            doc("/a/1.eml", "a@x.com", "old", "kafka", 1),
            doc("/a/2.eml", "a@x.com", "mid", "kafka kafka kafka kafka", 2),
            doc("/a/3.eml", "a@x.com", "new", "kafka and other words here", 3),
        ])
        .unwrap();

    let subjects = |q: SearchQuery| -> Vec<String> {
        index
            .query(&q)
            .unwrap()
            .into_iter()
            .map(|h| h.document.subject)
            .collect()
    };

    assert_eq!(subjects(SearchQuery::default()), vec!["new", "mid", "old"]);
    assert_eq!(
        subjects(SearchQuery::default().sorted(SortOrder::DateAsc)),
        vec!["old", "mid", "new"]
    );

    let ranked = index
        .query(&parse_query("kafka").sorted(SortOrder::Relevance))
        .unwrap();
    assert_eq!(ranked[0].document.subject, "mid");
    assert!(ranked.iter().all(|h| h.score.is_some()));
}

#[test]
fn test_injection_is_literal() {
    let index = index();
    index
        .upsert(&doc("/a/1.eml", "a@x.com", "s", "alpha beta", 1))
        .unwrap();

    // Would be a boolean query if passed through unescaped
    for input in ["alpha OR gamma", "alpha) OR (gamma", "subject:alpha", "\"alpha", "NEAR(alpha beta)"] {
        let q = SearchQuery {
            content_terms: Some(input.to_string()),
            ..Default::default()
        };
        assert!(index.total_count(&q).is_ok(), "query {input:?} must not error");
    }

    let q = SearchQuery {
        content_terms: Some("alpha OR gamma".to_string()),
        ..Default::default()
    };
    assert_eq!(index.total_count(&q).unwrap(), 0);

    let prefix = SearchQuery {
        content_terms: Some("alp*".to_string()),
        ..Default::default()
    };
    assert_eq!(index.total_count(&prefix).unwrap(), 1);
}

#[test]
fn test_control_characters_in_terms_do_not_error() {
    let index = index();
    index
        .upsert(&doc("/a/1.eml", "a@x.com", "s", "alpha beta", 1))
        .unwrap();

    for input in ["\0x", "\0alpha", "al\0pha", "\0"] {
        let q = SearchQuery {
            content_terms: Some(input.to_string()),
            ..Default::default()
        };
        assert!(index.query(&q).is_ok(), "query {input:?} must not error");
        assert!(index.total_count(&q).is_ok(), "count {input:?} must not error");
    }

    let q = parse_query("\0alpha");
    assert_eq!(index.total_count(&q).unwrap(), 1);
}

#[test]
fn test_before_excludes_midnight_of_that_day() {
    let index = index();
    let mut d = doc("/a/1.eml", "a@x.com", "s", "b", 1);
    d.date_sent = Some(Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap());
    index.upsert(&d).unwrap();

    assert_eq!(index.total_count(&parse_query("before:2024-03-15")).unwrap(), 0);
    assert_eq!(index.total_count(&parse_query("before:2024-03-16")).unwrap(), 1);
    assert_eq!(index.total_count(&parse_query("after:2024-03-15")).unwrap(), 1);
}

#[test]
fn test_failed_batch_rolls_back() {
    let index = index();
    index
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TEMP TRIGGER reject_bad BEFORE INSERT ON emails
                 WHEN new.file_path LIKE '%bad%'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )?;
            Ok(())
        })
        .unwrap();

    let batch = vec![
        doc("/a/1.eml", "a@x.com", "one", "body", 1),
        doc("/a/bad.eml", "a@x.com", "two", "body", 1),
        doc("/a/3.eml", "a@x.com", "three", "body", 1),
    ];
    assert!(index.batch_upsert(&batch).is_err());
    assert_eq!(index.email_count().unwrap(), 0);
    assert_eq!(index.total_count(&parse_query("body")).unwrap(), 0);
}

#[test]
fn test_known_files_snapshot() {
    let index = index();
    let mut d = doc("/a/1.eml", "a@x.com", "s", "b", 1);
    d.last_modified_ticks = 42;
    index.upsert(&d).unwrap();

    let known = index.known_files().unwrap();
    assert_eq!(known.len(), 1);
    assert_eq!(known.get(&PathBuf::from("/a/1.eml")), Some(&42));
}

#[test]
fn test_metadata_round_trip() {
    let index = index();
    assert_eq!(index.get_metadata("last_indexed_at").unwrap(), None);
    index.set_metadata("last_indexed_at", "a").unwrap();
    index.set_metadata("last_indexed_at", "b").unwrap();
    assert_eq!(
        index.get_metadata("last_indexed_at").unwrap().as_deref(),
        Some("b")
    );
}

#[test]
fn test_rebuild_clears_everything() {
    let index = index();
    index.upsert(&doc("/a/1.eml", "a@x.com", "s", "kafka", 1)).unwrap();
    index.set_metadata("last_indexed_at", "x").unwrap();

    index.rebuild().unwrap();
    assert_eq!(index.email_count().unwrap(), 0);
    assert_eq!(index.total_count(&parse_query("kafka")).unwrap(), 0);
    assert_eq!(index.get_metadata("last_indexed_at").unwrap(), None);
    assert!(index.is_healthy());
}

#[test]
fn test_health_and_diagnostics() {
    let index = index();
    assert!(index.is_healthy());
    assert!(index.database_size().unwrap() > 0);
    index.upsert(&doc("/a/1.eml", "a@x.com", "s", "kafka", 1)).unwrap();
    index.optimize().unwrap();
    assert_eq!(index.email_count().unwrap(), 1);
}

#[test]
fn test_uninitialized_index_is_unhealthy() {
    let index = SearchIndex::open_in_memory().unwrap();
    assert!(!index.is_healthy());
}

#[test]
fn test_close_is_idempotent() {
    let index = index();
    index.close();
    index.close();
    assert!(!index.is_healthy());
    assert!(matches!(index.email_count(), Err(MailsiftError::Closed)));
}

#[test]
fn test_file_backed_reader_sees_committed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("index.db");
    let writer = SearchIndex::open(&path, &IndexOptions::default()).unwrap();
    writer.initialize().unwrap();
    writer.upsert(&doc("/a/1.eml", "a@x.com", "s", "kafka", 1)).unwrap();

    let reader = SearchIndex::open_read_only(&path, &IndexOptions::default()).unwrap();
    assert_eq!(reader.email_count().unwrap(), 1);
    assert_eq!(reader.total_count(&parse_query("kafka")).unwrap(), 1);
    assert!(reader.set_metadata("k", "v").is_err());
}
