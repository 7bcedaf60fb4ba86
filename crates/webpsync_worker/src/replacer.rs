//! Replacement collation and batched column rewrites.
//!
//! Every repointed attachment contributes its old→new relative paths to a
//! [`ReplacementMap`]. At flush time the map is applied to the two text
//! columns that embed such paths as plain substrings: post content bodies
//! and page-builder documents (`_elementor_data` rows). Pairs are folded
//! into chained `REPLACE()` calls, a fixed number per statement. The chain
//! is order-independent only because keys are full relative paths and no
//! key is a substring of another; the map enforces the key side of that at
//! insertion.

use sqlx::AnyConnection;
use sqlx::Connection;
use std::collections::BTreeMap;
use tracing::debug;
use webpsync_db::TableNames;

use crate::error::WorkerError;

// ============================================================================
// Replacement Map
// ============================================================================

/// Old→new path pairs accumulated across one session, keyed by old path.
#[derive(Debug, Default)]
pub struct ReplacementMap {
    pairs: BTreeMap<String, String>,
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Record one rewrite. Re-recording the identical pair is a no-op;
    /// a second target for a known key is rejected.
    pub fn insert(&mut self, old: String, new: String) -> Result<(), WorkerError> {
        match self.pairs.get(&old) {
            Some(existing) if *existing == new => Ok(()),
            Some(existing) => Err(WorkerError::ConflictingReplacement {
                existing: existing.clone(),
                candidate: new,
                key: old,
            }),
            None => {
                self.pairs.insert(old, new);
                Ok(())
            }
        }
    }

    /// Pairs in key order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.pairs
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
            .collect()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

// ============================================================================
// Batch Flusher
// ============================================================================

/// Apply the whole map to both columns in groups of `batch_size` pairs.
///
/// Runs inside one transaction; the map itself is left untouched so a
/// failed flush can be retried. Returns affected row counts for the
/// content column and the document column.
pub async fn flush(
    conn: &mut AnyConnection,
    tables: &TableNames,
    map: &ReplacementMap,
    batch_size: usize,
) -> Result<(u64, u64), WorkerError> {
    if map.is_empty() {
        return Ok((0, 0));
    }
    let pairs = map.pairs();
    let size = batch_size.max(1);

    let mut content_rows = 0u64;
    let mut document_rows = 0u64;
    let mut tx = conn.begin().await?;
    for chunk in pairs.chunks(size) {
        content_rows += apply_content(&mut tx, &tables.posts, chunk).await?;
        document_rows += apply_documents(&mut tx, &tables.postmeta, chunk).await?;
    }
    tx.commit().await?;

    debug!(pairs = pairs.len(), content_rows, document_rows, "replacement map flushed");
    Ok((content_rows, document_rows))
}

/// One grouped statement against `post_content`.
async fn apply_content(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    table: &str,
    pairs: &[(&str, &str)],
) -> Result<u64, sqlx::Error> {
    let sql = content_statement(table, pairs.len());
    let mut query = sqlx::query(&sql);
    for (old, new) in pairs {
        query = query.bind(*old).bind(*new);
    }
    for (old, _) in pairs {
        query = query.bind(like_pattern(old));
    }
    Ok(query.execute(&mut **tx).await?.rows_affected())
}

/// One grouped statement against page-builder document rows. Paths are
/// stored there both literally and with JSON-escaped slashes, so each
/// pair is applied in both spellings.
async fn apply_documents(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    table: &str,
    pairs: &[(&str, &str)],
) -> Result<u64, sqlx::Error> {
    let sql = document_statement(table, pairs.len());
    let mut query = sqlx::query(&sql);
    for (old, new) in pairs {
        query = query
            .bind(*old)
            .bind(*new)
            .bind(escape_slashes(old))
            .bind(escape_slashes(new));
    }
    for (old, _) in pairs {
        query = query.bind(like_pattern(old));
        query = query.bind(like_pattern(&escape_slashes(old)));
    }
    Ok(query.execute(&mut **tx).await?.rows_affected())
}

fn content_statement(table: &str, pair_count: usize) -> String {
    let mut expr = "post_content".to_string();
    for _ in 0..pair_count {
        expr = format!("REPLACE({expr}, ?, ?)");
    }
    let guards = vec!["post_content LIKE ? ESCAPE '|'"; pair_count].join(" OR ");
    format!("UPDATE {table} SET post_content = {expr} WHERE {guards}")
}

fn document_statement(table: &str, pair_count: usize) -> String {
    let mut expr = "meta_value".to_string();
    for _ in 0..pair_count * 2 {
        expr = format!("REPLACE({expr}, ?, ?)");
    }
    let guards = vec!["meta_value LIKE ? ESCAPE '|'"; pair_count * 2].join(" OR ");
    format!(
        "UPDATE {table} SET meta_value = {expr} \
         WHERE meta_key = '_elementor_data' AND ({guards})"
    )
}

fn escape_slashes(path: &str) -> String {
    path.replace('/', "\\/")
}

/// `%needle%` with LIKE wildcards and the escape character neutralized.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '|') {
            pattern.push('|');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;
    use webpsync_db::connect;

    #[test]
    fn test_insert_merges_identical_pairs() {
        let mut map = ReplacementMap::new();
        map.insert("a/x.jpg".into(), "a/x.webp".into()).unwrap();
        map.insert("a/x.jpg".into(), "a/x.webp".into()).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_rejects_conflicting_target() {
        let mut map = ReplacementMap::new();
        map.insert("a/x.jpg".into(), "a/x.webp".into()).unwrap();
        let err = map.insert("a/x.jpg".into(), "a/y.webp".into()).unwrap_err();
        match err {
            WorkerError::ConflictingReplacement { key, existing, candidate } => {
                assert_eq!(key, "a/x.jpg");
                assert_eq!(existing, "a/x.webp");
                assert_eq!(candidate, "a/y.webp");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(map.pairs(), vec![("a/x.jpg", "a/x.webp")]);
    }

    #[test]
    fn test_pairs_come_out_in_key_order() {
        let mut map = ReplacementMap::new();
        map.insert("b.jpg".into(), "b.webp".into()).unwrap();
        map.insert("a.jpg".into(), "a.webp".into()).unwrap();
        assert_eq!(map.pairs(), vec![("a.jpg", "a.webp"), ("b.jpg", "b.webp")]);
    }

    #[test]
    fn test_content_statement_chains_one_replace_per_pair() {
        let sql = content_statement("wp_posts", 2);
        assert_eq!(
            sql,
            "UPDATE wp_posts SET post_content = \
             REPLACE(REPLACE(post_content, ?, ?), ?, ?) \
             WHERE post_content LIKE ? ESCAPE '|' OR post_content LIKE ? ESCAPE '|'"
        );
    }

    #[test]
    fn test_document_statement_applies_each_pair_twice() {
        let sql = document_statement("wp_postmeta", 1);
        assert_eq!(sql.matches("REPLACE(").count(), 2);
        assert_eq!(sql.matches("LIKE ?").count(), 2);
        assert!(sql.contains("meta_key = '_elementor_data'"));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a_b%c|d"), "%a|_b|%c||d%");
        assert_eq!(like_pattern("plain.jpg"), "%plain.jpg%");
    }

    async fn fixture() -> AnyConnection {
        let mut conn = connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE wp_posts (\
                ID INTEGER PRIMARY KEY, \
                post_content TEXT NOT NULL DEFAULT '')",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE wp_postmeta (\
                meta_id INTEGER PRIMARY KEY, \
                post_id INTEGER NOT NULL, \
                meta_key TEXT NOT NULL, \
                meta_value TEXT)",
        )
        .execute(&mut conn)
        .await
        .unwrap();
        conn
    }

    async fn seed_post(conn: &mut AnyConnection, id: i64, content: &str) {
        sqlx::query("INSERT INTO wp_posts (ID, post_content) VALUES (?, ?)")
            .bind(id)
            .bind(content)
            .execute(conn)
            .await
            .unwrap();
    }

    async fn seed_meta(conn: &mut AnyConnection, post_id: i64, key: &str, value: &str) {
        sqlx::query("INSERT INTO wp_postmeta (post_id, meta_key, meta_value) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(key)
            .bind(value)
            .execute(conn)
            .await
            .unwrap();
    }

    async fn post_content(conn: &mut AnyConnection, id: i64) -> String {
        sqlx::query("SELECT post_content FROM wp_posts WHERE ID = ?")
            .bind(id)
            .fetch_one(conn)
            .await
            .unwrap()
            .try_get(0)
            .unwrap()
    }

    async fn meta_value(conn: &mut AnyConnection, post_id: i64, key: &str) -> String {
        sqlx::query("SELECT meta_value FROM wp_postmeta WHERE post_id = ? AND meta_key = ?")
            .bind(post_id)
            .bind(key)
            .fetch_one(conn)
            .await
            .unwrap()
            .try_get(0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_flush_rewrites_both_columns() {
        let mut conn = fixture().await;
        seed_post(&mut conn, 1, "<img src=\"/uploads/2024/03/cat_1.jpg\">").await;
        seed_post(&mut conn, 2, "no images here").await;
        seed_meta(&mut conn, 1, "_elementor_data", "{\"url\":\"2024\\/03\\/cat_1.jpg\"}").await;
        seed_meta(&mut conn, 1, "_elementor_css", "2024/03/cat_1.jpg").await;

        let mut map = ReplacementMap::new();
        map.insert("2024/03/cat_1.jpg".into(), "2024/03/cat_1.webp".into())
            .unwrap();

        let tables = TableNames::with_prefix("wp_");
        let (content_rows, document_rows) = flush(&mut conn, &tables, &map, 50).await.unwrap();
        assert_eq!((content_rows, document_rows), (1, 1));

        assert_eq!(
            post_content(&mut conn, 1).await,
            "<img src=\"/uploads/2024/03/cat_1.webp\">"
        );
        assert_eq!(
            meta_value(&mut conn, 1, "_elementor_data").await,
            "{\"url\":\"2024\\/03\\/cat_1.webp\"}"
        );
        // Rows under other meta keys are not the flusher's to touch.
        assert_eq!(meta_value(&mut conn, 1, "_elementor_css").await, "2024/03/cat_1.jpg");
    }

    #[tokio::test]
    async fn test_flush_groups_pairs_into_batches_of_fifty() {
        let mut conn = fixture().await;
        let pairs: Vec<(String, String)> = (0..120)
            .map(|i| (format!("2024/03/img-{i}.jpg"), format!("2024/03/img-{i}.webp")))
            .collect();

        // One row referencing every path: each grouped statement matches it
        // once, so the affected count equals the statement count.
        let all_paths: Vec<&str> = pairs.iter().map(|(old, _)| old.as_str()).collect();
        seed_post(&mut conn, 1, &all_paths.join(" ")).await;
        let escaped: Vec<String> = all_paths.iter().map(|old| escape_slashes(old)).collect();
        seed_meta(&mut conn, 1, "_elementor_data", &escaped.join(" ")).await;

        let mut map = ReplacementMap::new();
        for (old, new) in pairs {
            map.insert(old, new).unwrap();
        }

        let tables = TableNames::with_prefix("wp_");
        let (content_rows, document_rows) = flush(&mut conn, &tables, &map, 50).await.unwrap();
        assert_eq!((content_rows, document_rows), (3, 3));

        assert!(!post_content(&mut conn, 1).await.contains(".jpg"));
        assert!(!meta_value(&mut conn, 1, "_elementor_data").await.contains(".jpg"));
    }

    #[tokio::test]
    async fn test_flush_batched_matches_one_pair_at_a_time() {
        let seed = "a 2024/03/one.jpg b 2024/03/two.jpg c 2024/03/three.jpg d";
        let mut batched = fixture().await;
        let mut sequential = fixture().await;
        seed_post(&mut batched, 1, seed).await;
        seed_post(&mut sequential, 1, seed).await;

        let mut map = ReplacementMap::new();
        for name in ["one", "two", "three", "four"] {
            map.insert(format!("2024/03/{name}.jpg"), format!("2024/03/{name}.webp"))
                .unwrap();
        }

        let tables = TableNames::with_prefix("wp_");
        flush(&mut batched, &tables, &map, 3).await.unwrap();
        flush(&mut sequential, &tables, &map, 1).await.unwrap();

        let expected = "a 2024/03/one.webp b 2024/03/two.webp c 2024/03/three.webp d";
        assert_eq!(post_content(&mut batched, 1).await, expected);
        assert_eq!(post_content(&mut sequential, 1).await, expected);
    }

    #[tokio::test]
    async fn test_flush_of_empty_map_issues_no_statements() {
        // No tables created: any statement would fail loudly.
        let mut conn = connect("sqlite::memory:").await.unwrap();
        let tables = TableNames::with_prefix("wp_");
        let map = ReplacementMap::new();
        assert_eq!(flush(&mut conn, &tables, &map, 50).await.unwrap(), (0, 0));
    }
}
