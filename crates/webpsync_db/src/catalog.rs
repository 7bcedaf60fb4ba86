//! Read-only catalog queries.

use crate::config::TableNames;
use crate::error::Result;
use serde::Serialize;
use sqlx::AnyConnection;
use sqlx::Row;
use tracing::debug;

/// Attachment count for one mime type, as shown by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct MimeCount {
    pub mime_type: String,
    pub attachments: i64,
}

/// Upload-relative paths of every attachment still in a legacy format,
/// ordered by path.
///
/// The path comes from the `_wp_attached_file` meta row; attachments
/// without one (broken imports) are skipped.
pub async fn list_legacy_attachments(
    conn: &mut AnyConnection,
    tables: &TableNames,
    mimes: &[&str],
) -> Result<Vec<String>> {
    let placeholders = vec!["?"; mimes.len()].join(", ");
    let sql = format!(
        "SELECT pm.meta_value FROM {posts} p \
         JOIN {postmeta} pm ON pm.post_id = p.ID AND pm.meta_key = '_wp_attached_file' \
         WHERE p.post_type = 'attachment' AND p.post_mime_type IN ({placeholders}) \
         ORDER BY pm.meta_value",
        posts = tables.posts,
        postmeta = tables.postmeta,
    );

    let mut query = sqlx::query(&sql);
    for mime in mimes {
        query = query.bind(*mime);
    }
    let rows = query.fetch_all(conn).await?;

    let mut files = Vec::with_capacity(rows.len());
    for row in &rows {
        files.push(row.try_get::<String, _>(0)?);
    }
    debug!(count = files.len(), "listed legacy attachments");
    Ok(files)
}

/// Attachment counts grouped by mime type, ordered by mime type.
pub async fn mime_counts(conn: &mut AnyConnection, tables: &TableNames) -> Result<Vec<MimeCount>> {
    let sql = format!(
        "SELECT post_mime_type, COUNT(*) FROM {posts} \
         WHERE post_type = 'attachment' \
         GROUP BY post_mime_type ORDER BY post_mime_type",
        posts = tables.posts,
    );

    let rows = sqlx::query(&sql).fetch_all(conn).await?;
    let mut counts = Vec::with_capacity(rows.len());
    for row in &rows {
        counts.push(MimeCount {
            mime_type: row.try_get::<String, _>(0)?,
            attachments: row.try_get::<i64, _>(1)?,
        });
    }
    Ok(counts)
}
