//! One synchronization session: the worker-owned connection plus the
//! replacement state accumulated across it.

use sqlx::AnyConnection;
use sqlx::{Connection, Row};
use tracing::{debug, info, warn};
use webpsync_codec::{decode, encode, Value};
use webpsync_db::TableNames;
use webpsync_protocol::defaults::WEBP_MIME;
use webpsync_protocol::{paths, Reply, Request};

use crate::error::WorkerError;
use crate::metadata;
use crate::replacer::{self, ReplacementMap};

/// Per-item stylesheet cache rows dropped by `FLUSH-CACHE`.
const CSS_META_KEY: &str = "_elementor_css";

/// Site-wide cache rows dropped by `FLUSH-CACHE`.
const GLOBAL_CACHE_OPTIONS: &[&str] = &["_elementor_global_css", "_elementor_assets_data"];

/// Session state behind the worker loop.
///
/// Owns the one connection of the run. Each request is handled to
/// completion before the next; mutating requests run inside their own
/// transaction, so a failed one leaves the store as it was.
pub struct Session {
    conn: AnyConnection,
    tables: TableNames,
    batch_size: usize,
    replacements: ReplacementMap,
}

impl Session {
    pub fn new(conn: AnyConnection, tables: TableNames, batch_size: usize) -> Self {
        Self {
            conn,
            tables,
            batch_size,
            replacements: ReplacementMap::new(),
        }
    }

    /// Serve one request. Errors are reported to the caller and leave the
    /// session usable for the next request.
    pub async fn handle(&mut self, request: Request) -> Result<Reply, WorkerError> {
        debug!(command = request.verb(), "handling request");
        match request {
            Request::Info { file } => self.handle_info(file).await,
            Request::Update {
                old_file,
                new_file,
                width,
                height,
            } => self.handle_update(old_file, new_file, width, height).await,
            Request::FlushReplace => self.handle_flush_replace().await,
            Request::FlushCache => self.handle_flush_cache().await,
        }
    }

    /// Replacement pairs recorded but not yet flushed.
    pub fn pending_replacements(&self) -> usize {
        self.replacements.len()
    }

    pub async fn close(self) -> sqlx::Result<()> {
        self.conn.close().await
    }

    async fn handle_info(&mut self, file: String) -> Result<Reply, WorkerError> {
        let Some(post_id) = self.find_attachment(&file).await? else {
            return Ok(Reply::Thumbs { files: Vec::new() });
        };
        let files = match self.fetch_metadata(post_id).await? {
            Some(raw) => match decode_metadata(post_id, &raw) {
                Ok(meta) => metadata::variant_files(&meta),
                Err(error) => {
                    warn!(%error, "treating metadata as absent");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        Ok(Reply::Thumbs { files })
    }

    async fn handle_update(
        &mut self,
        old_file: String,
        new_file: String,
        width: u32,
        height: u32,
    ) -> Result<Reply, WorkerError> {
        let post_id = self.find_attachment(&old_file).await?.ok_or_else(|| {
            WorkerError::NotFound {
                file: old_file.clone(),
            }
        })?;

        let old_name = paths::basename(&old_file).to_string();
        let new_name = paths::basename(&new_file).to_string();

        let mut tx = self.conn.begin().await?;

        let sql = format!(
            "UPDATE {postmeta} SET meta_value = ? \
             WHERE post_id = ? AND meta_key = '_wp_attached_file'",
            postmeta = self.tables.postmeta,
        );
        sqlx::query(&sql)
            .bind(&new_file)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        // The guid is a full URL; only its basename changes.
        let sql = format!(
            "UPDATE {posts} SET guid = REPLACE(guid, ?, ?), post_mime_type = ? WHERE ID = ?",
            posts = self.tables.posts,
        );
        sqlx::query(&sql)
            .bind(&old_name)
            .bind(&new_name)
            .bind(WEBP_MIME)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        let mut renamed: Vec<(String, String)> = Vec::new();
        let sql = format!(
            "SELECT meta_value FROM {postmeta} \
             WHERE post_id = ? AND meta_key = '_wp_attachment_metadata' LIMIT 1",
            postmeta = self.tables.postmeta,
        );
        let raw: Option<String> = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.try_get(0))
            .transpose()?;
        if let Some(raw) = raw {
            match decode_metadata(post_id, &raw) {
                Ok(mut meta) => {
                    renamed = metadata::apply_conversion(&mut meta, &new_file, width, height);
                    let sql = format!(
                        "UPDATE {postmeta} SET meta_value = ? \
                         WHERE post_id = ? AND meta_key = '_wp_attachment_metadata'",
                        postmeta = self.tables.postmeta,
                    );
                    sqlx::query(&sql)
                        .bind(encode(&meta))
                        .bind(post_id)
                        .execute(&mut *tx)
                        .await?;
                }
                Err(error) => {
                    warn!(%error, "metadata left untouched");
                }
            }
        }

        tx.commit().await?;

        if old_file != new_file {
            self.replacements.insert(old_file.clone(), new_file.clone())?;
        }
        for (old, new) in renamed {
            self.replacements
                .insert(paths::sibling(&old_file, &old), paths::sibling(&old_file, &new))?;
        }

        debug!(post_id, file = %new_file, "attachment repointed");
        Ok(Reply::Updated { post_id })
    }

    async fn handle_flush_replace(&mut self) -> Result<Reply, WorkerError> {
        let pairs = self.replacements.len();
        let (content_rows, document_rows) = replacer::flush(
            &mut self.conn,
            &self.tables,
            &self.replacements,
            self.batch_size,
        )
        .await?;
        self.replacements.clear();
        info!(pairs, content_rows, document_rows, "replacements applied");
        Ok(Reply::Replaced {
            content_rows,
            document_rows,
        })
    }

    async fn handle_flush_cache(&mut self) -> Result<Reply, WorkerError> {
        let sql = format!(
            "DELETE FROM {postmeta} WHERE meta_key = ?",
            postmeta = self.tables.postmeta,
        );
        let mut cleared = sqlx::query(&sql)
            .bind(CSS_META_KEY)
            .execute(&mut self.conn)
            .await?
            .rows_affected();

        let placeholders = vec!["?"; GLOBAL_CACHE_OPTIONS.len()].join(", ");
        let sql = format!(
            "DELETE FROM {options} WHERE option_name IN ({placeholders})",
            options = self.tables.options,
        );
        let mut query = sqlx::query(&sql);
        for name in GLOBAL_CACHE_OPTIONS {
            query = query.bind(*name);
        }
        cleared += query.execute(&mut self.conn).await?.rows_affected();

        info!(cleared, "cached artifacts dropped");
        Ok(Reply::Flushed { cleared })
    }

    /// Attachment id registered for an upload-relative path, if any.
    async fn find_attachment(&mut self, file: &str) -> Result<Option<i64>, WorkerError> {
        let sql = format!(
            "SELECT post_id FROM {postmeta} \
             WHERE meta_key = '_wp_attached_file' AND meta_value = ? LIMIT 1",
            postmeta = self.tables.postmeta,
        );
        let row = sqlx::query(&sql)
            .bind(file)
            .fetch_optional(&mut self.conn)
            .await?;
        Ok(row.map(|row| row.try_get(0)).transpose()?)
    }

    async fn fetch_metadata(&mut self, post_id: i64) -> Result<Option<String>, WorkerError> {
        let sql = format!(
            "SELECT meta_value FROM {postmeta} \
             WHERE post_id = ? AND meta_key = '_wp_attachment_metadata' LIMIT 1",
            postmeta = self.tables.postmeta,
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&mut self.conn)
            .await?;
        Ok(row.map(|row| row.try_get(0)).transpose()?)
    }
}

fn decode_metadata(post_id: i64, raw: &str) -> Result<Value, WorkerError> {
    decode(raw).map_err(|source| WorkerError::MalformedMetadata { post_id, source })
}
