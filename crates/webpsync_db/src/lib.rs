//! Catalog database access for webpsync.
//!
//! Resolves connection settings from a site's `wp-config.php`, opens
//! the one connection a sync run holds, and answers the read-only
//! catalog queries: the item listing behind `convert` and the counts
//! behind `status`. The rewrite traffic (attachment repointing, batch
//! URL replacement) lives in `webpsync_worker`; this crate carries no
//! SQL that mutates rows.

pub mod catalog;
pub mod config;
pub mod connect;
pub mod error;

pub use catalog::{list_legacy_attachments, mime_counts, MimeCount};
pub use config::{Credentials, TableNames};
pub use connect::connect;
pub use error::{DbError, Result};
