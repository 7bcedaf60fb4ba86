//! Connection handling for the catalog database.

use crate::error::Result;
use sqlx::AnyConnection;
use sqlx::Connection;
use std::sync::Once;
use tracing::debug;

/// Open a single catalog connection.
///
/// `mysql://` URLs reach the live catalog; tests pass
/// `sqlite::memory:`. A conversion run opens exactly one of these and
/// keeps it for the whole run.
pub async fn connect(url: &str) -> Result<AnyConnection> {
    install_drivers();
    let conn = AnyConnection::connect(url).await?;
    debug!(backend = url.split(':').next().unwrap_or("unknown"), "catalog connection open");
    Ok(conn)
}

fn install_drivers() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(sqlx::any::install_default_drivers);
}
