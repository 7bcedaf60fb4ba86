//! Synchronization worker task.
//!
//! Design principles:
//! - Connection owned by the session directly - opened before spawn
//! - run() consumes self - the loop can only be started once
//! - One request in flight at a time: the bounded channel is the
//!   serialization point, there are no locks
//! - Graceful shutdown via shutdown channel, or by dropping the handle

use sqlx::AnyConnection;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webpsync_db::TableNames;
use webpsync_protocol::{Reply, Request};

use crate::error::WorkerError;
use crate::session::Session;

/// Worker configuration (plain data)
pub struct WorkerConfig {
    pub tables: TableNames,
    /// Replacement pairs folded into one flush statement.
    pub batch_size: usize,
}

/// One queued request and the slot its reply lands in.
struct Envelope {
    request: Request,
    reply_tx: oneshot::Sender<Reply>,
}

/// Handle for submitting requests to a running worker.
///
/// Dropping the handle closes the request channel; the worker drains,
/// closes its connection, and exits.
pub struct WorkerHandle {
    request_tx: mpsc::Sender<Envelope>,
    shutdown_tx: mpsc::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Submit one request and wait for its reply. Per-request failures
    /// come back as [`Reply::Error`]; `Err` means the worker is gone.
    pub async fn request(&self, request: Request) -> Result<Reply, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Envelope { request, reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)
    }

    /// Request graceful shutdown and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.join_handle.await;
    }
}

/// Active worker owning the session.
pub struct Worker {
    session: Session,
    request_rx: mpsc::Receiver<Envelope>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Worker {
    /// Spawn the worker task over an opened connection. The returned
    /// handle is the only way to reach it.
    pub fn spawn(conn: AnyConnection, config: WorkerConfig) -> WorkerHandle {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let worker = Worker {
            session: Session::new(conn, config.tables, config.batch_size),
            request_rx,
            shutdown_rx,
        };
        let join_handle = tokio::spawn(worker.run());
        WorkerHandle {
            request_tx,
            shutdown_tx,
            join_handle,
        }
    }

    /// Main loop - consumes self (can only run once). Request failures
    /// become `ERROR` replies; the loop only ends on shutdown or when
    /// every handle is gone.
    async fn run(mut self) {
        debug!("worker loop started");
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("shutdown requested");
                    break;
                }

                envelope = self.request_rx.recv() => {
                    let Some(Envelope { request, reply_tx }) = envelope else {
                        debug!("all handles dropped");
                        break;
                    };
                    let reply = match self.session.handle(request).await {
                        Ok(reply) => reply,
                        Err(error) => {
                            warn!(%error, "request failed");
                            Reply::Error {
                                message: error.to_string(),
                            }
                        }
                    };
                    if reply_tx.send(reply).is_err() {
                        warn!("reply receiver dropped");
                    }
                }
            }
        }

        let pending = self.session.pending_replacements();
        if pending > 0 {
            warn!(pending, "stopping with unflushed replacements");
        }
        if let Err(error) = self.session.close().await {
            warn!(%error, "closing connection failed");
        }
        debug!("worker loop stopped");
    }
}
