// SPDX-FileCopyrightText: 2026 Chatlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user serialization of inbound events.
//!
//! Each user gets a worker task fed by an unbounded queue, so one user's events
//! are handled in arrival order while different users run concurrently. An idle
//! worker removes its own map entry under the lock the router sends under, and
//! only when its queue is empty, so an event is never sent to a retired worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chatlet_core::{ChatletError, InboundEvent, UserId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::host::ExtensionHost;

type WorkerMap = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<InboundEvent>>>>;

/// Fans events out to per-user workers.
pub struct EventRouter {
    host: Arc<ExtensionHost>,
    workers: WorkerMap,
    tracker: TaskTracker,
    idle: Duration,
}

impl EventRouter {
    pub fn new(host: Arc<ExtensionHost>) -> Self {
        let idle = Duration::from_secs(host.config.worker_idle_secs);
        Self {
            host,
            workers: Arc::new(Mutex::new(HashMap::new())),
            tracker: TaskTracker::new(),
            idle,
        }
    }

    /// Number of live workers.
    pub fn active_workers(&self) -> usize {
        self.workers.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// Queue an event on its sender's worker, spawning one if needed.
    pub fn route(&self, event: InboundEvent) -> Result<(), ChatletError> {
        let user_id = event.sender().id;
        let mut workers = self
            .workers
            .lock()
            .map_err(|_| ChatletError::Internal("worker map lock poisoned".into()))?;

        let event = match workers.get(&user_id) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return Ok(()),
                // The worker died; replace it.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(event);
        workers.insert(user_id, tx);
        self.tracker.spawn(worker(
            user_id,
            rx,
            Arc::clone(&self.host),
            Arc::clone(&self.workers),
            self.idle,
        ));
        debug!(user_id = %user_id, "worker spawned");
        Ok(())
    }

    /// Receive events from the host's channel until `cancel` fires, then drain
    /// the workers for at most `drain_timeout`.
    pub async fn run(
        &self,
        cancel: CancellationToken,
        drain_timeout: Duration,
    ) -> Result<(), ChatletError> {
        info!("event loop running");
        loop {
            tokio::select! {
                received = self.host.channel.receive() => match received {
                    Ok(event) => self.route(event)?,
                    Err(e) => {
                        error!(error = %e, "channel receive error, stopping event loop");
                        break;
                    }
                },
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping event loop");
                    break;
                }
            }
        }
        self.drain(drain_timeout).await;
        Ok(())
    }

    /// Close every worker queue and wait for in-flight events to finish.
    pub async fn drain(&self, timeout: Duration) {
        if let Ok(mut workers) = self.workers.lock() {
            workers.clear();
        }
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                remaining = self.tracker.len(),
                "workers still busy after drain timeout"
            );
        } else {
            info!("all workers drained");
        }
    }
}

async fn worker(
    user_id: UserId,
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    host: Arc<ExtensionHost>,
    workers: WorkerMap,
    idle: Duration,
) {
    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(event)) => host.handle_event(event).await,
            Ok(None) => break,
            Err(_) => {
                let Ok(mut map) = workers.lock() else {
                    break;
                };
                if rx.is_empty() {
                    map.remove(&user_id);
                    break;
                }
            }
        }
    }
    debug!(user_id = %user_id, "worker retired");
}
