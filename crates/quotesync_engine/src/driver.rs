//! Async driver for one session.

use crate::coordinator::SyncCoordinator;
use crate::gateway::RemoteGateway;
use crate::notifier::RemoteChange;
use crate::persistence::PersistentStorage;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Drives a coordinator until `shutdown` turns true or its sender is dropped.
///
/// Open or load the document before calling this: cross-session
/// notifications are subscribed for the document loaded at start. Every
/// input is handled to completion before the next one is awaited, so a push
/// is never cancelled halfway. The document is closed on exit.
pub async fn run_session<G, P>(
    coordinator: Arc<SyncCoordinator<G, P>>,
    mut reachability: watch::Receiver<bool>,
    mut shutdown: watch::Receiver<bool>,
) where
    G: RemoteGateway,
    P: PersistentStorage,
{
    let mut changes = coordinator.subscribe();
    let mut reachability_open = true;

    let online = *reachability.borrow_and_update();
    if !online {
        log_failure("reachability", coordinator.set_reachability(false).await.err());
    }

    loop {
        let deadline = coordinator.next_deadline();
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            changed = reachability.changed(), if reachability_open => {
                if changed.is_err() {
                    debug!("reachability signal closed");
                    reachability_open = false;
                    continue;
                }
                let online = *reachability.borrow_and_update();
                log_failure("reachability", coordinator.set_reachability(online).await.err());
            }
            () = sleep_until(deadline) => {
                log_failure("autosave", coordinator.on_timer().await.err());
            }
            () = coordinator.wake_handle().notified() => {}
            change = next_change(&mut changes) => match change {
                Ok(change) => {
                    log_failure("remote change", coordinator.handle_remote_change(change).await.err());
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed cross-session notifications, pulling");
                    log_failure("resync", coordinator.resync().await.err());
                }
                Err(RecvError::Closed) => changes = None,
            },
        }
    }

    coordinator.close();
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_change(
    changes: &mut Option<broadcast::Receiver<RemoteChange>>,
) -> Result<RemoteChange, RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn log_failure(input: &'static str, err: Option<crate::SyncError>) {
    if let Some(err) = err {
        warn!(input, error = %err, "session input failed");
    }
}
