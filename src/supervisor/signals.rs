//! Signal-aware cancellation for the run loop.
//!
//! One controller owns the cancellation token and tracks the persister for
//! the iteration currently in flight, so a signal arriving mid-iteration can
//! finalize the partial log with the right footer before the process exits.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::display;
use crate::stream::StreamPersister;

/// Conventional exit code for a termination signal (128 + signal number).
#[must_use]
pub fn signal_exit_code(signal: &str) -> i32 {
    match signal {
        "SIGHUP" => 129,
        "SIGINT" => 130,
        "SIGTERM" => 143,
        _ => 1,
    }
}

/// Coordinates signal delivery, run-loop cancellation and finalization of
/// the in-flight iteration log.
#[derive(Debug)]
pub struct CancellationController {
    active: Arc<Mutex<Option<Arc<StreamPersister>>>>,
    cancel: CancellationToken,
    handlers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register the persister for the iteration about to run.
    pub fn set_active(&self, persister: Arc<StreamPersister>) {
        let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(persister);
    }

    /// Drop the active persister once its iteration has been finalized.
    pub fn clear_active(&self) {
        let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
    }

    /// Token the run loop polls between iterations.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel the run loop and finalize the in-flight log as aborted.
    ///
    /// Returns true when an active persister was finalized.
    pub async fn abort_active(&self, signal: &str) -> bool {
        self.cancel.cancel();
        let persister = {
            let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        match persister {
            Some(p) => {
                p.abort(signal).await;
                true
            }
            None => false,
        }
    }

    /// Cancel the run loop and finalize the in-flight log as crashed.
    pub async fn crash_active(&self, message: &str) {
        self.cancel.cancel();
        let persister = {
            let mut guard = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            guard.take()
        };
        if let Some(p) = persister {
            p.crash(message).await;
        }
    }

    /// Install SIGINT, SIGTERM and SIGHUP handlers that abort the active
    /// iteration and exit with the conventional code for the signal.
    pub fn register_handlers(self: &Arc<Self>) {
        let mut handles = Vec::with_capacity(3);

        let controller = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                controller.handle_signal("SIGINT").await;
            }
        }));

        let controller = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut term) = signal(SignalKind::terminate()) {
                if term.recv().await.is_some() {
                    controller.handle_signal("SIGTERM").await;
                }
            }
        }));

        let controller = Arc::clone(self);
        handles.push(tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            if let Ok(mut hup) = signal(SignalKind::hangup()) {
                if hup.recv().await.is_some() {
                    controller.handle_signal("SIGHUP").await;
                }
            }
        }));

        let mut guard = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        guard.extend(handles);
    }

    /// Abort the handler tasks; called once the run loop finishes normally.
    pub fn unregister_handlers(&self) {
        let mut guard = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in guard.drain(..) {
            handle.abort();
        }
    }

    async fn handle_signal(&self, signal: &str) {
        tracing::info!(signal, "received termination signal");
        display::print_interrupted(signal);
        self.abort_active(signal).await;
        std::process::exit(signal_exit_code(signal));
    }
}

impl Drop for CancellationController {
    fn drop(&mut self) {
        self.unregister_handlers();
    }
}
