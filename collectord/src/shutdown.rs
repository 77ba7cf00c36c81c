//! Component O: cooperative shutdown. A process-wide flag is set exactly once by
//! either `SIGINT` or `SIGTERM`; a second signal of either kind is a no-op, mirroring
//! the original collector's idempotent `sigproc` handler (`static int called` guard).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_stopping(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn request_stop(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst) == false
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the signal-listening task. Returns immediately; the returned handle is
/// what workers poll between ticks.
pub fn install() -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::new();

    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() && ctrl_c_handle.request_stop() {
            tracing::info!("received SIGINT, shutting down");
        }
    });

    #[cfg(unix)]
    {
        let term_handle = handle.clone();
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::spawn(async move {
            if term.recv().await.is_some() && term_handle.request_stop() {
                tracing::info!("received SIGTERM, shutting down");
            }
        });
    }

    Ok(handle)
}
