// Server loop module
// Accepts connections until shutdown, then drains in-flight requests

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::Instant;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Poll interval while waiting for connections to finish
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Run the accept loop until `shutdown` resolves.
///
/// Connections are spawned with `spawn_local`, so this must be driven
/// from inside a `LocalSet`. See [`serve`].
#[allow(clippy::ignored_unit_patterns)]
pub async fn run<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let active_connections = Arc::new(AtomicUsize::new(0));
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = &mut shutdown => break,
        }
    }

    // Stop accepting before draining
    drop(listener);
    logger::log_shutdown(active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    drain(&active_connections, grace).await;
}

/// Drive [`run`] on a fresh `LocalSet`
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let local = tokio::task::LocalSet::new();
    local.run_until(run(listener, state, shutdown)).await;
}

async fn drain(active_connections: &AtomicUsize, grace: Duration) {
    let deadline = Instant::now() + grace;
    loop {
        let remaining = active_connections.load(Ordering::SeqCst);
        if remaining == 0 {
            logger::log_info("[Shutdown] All connections closed");
            return;
        }
        if Instant::now() >= deadline {
            logger::log_warning(&format!(
                "[Shutdown] Grace period elapsed with {remaining} connection(s) still open"
            ));
            return;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
