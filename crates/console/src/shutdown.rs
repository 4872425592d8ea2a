//! Signal handling.
//!
//! Ctrl-C or SIGTERM shuts the client down: pending requests resolve to
//! [`SdkError::Shutdown`](fingerprint_portal_sdk::SdkError::Shutdown), the
//! flows show their fallback text, and the process exits once the current
//! command returns.

use fingerprint_portal_sdk::PortalClient;
use tokio::{signal, task::JoinHandle};

/// Waits for Ctrl-C or, on Unix, SIGTERM.
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => {
                tracing::warn!(%error, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}

/// Shuts `client` down when a signal arrives.
///
/// The task ends early if the client is shut down by other means.
pub fn spawn_shutdown_watcher(client: PortalClient) -> JoinHandle<()> {
    let token = client.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => client.shutdown(),
            () = token.cancelled() => {}
        }
    })
}
