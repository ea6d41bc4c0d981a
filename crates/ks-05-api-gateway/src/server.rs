//! HTTP server lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Serve `router` on `listener` until `shutdown` flips to `true` (or its
/// sender is dropped). In-flight requests are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("[ks-05] Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("[ks-05] Shutting down HTTP server");
        })
        .await
}
