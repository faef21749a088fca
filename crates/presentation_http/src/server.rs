//! Serving with graceful shutdown

use std::{
    future::{Future, IntoFuture},
    sync::Arc,
    time::Duration,
};

use axum::Router;
use tokio::{net::TcpListener, sync::oneshot};
use tracing::{info, warn};

use crate::state::SessionRegistry;

/// Serve `app` until `signal` resolves, then drain connections.
///
/// Sessions are closed as soon as the signal fires so their event streams
/// end. Connections still open after `drain_timeout` are dropped.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    sessions: Arc<SessionRegistry>,
    signal: F,
    drain_timeout: Duration,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (fired_tx, fired_rx) = oneshot::channel();
    let shutdown = async move {
        signal.await;
        sessions.clear();
        let _ = fired_tx.send(());
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = fired_rx => {},
    }

    info!("Waiting up to {:?} for connections to close...", drain_timeout);
    if let Ok(result) = tokio::time::timeout(drain_timeout, server).await {
        result
    } else {
        warn!("Connections still open after {:?}, stopping anyway", drain_timeout);
        Ok(())
    }
}
