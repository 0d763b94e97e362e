//! TCP accept loop.
//!
//! Each accepted connection is handed to [`serve_connection`] on its own Tokio
//! task so one slow peer never blocks the others.  The task runs inside a
//! `connection` span carrying a fresh UUID and the peer address, so every log
//! line from that session can be told apart.
//!
//! Shutdown is triggered by a shared `AtomicBool` that `main.rs` clears on
//! Ctrl-C.  `accept()` is polled with a short timeout so the flag is checked
//! even when nobody connects.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::connection::{serve_connection, NetworkError};
use crate::application::respond::ResponderSettings;

const ACCEPT_POLL: Duration = Duration::from_millis(200);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Binds the listening socket.
///
/// # Errors
///
/// [`NetworkError::BindFailed`] if the address is in use or not permitted.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener, NetworkError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| NetworkError::BindFailed { addr, source })
}

/// Accepts connections until `running` is cleared.
///
/// # Errors
///
/// Only if the listener's local address cannot be read; accept errors are
/// logged and the loop keeps going.
pub async fn run_server(
    listener: TcpListener,
    settings: ResponderSettings,
    running: Arc<AtomicBool>,
) -> Result<(), NetworkError> {
    info!(addr = %listener.local_addr()?, "responder listening");

    accept_loop(
        || listener.accept(),
        &running,
        |(stream, peer): (TcpStream, SocketAddr)| {
            let span = info_span!("connection", id = %Uuid::new_v4(), %peer);
            tokio::spawn(
                async move {
                    info!("connection established");
                    if let Err(e) = serve_connection(stream, settings).await {
                        error!("connection failed: {e}");
                    }
                }
                .instrument(span),
            );
        },
    )
    .await;

    info!("shutdown flag set; stopping accept loop");
    Ok(())
}

/// Polls `accept` until `running` is cleared, handing each accepted value to
/// `on_accept`.  After a failed accept the loop sleeps for
/// [`ACCEPT_ERROR_BACKOFF`] so a persistent error (such as running out of
/// file descriptors) does not spin.
async fn accept_loop<T, A, Fut, H>(mut accept: A, running: &AtomicBool, mut on_accept: H)
where
    A: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
    H: FnMut(T),
{
    while running.load(Ordering::Relaxed) {
        match timeout(ACCEPT_POLL, accept()).await {
            Ok(Ok(accepted)) => on_accept(accepted),
            Ok(Err(e)) => {
                error!("accept error: {e}");
                sleep(ACCEPT_ERROR_BACKOFF).await;
            }
            Err(_) => {}
        }
    }
}
