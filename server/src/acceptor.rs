//! TCP accept loop and the session worker pool.
//!
//! One task accepts; every accepted connection runs as its own tokio task.
//! A semaphore bounds how many sessions are live at once. When the pool is
//! saturated, newly accepted connections wait for a permit before their
//! handshake starts; the OS backlog absorbs the burst. Ctrl-C stops the
//! accept loop, closes the listener, and drains in-flight sessions.

use crate::board::BoardState;
use crate::session;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore};

/// Floor for the session pool, regardless of core count.
pub const MIN_SESSION_WORKERS: usize = 8;

/// Pool size used by the binary: twice the available cores, at least
/// [`MIN_SESSION_WORKERS`].
pub fn default_session_workers() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    MIN_SESSION_WORKERS.max(cores * 2)
}

/// Accepts connections on `listener` until shutdown, running each session
/// on its own task against the shared board.
///
/// Accept failures other than shutdown are logged and the loop continues;
/// a single failed accept never takes the server down.
pub async fn serve(
    listener: TcpListener,
    board: Arc<RwLock<BoardState>>,
    max_sessions: usize,
) -> std::io::Result<()> {
    let permits = Arc::new(Semaphore::new(max_sessions));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, closing listener");
                break;
            }
            accepted = listener.accept() => {
                let (stream, addr) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("Accept failed: {e}");
                        continue;
                    }
                };

                let permit = match Arc::clone(&permits).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break, // semaphore closed, shutting down
                };
                let board = Arc::clone(&board);
                tokio::spawn(async move {
                    session::handle_session(stream, addr, board).await;
                    drop(permit);
                });
            }
        }
    }

    drop(listener);
    // Reacquiring every permit waits for all in-flight sessions to finish.
    let _ = permits.acquire_many(max_sessions as u32).await;
    info!("All sessions drained");
    Ok(())
}
