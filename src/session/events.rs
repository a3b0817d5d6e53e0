//! Host event pumps
//!
//! The dispatch loop consumes plain channels; these helpers feed them from
//! the real host: standard input bytes and terminal resize signals.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::debug;

/// Read chunks from the host input stream into a channel
///
/// The channel closes when the stream reaches EOF or errors; the session
/// keeps running either way until the child ends.
pub fn spawn_input_pump<R>(mut input: R) -> mpsc::Receiver<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut buffer = [0u8; 4096];
        loop {
            match input.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buffer[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("host input closed: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Forward host terminal resize signals into a channel
///
/// On unix this listens for SIGWINCH. Elsewhere the channel closes
/// immediately and the session simply never sees a resize.
pub fn spawn_resize_watcher() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(16);

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut winch = match signal(SignalKind::window_change()) {
            Ok(winch) => winch,
            Err(e) => {
                tracing::warn!("failed to install SIGWINCH handler: {}", e);
                return;
            }
        };

        while winch.recv().await.is_some() {
            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    #[cfg(not(unix))]
    drop(tx);

    rx
}
