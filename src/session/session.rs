//! Terminal session lifecycle
//!
//! Spawns a child under a PTY sized to the host terminal minus a vertical
//! padding, relays host input and resize events to the child, and restores
//! the terminal mode when the child ends.

#![allow(dead_code)]

use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::host::{HostTerminal, TerminalError};
use crate::pty::{ProcessExit, PtyError, PtyOutput, PtyProcess, TerminalSize};

/// Errors that can occur during session operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to spawn program: {0}")]
    SpawnFailed(String),

    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),

    #[error("Terminal error: {0}")]
    Terminal(#[from] TerminalError),
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Configuration for spawning a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Program to run under the PTY
    pub program: String,
    /// Program arguments
    pub args: Vec<String>,
    /// Host rows reserved for the caller's own UI chrome
    pub padding: u16,
    /// Extra environment variables layered over the host environment
    pub env: HashMap<String, String>,
}

impl SessionConfig {
    /// Create a new session config with no padding
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            padding: 0,
            env: HashMap::new(),
        }
    }

    /// Set program arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of reserved rows
    pub fn with_padding(mut self, padding: u16) -> Self {
        self.padding = padding;
        self
    }

    /// Set extra environment variables
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

/// Notification emitted after the child PTY was resized
#[derive(Debug, Clone, Copy)]
pub struct SessionResize {
    /// Session that was resized
    pub session_id: Uuid,
    /// New PTY columns
    pub cols: u16,
    /// New PTY rows (host rows minus padding)
    pub rows: u16,
}

/// Notification emitted once when the session ends
#[derive(Debug, Clone, Copy)]
pub struct SessionEnd {
    /// Session that ended
    pub session_id: Uuid,
    /// Exit code of the child if it could be reaped
    pub exit_code: Option<u32>,
}

/// Rows left for the child once the caller's chrome is subtracted
fn padded_rows(host_rows: u16, padding: u16) -> u16 {
    host_rows.saturating_sub(padding).max(1)
}

/// A single passthrough session: one child process under one PTY
///
/// The session owns the child and the PTY master exclusively, plus the
/// raw-mode state of the injected host terminal. It ends only when the
/// child exits.
pub struct TerminalSession {
    /// Unique identifier for this session
    id: Uuid,
    /// Rows reserved for the caller's UI chrome
    padding: u16,
    /// The PTY process
    process: PtyProcess,
    /// Injected host terminal (size queries, raw mode)
    terminal: Box<dyn HostTerminal>,
    /// Whether raw mode was enabled at session start
    raw_active: bool,
    /// Whether raw mode has been restored
    restored: bool,
    /// Exit receiver taken from the process at spawn time
    exit_rx: Option<broadcast::Receiver<ProcessExit>>,
    /// Channel for broadcasting resize notifications
    resize_tx: broadcast::Sender<SessionResize>,
    /// Channel for broadcasting the end notification
    end_tx: broadcast::Sender<SessionEnd>,
}

impl TerminalSession {
    /// Spawn the program under a PTY sized to the host terminal minus padding
    ///
    /// Captures the host working directory and environment for the child.
    /// If standard input supports raw mode it is enabled immediately;
    /// otherwise the session runs without any mode toggling.
    pub fn spawn(
        config: SessionConfig,
        mut terminal: Box<dyn HostTerminal>,
    ) -> SessionResult<Self> {
        if config.program.is_empty() {
            return Err(SessionError::SpawnFailed(
                "program must not be empty".to_string(),
            ));
        }

        let host = terminal.size()?;
        let size = TerminalSize::new(host.cols, padded_rows(host.rows, config.padding));

        let cwd = std::env::current_dir().map_err(|e| {
            SessionError::SpawnFailed(format!("failed to resolve working directory: {}", e))
        })?;

        let env = if config.env.is_empty() {
            None
        } else {
            Some(&config.env)
        };
        let mut process = PtyProcess::spawn(&config.program, &config.args, &cwd, env, size)?;
        let exit_rx = process.take_exit();

        let id = Uuid::new_v4();
        info!(
            session = %id,
            program = %config.program,
            cols = size.cols,
            rows = size.rows,
            "session started"
        );

        // Raw mode goes on right away so keystrokes pass through unprocessed
        let mut raw_active = false;
        if terminal.is_raw_capable() {
            match terminal.enter_raw_mode() {
                Ok(()) => raw_active = true,
                Err(e) => warn!(session = %id, "could not enable raw mode: {}", e),
            }
        }

        let (resize_tx, _) = broadcast::channel(16);
        let (end_tx, _) = broadcast::channel(1);

        Ok(Self {
            id,
            padding: config.padding,
            process,
            terminal,
            raw_active,
            restored: false,
            exit_rx,
            resize_tx,
            end_tx,
        })
    }

    /// Get the session ID
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current size of the child PTY
    pub fn pty_size(&self) -> TerminalSize {
        self.process.size()
    }

    /// Subscribe to resize notifications
    pub fn subscribe_resize(&self) -> broadcast::Receiver<SessionResize> {
        self.resize_tx.subscribe()
    }

    /// Subscribe to the end notification
    pub fn subscribe_end(&self) -> broadcast::Receiver<SessionEnd> {
        self.end_tx.subscribe()
    }

    /// Take the child's output receiver for the display layer
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<PtyOutput>> {
        self.process.take_output()
    }

    /// Forward bytes verbatim to the child's PTY input
    pub async fn write(&self, data: &[u8]) -> SessionResult<()> {
        self.process.write(data).await?;
        Ok(())
    }

    /// Re-query the host size and apply it, minus padding, to the child PTY
    ///
    /// Emits one resize notification per successful apply.
    pub async fn resize_to_host(&mut self) -> SessionResult<()> {
        let host = self.terminal.size()?;
        let rows = padded_rows(host.rows, self.padding);
        self.process.resize(host.cols, rows).await?;

        debug!(session = %self.id, cols = host.cols, rows = rows, "pty resized");
        let _ = self.resize_tx.send(SessionResize {
            session_id: self.id,
            cols: host.cols,
            rows,
        });
        Ok(())
    }

    /// Dispatch loop for the session's three event sources: host input
    /// bytes, host resize notifications, and the child exit event
    ///
    /// Each event is handled to completion before the next. Input writes are
    /// fire-and-forget; a closed input channel (host stdin EOF) leaves the
    /// session running until the child ends. Returns once the child has
    /// ended, with the terminal mode restored.
    pub async fn run(
        mut self,
        mut input_rx: mpsc::Receiver<Vec<u8>>,
        mut resize_rx: mpsc::Receiver<()>,
    ) -> SessionEnd {
        let mut exit_rx = match self.exit_rx.take() {
            Some(rx) => rx,
            None => self.process.subscribe_exit(),
        };

        let mut input_open = true;
        let mut resize_open = true;

        loop {
            tokio::select! {
                chunk = input_rx.recv(), if input_open => match chunk {
                    Some(bytes) => {
                        if let Err(e) = self.process.write(&bytes).await {
                            debug!(session = %self.id, "dropping input: {}", e);
                        }
                    }
                    None => input_open = false,
                },
                notice = resize_rx.recv(), if resize_open => match notice {
                    Some(()) => {
                        if let Err(e) = self.resize_to_host().await {
                            warn!(session = %self.id, "resize failed: {}", e);
                        }
                    }
                    None => resize_open = false,
                },
                exit = exit_rx.recv() => {
                    let exit =
                        exit.unwrap_or_else(|_| self.process.exit_info().unwrap_or_default());
                    return self.finish(exit);
                }
            }
        }
    }

    /// Restore the terminal and publish the end notification
    fn finish(&mut self, exit: ProcessExit) -> SessionEnd {
        self.restore_terminal();

        let end = SessionEnd {
            session_id: self.id,
            exit_code: exit.exit_code,
        };
        info!(session = %self.id, exit_code = ?exit.exit_code, "session ended");
        let _ = self.end_tx.send(end);
        end
    }

    /// Put standard input back into its pre-session mode
    ///
    /// Idempotent; also invoked from Drop so a failed event handler cannot
    /// leave the host terminal stuck in raw mode.
    fn restore_terminal(&mut self) {
        if !self.raw_active || self.restored {
            return;
        }
        self.restored = true;

        if let Err(e) = self.terminal.restore_mode() {
            warn!(session = %self.id, "failed to restore terminal mode: {}", e);
        }
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.restore_terminal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fake::FakeTerminal;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_padded_rows() {
        assert_eq!(padded_rows(24, 0), 24);
        assert_eq!(padded_rows(24, 1), 23);
        assert_eq!(padded_rows(24, 24), 1);
        assert_eq!(padded_rows(10, 50), 1);
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new("vim")
            .with_args(["notes.txt"])
            .with_padding(3);
        assert_eq!(config.program, "vim");
        assert_eq!(config.args, vec!["notes.txt"]);
        assert_eq!(config.padding, 3);
        assert!(config.env.is_empty());
    }

    #[test]
    fn test_spawn_rejects_empty_program() {
        let (term, _state) = FakeTerminal::new(TerminalSize::new(80, 24), false);
        let result = TerminalSession::spawn(SessionConfig::new(""), Box::new(term));
        assert!(matches!(result, Err(SessionError::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn test_spawn_sizes_pty_with_padding() {
        let (term, _state) = FakeTerminal::new(TerminalSize::new(80, 24), false);
        let config = SessionConfig::new("cat").with_padding(1);
        let session = TerminalSession::spawn(config, Box::new(term)).unwrap();
        assert_eq!(session.pty_size(), TerminalSize::new(80, 23));
    }

    #[tokio::test]
    async fn test_raw_mode_skipped_when_unsupported() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), false);
        let session = TerminalSession::spawn(SessionConfig::new("cat"), Box::new(term)).unwrap();
        drop(session);

        let state = state.lock().unwrap();
        assert_eq!(state.enter_calls, 0);
        assert_eq!(state.restore_calls, 0);
    }

    #[tokio::test]
    async fn test_raw_mode_restored_exactly_once() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), true);
        let config = SessionConfig::new("echo").with_args(["hello"]).with_padding(1);
        let session = TerminalSession::spawn(config, Box::new(term)).unwrap();

        let (_input_tx, input_rx) = mpsc::channel(1);
        let (_resize_tx, resize_rx) = mpsc::channel(1);

        let end = timeout(Duration::from_secs(5), session.run(input_rx, resize_rx))
            .await
            .expect("session should end when the child exits");
        assert_eq!(end.exit_code, Some(0));

        let state = state.lock().unwrap();
        assert_eq!(state.enter_calls, 1);
        assert_eq!(state.restore_calls, 1);
    }

    #[tokio::test]
    async fn test_restore_fires_from_drop_when_run_never_starts() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), true);
        let session = TerminalSession::spawn(SessionConfig::new("cat"), Box::new(term)).unwrap();
        drop(session);

        let state = state.lock().unwrap();
        assert_eq!(state.enter_calls, 1);
        assert_eq!(state.restore_calls, 1);
    }

    #[tokio::test]
    async fn test_resize_applies_padding_and_notifies() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), false);
        let config = SessionConfig::new("cat").with_padding(2);
        let mut session = TerminalSession::spawn(config, Box::new(term)).unwrap();
        assert_eq!(session.pty_size(), TerminalSize::new(80, 22));

        let mut resize_rx = session.subscribe_resize();

        state.lock().unwrap().size = TerminalSize::new(100, 40);
        session.resize_to_host().await.unwrap();

        assert_eq!(session.pty_size(), TerminalSize::new(100, 38));
        let notice = resize_rx.try_recv().unwrap();
        assert_eq!((notice.cols, notice.rows), (100, 38));
        // One host resize event, one notification
        assert!(resize_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_forwards_input_and_resizes() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), false);
        let config = SessionConfig::new("cat").with_padding(1);
        let mut session = TerminalSession::spawn(config, Box::new(term)).unwrap();

        let mut output_rx = session.take_output().unwrap();
        let mut resize_notices = session.subscribe_resize();

        let (input_tx, input_rx) = mpsc::channel(8);
        let (resize_tx, resize_rx) = mpsc::channel(8);
        let handle = tokio::spawn(session.run(input_rx, resize_rx));

        input_tx.send(b"round trip\r".to_vec()).await.unwrap();

        let mut collected = Vec::new();
        while let Ok(Some(output)) = timeout(Duration::from_secs(5), output_rx.recv()).await {
            collected.extend_from_slice(&output.data);
            if String::from_utf8_lossy(&collected).contains("round trip") {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("round trip"));

        state.lock().unwrap().size = TerminalSize::new(90, 30);
        resize_tx.send(()).await.unwrap();
        let notice = timeout(Duration::from_secs(5), resize_notices.recv())
            .await
            .expect("resize notification should arrive")
            .unwrap();
        assert_eq!((notice.cols, notice.rows), (90, 29));

        // ^D at line start ends cat's stdin
        input_tx.send(vec![0x04]).await.unwrap();
        let end = timeout(Duration::from_secs(5), handle)
            .await
            .expect("session should end after EOF")
            .unwrap();
        assert_eq!(end.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_echo_scenario() {
        let (term, state) = FakeTerminal::new(TerminalSize::new(80, 24), true);
        let config = SessionConfig::new("echo").with_args(["hello"]).with_padding(1);
        let mut session = TerminalSession::spawn(config, Box::new(term)).unwrap();
        assert_eq!(session.pty_size(), TerminalSize::new(80, 23));

        let mut output_rx = session.take_output().unwrap();
        let mut end_rx = session.subscribe_end();

        let (_input_tx, input_rx) = mpsc::channel(1);
        let (_resize_tx, resize_rx) = mpsc::channel(1);
        let handle = tokio::spawn(session.run(input_rx, resize_rx));

        let mut collected = Vec::new();
        while let Ok(Some(output)) = timeout(Duration::from_secs(5), output_rx.recv()).await {
            collected.extend_from_slice(&output.data);
            if String::from_utf8_lossy(&collected).contains("hello") {
                break;
            }
        }
        assert!(String::from_utf8_lossy(&collected).contains("hello"));

        let end = timeout(Duration::from_secs(5), handle)
            .await
            .expect("session should end")
            .unwrap();
        assert_eq!(end.exit_code, Some(0));

        let notified = timeout(Duration::from_secs(1), end_rx.recv())
            .await
            .expect("end notification should arrive")
            .unwrap();
        assert_eq!(notified.session_id, end.session_id);

        assert_eq!(state.lock().unwrap().restore_calls, 1);
    }
}
