//! PTY process management
//!
//! Handles spawning a single process with PTY terminal emulation, including:
//! - Configurable terminal size
//! - Output streaming into a channel
//! - Terminal resize support
//! - Explicit reaping when the child exits

#![allow(dead_code)]

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

/// Errors that can occur during PTY operations
#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY: {0}")]
    OpenFailed(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Failed to write to PTY: {0}")]
    WriteFailed(String),

    #[error("Failed to resize PTY: {0}")]
    ResizeFailed(String),

    #[error("Process already exited")]
    ProcessExited,

    #[error("PTY system error: {0}")]
    SystemError(String),
}

/// Result type for PTY operations
pub type PtyResult<T> = Result<T, PtyError>;

/// Terminal size configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl TerminalSize {
    /// Create a new terminal size
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Convert to portable-pty PtySize
    fn to_pty_size(self) -> PtySize {
        PtySize {
            rows: self.rows,
            cols: self.cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }
}

/// Output data from the PTY
#[derive(Debug, Clone)]
pub struct PtyOutput {
    /// The output data
    pub data: Vec<u8>,
}

/// Event emitted once when the child exits
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit {
    /// Exit code if the child could be reaped
    pub exit_code: Option<u32>,
}

/// Handle to a running PTY process
///
/// The pair is split during construction: the slave is consumed to spawn the
/// child, and the master is retained for resize operations. The child handle
/// moves into the reader thread, which reaps it after output EOF.
pub struct PtyProcess {
    /// The master PTY handle
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    /// Current terminal size
    size: StdMutex<TerminalSize>,
    /// Writer for sending input
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    /// Channel for receiving output, takeable by the display layer
    output_rx: Option<mpsc::Receiver<PtyOutput>>,
    /// Exit receiver subscribed before the reader thread starts, so the
    /// primary consumer cannot miss a fast exit
    exit_rx: Option<broadcast::Receiver<ProcessExit>>,
    /// Channel for broadcasting the exit event
    exit_tx: broadcast::Sender<ProcessExit>,
    /// Flag indicating the child has exited and been reaped
    exited: Arc<AtomicBool>,
    /// Exit information
    exit_info: Arc<StdMutex<Option<ProcessExit>>>,
}

impl PtyProcess {
    /// Spawn a new process with PTY
    ///
    /// # Arguments
    /// * `command` - The command to run
    /// * `args` - Command arguments
    /// * `working_dir` - Working directory for the process
    /// * `env` - Extra environment variables layered over the host environment
    /// * `size` - Initial terminal size
    pub fn spawn(
        command: &str,
        args: &[String],
        working_dir: &Path,
        env: Option<&HashMap<String, String>>,
        size: TerminalSize,
    ) -> PtyResult<Self> {
        // Get the native PTY system
        let pty_system = native_pty_system();

        // Open a new PTY with the specified size
        let pair = pty_system
            .openpty(size.to_pty_size())
            .map_err(|e| PtyError::OpenFailed(e.to_string()))?;

        // Build the command. CommandBuilder seeds the environment from the
        // host process, so `env` entries act as overrides on top of it.
        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);
        cmd.cwd(working_dir);
        if let Some(env_vars) = env {
            for (key, value) in env_vars {
                cmd.env(key, value);
            }
        }

        // Spawn the process
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(e.to_string()))?;

        // The slave lives on in the child; only the master is kept
        drop(pair.slave);

        // Get reader and writer from the master
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SystemError(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SystemError(e.to_string()))?;

        // Create channels
        let (output_tx, output_rx) = mpsc::channel(1024);
        let (exit_tx, exit_rx) = broadcast::channel(1);

        let exited = Arc::new(AtomicBool::new(false));
        let exit_info = Arc::new(StdMutex::new(None));

        // Spawn the reader thread
        let exited_clone = Arc::clone(&exited);
        let exit_info_clone = Arc::clone(&exit_info);
        let exit_tx_clone = exit_tx.clone();

        std::thread::spawn(move || {
            Self::reader_loop(
                reader,
                child,
                output_tx,
                exited_clone,
                exit_info_clone,
                exit_tx_clone,
            );
        });

        Ok(Self {
            master: Arc::new(Mutex::new(pair.master)),
            size: StdMutex::new(size),
            writer: Arc::new(Mutex::new(writer)),
            output_rx: Some(output_rx),
            exit_rx: Some(exit_rx),
            exit_tx,
            exited,
            exit_info,
        })
    }

    /// Reader loop that runs in a separate thread
    ///
    /// Streams PTY output into the channel until EOF, then reaps the child
    /// and publishes the exit event.
    fn reader_loop(
        mut reader: Box<dyn Read + Send>,
        mut child: Box<dyn Child + Send + Sync>,
        output_tx: mpsc::Sender<PtyOutput>,
        exited: Arc<AtomicBool>,
        exit_info: Arc<StdMutex<Option<ProcessExit>>>,
        exit_tx: broadcast::Sender<ProcessExit>,
    ) {
        let mut buffer = [0u8; 4096];

        loop {
            match reader.read(&mut buffer) {
                // EOF - the slave side has closed
                Ok(0) => break,
                Ok(n) => {
                    let output = PtyOutput {
                        data: buffer[..n].to_vec(),
                    };
                    // The receiver may be gone; keep draining so the child
                    // is still reaped below
                    let _ = output_tx.blocking_send(output);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
                // On Linux the master read fails with EIO once the slave
                // closes; treat any error as end of output
                Err(_) => break,
            }
        }

        // Output is done; reap the child and record how it went
        let exit_code = match child.wait() {
            Ok(status) => Some(status.exit_code()),
            Err(e) => {
                debug!("failed to reap child: {}", e);
                None
            }
        };

        let exit = ProcessExit { exit_code };
        *exit_info.lock().unwrap() = Some(exit);
        exited.store(true, Ordering::SeqCst);
        let _ = exit_tx.send(exit);
    }

    /// Get the current terminal size
    pub fn size(&self) -> TerminalSize {
        *self.size.lock().unwrap()
    }

    /// Check if the process has exited
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Get exit information if the process has exited
    pub fn exit_info(&self) -> Option<ProcessExit> {
        *self.exit_info.lock().unwrap()
    }

    /// Take the output receiver
    ///
    /// The display layer consumes it; yields `None` once the child has
    /// exited and all output has been drained.
    pub fn take_output(&mut self) -> Option<mpsc::Receiver<PtyOutput>> {
        self.output_rx.take()
    }

    /// Take the exit receiver created at spawn time
    ///
    /// Unlike `subscribe_exit`, this receiver existed before the reader
    /// thread started and therefore observes even an immediate exit.
    pub fn take_exit(&mut self) -> Option<broadcast::Receiver<ProcessExit>> {
        self.exit_rx.take()
    }

    /// Subscribe to the exit event
    pub fn subscribe_exit(&self) -> broadcast::Receiver<ProcessExit> {
        self.exit_tx.subscribe()
    }

    /// Write input to the PTY (stdin of the child)
    pub async fn write(&self, data: &[u8]) -> PtyResult<()> {
        if self.has_exited() {
            return Err(PtyError::ProcessExited);
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(data)
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| PtyError::WriteFailed(e.to_string()))?;

        Ok(())
    }

    /// Resize the terminal
    pub async fn resize(&self, cols: u16, rows: u16) -> PtyResult<()> {
        if self.has_exited() {
            return Err(PtyError::ProcessExited);
        }

        let new_size = TerminalSize::new(cols, rows);
        let master = self.master.lock().await;

        master
            .resize(new_size.to_pty_size())
            .map_err(|e| PtyError::ResizeFailed(e.to_string()))?;

        *self.size.lock().unwrap() = new_size;

        Ok(())
    }
}
