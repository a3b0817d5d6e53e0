//! Host terminal access
//!
//! The session reaches the controlling terminal only through the
//! `HostTerminal` trait: size queries and raw-mode toggling are injected at
//! construction, so tests can substitute a fake for the real device.

use std::io;

use crossterm::terminal;
use crossterm::tty::IsTty;
use thiserror::Error;

use crate::pty::TerminalSize;

/// Errors that can occur while talking to the host terminal
#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Failed to query terminal size: {0}")]
    Size(#[source] io::Error),

    #[error("Failed to toggle raw mode: {0}")]
    RawMode(#[source] io::Error),
}

/// Host-side terminal capabilities the session depends on
///
/// Size comes from the output device; raw mode is toggled on standard input.
pub trait HostTerminal: Send {
    /// Current column/row count of the host terminal
    fn size(&self) -> Result<TerminalSize, TerminalError>;

    /// Whether standard input can be switched into raw mode
    fn is_raw_capable(&self) -> bool;

    /// Switch standard input into raw mode, remembering the prior state
    fn enter_raw_mode(&mut self) -> Result<(), TerminalError>;

    /// Return standard input to the state captured by `enter_raw_mode`
    fn restore_mode(&mut self) -> Result<(), TerminalError>;
}

/// `HostTerminal` backed by the process's real stdin/stdout via crossterm
#[derive(Debug, Default)]
pub struct StdioTerminal {
    prior_raw: Option<bool>,
}

impl StdioTerminal {
    pub fn new() -> Self {
        Self { prior_raw: None }
    }
}

impl HostTerminal for StdioTerminal {
    fn size(&self) -> Result<TerminalSize, TerminalError> {
        let (cols, rows) = terminal::size().map_err(TerminalError::Size)?;
        Ok(TerminalSize::new(cols, rows))
    }

    fn is_raw_capable(&self) -> bool {
        io::stdin().is_tty()
    }

    fn enter_raw_mode(&mut self) -> Result<(), TerminalError> {
        let prior = terminal::is_raw_mode_enabled().map_err(TerminalError::RawMode)?;
        if !prior {
            terminal::enable_raw_mode().map_err(TerminalError::RawMode)?;
        }
        self.prior_raw = Some(prior);
        Ok(())
    }

    fn restore_mode(&mut self) -> Result<(), TerminalError> {
        // Only leave raw mode if the terminal was not raw before the session
        if let Some(prior) = self.prior_raw.take() {
            if !prior {
                terminal::disable_raw_mode().map_err(TerminalError::RawMode)?;
            }
        }
        Ok(())
    }
}
