//! PTY management module
//!
//! Provides PTY terminal emulation for running a process with full terminal
//! support. Uses portable-pty for cross-platform compatibility.

mod process;

pub use process::*;
