//! ptypad
//!
//! Runs a command under a PTY sized to the current terminal minus a vertical
//! padding, relaying stdin and resize events to the child and restoring the
//! terminal mode on exit. This binary is also the display layer: the child's
//! PTY output is written straight to stdout.

mod config;
mod host;
mod pty;
mod session;

use clap::Parser;
use tokio::io::AsyncWriteExt;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use host::StdioTerminal;
use session::{spawn_input_pump, spawn_resize_watcher, SessionConfig, TerminalSession};

/// Run a command in a PTY padded for surrounding UI chrome
#[derive(Parser, Debug)]
#[command(name = "ptypad")]
#[command(version, about, long_about = None)]
struct Args {
    /// Program to run (defaults to the configured program, then the shell)
    program: Option<String>,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Terminal rows to reserve for surrounding UI chrome
    #[arg(short, long)]
    padding: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Fallback program when neither the CLI nor the config names one
fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging. Logs go to stderr; stdout belongs to the child.
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    debug!("ptypad v{}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load(&std::env::current_dir()?)?;

    let (program, program_args) = match args.program {
        Some(program) => (program, args.args),
        None => match settings.program.clone() {
            Some(program) => (program, settings.args.clone()),
            None => (default_shell(), Vec::new()),
        },
    };
    let padding = args.padding.or(settings.padding).unwrap_or(0);

    let session_config = SessionConfig::new(program)
        .with_args(program_args)
        .with_padding(padding)
        .with_env(settings.env);

    let mut session = TerminalSession::spawn(session_config, Box::new(StdioTerminal::new()))?;

    // Display layer: child output goes straight to stdout
    let output_rx = session.take_output();
    let display = tokio::spawn(async move {
        let Some(mut output_rx) = output_rx else {
            return;
        };
        let mut stdout = tokio::io::stdout();
        while let Some(output) = output_rx.recv().await {
            if stdout.write_all(&output.data).await.is_err() {
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let input_rx = spawn_input_pump(tokio::io::stdin());
    let resize_rx = spawn_resize_watcher();

    let end = session.run(input_rx, resize_rx).await;

    // Drain remaining child output before exiting
    let _ = display.await;

    // The stdin pump still holds a blocking read; exit directly instead of
    // unwinding the runtime.
    std::process::exit(end.exit_code.unwrap_or(0) as i32);
}
