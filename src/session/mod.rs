//! Terminal session module
//!
//! One session: spawn a child under a padded PTY, relay host input and
//! resize events, restore the terminal mode when the child ends.

mod events;
mod session;

pub use events::*;
pub use session::*;
