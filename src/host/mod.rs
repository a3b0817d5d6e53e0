//! Host terminal module
//!
//! Abstracts the controlling terminal behind a trait so the session never
//! reaches into process-global state directly.

mod terminal;

pub use terminal::*;
