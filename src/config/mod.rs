//! Configuration module
//!
//! Handles loading optional session defaults from the working directory.

mod settings;

pub use settings::*;
