//! Presentation layer for herd
//!
//! This crate contains the CLI definition, the formatting of backend
//! notices into user messages, and console output.

pub mod cli;
pub mod output;

// Re-export commonly used types
pub use cli::commands::{Cli, Commands};
pub use output::console::{ConsoleDelivery, ConsoleFormatter};
pub use output::formatter::PlainNoticeFormatter;
