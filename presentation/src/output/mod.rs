//! Output formatting and console delivery

pub mod console;
pub mod formatter;
