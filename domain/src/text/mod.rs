//! Text shaping for outbound delivery.

pub mod chunker;
