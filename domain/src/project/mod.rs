//! Project directory policy for instance launches.

pub mod policy;
