//! CLI command implementations.

pub mod backup;
pub mod password;
pub mod schedule;
