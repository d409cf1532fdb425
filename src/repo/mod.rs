//! Table access. Every query here is checked at runtime, never by macro.

pub mod attendance;
pub mod backup;
pub mod employee;
pub mod settings;

/// Rows per multi-row INSERT during bulk loads.
pub const BATCH_SIZE: usize = 100;
