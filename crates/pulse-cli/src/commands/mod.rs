//! Command implementations.

pub mod heartbeat;
