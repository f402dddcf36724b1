//! Application core: domain types and port traits, zero I/O.
//!
//! The control loops interact with hardware and with event consumers only
//! through the **port traits** defined in [`ports`], so every loop is
//! testable with mock adapters.

pub mod commands;
pub mod events;
pub mod ports;
