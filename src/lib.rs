//! Edge agent library.
//!
//! Bridges local sensors and valves to a remote backend: periodic sensor
//! upload, backend-driven actuator commands and local time-based rules,
//! all supervised as one task group over a shared hardware handle.

#![deny(unused_must_use)]

pub mod actuators;
pub mod adapters;
pub mod app;
pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod rules;
pub mod sensors;
