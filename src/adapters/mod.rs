//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                   |
//! |-------------|---------------------|-------------------------------|
//! | `real_hw`   | HardwareInterface   | Linux sysfs / IIO attributes  |
//! | `sim_hw`    | HardwareInterface   | Seeded in-process generator   |
//! | `demo`      | HardwareInterface   | `sim_hw` with preset curves   |
//! | `hardware`  | -                   | Shared handle, variant select |
//! | `http`      | Transport           | Backend REST API (reqwest)    |
//! | `log_sink`  | EventSink           | `log` facade                  |

pub mod demo;
pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod real_hw;
pub mod sim_hw;

pub use hardware::{SharedHardware, build_hardware};
