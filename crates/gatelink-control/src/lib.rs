//! Transport and transaction correlation for gate operators.
//!
//! - [`serial`]: opening the RS-485 adapter as an async byte stream
//! - [`link`]: reader and writer tasks turning bytes into frames
//! - [`controller`]: request/response correlation with retries

pub mod controller;
pub mod link;
pub mod serial;

pub use controller::{ControllerConfig, ControllerStats, GateController};
pub use link::{FrameLink, FrameResult, LinkConfig};
pub use serial::{SerialConfig, available_ports, open_serial};
