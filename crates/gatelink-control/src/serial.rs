//! Serial byte source.
//!
//! The gate operators sit on an RS-485 bus behind a USB adapter, configured
//! 8N1 without flow control. Opening runs on the blocking pool and is bounded
//! by [`SerialConfig::open_timeout`]; a port that cannot be opened is fatal to
//! the supervisor.

use gatelink_core::{
    Error, Result,
    constants::{DEFAULT_BAUD_RATE, SERIAL_OPEN_TIMEOUT},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

/// Serial port configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub path: String,

    /// Line speed.
    pub baud_rate: u32,

    /// Time allowed for opening the device.
    #[serde(with = "gatelink_core::duration_ms", rename = "open_timeout_ms")]
    pub open_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            open_timeout: SERIAL_OPEN_TIMEOUT,
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set the line speed.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the open timeout.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}

/// Open the serial device as an async byte stream.
///
/// # Errors
/// Returns `Error::Serial` if the device cannot be opened within the
/// configured timeout.
pub async fn open_serial(config: &SerialConfig) -> Result<SerialStream> {
    info!(path = %config.path, baud_rate = config.baud_rate, "Opening serial port");

    let builder = tokio_serial::new(&config.path, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None);

    let open = tokio::task::spawn_blocking(move || builder.open_native_async());

    match tokio::time::timeout(config.open_timeout, open).await {
        Ok(Ok(Ok(stream))) => {
            debug!(path = %config.path, "Serial port open");
            Ok(stream)
        }
        Ok(Ok(Err(e))) => {
            warn!(path = %config.path, error = %e, "Failed to open serial port");
            Err(Error::serial(format!("{}: {}", config.path, e)))
        }
        Ok(Err(e)) => Err(Error::serial(format!("open task failed: {e}"))),
        Err(_) => {
            warn!(
                path = %config.path,
                "Serial open timeout after {}ms",
                config.open_timeout.as_millis()
            );
            Err(Error::serial(format!(
                "{}: open timed out after {}ms",
                config.path,
                config.open_timeout.as_millis()
            )))
        }
    }
}

/// Names of the serial ports visible to the OS, for diagnostics when the
/// configured path cannot be opened.
pub fn available_ports() -> Result<Vec<String>> {
    let mut names: Vec<String> = serialport::available_ports()
        .map_err(|e| Error::serial(e.to_string()))?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort();
    Ok(names)
}
