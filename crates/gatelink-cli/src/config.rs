//! Supervisor configuration.
//!
//! Loaded from a JSON file named by `GATELINK_CONFIG` or the first
//! command-line argument. Every section is optional:
//!
//! ```json
//! {
//!   "serial": { "path": "/dev/ttyUSB0", "baud_rate": 38400 },
//!   "controller": { "transaction_timeout_ms": 5000, "status_response_type": 78 },
//!   "service": { "address": 1, "poll_interval_ms": 25 },
//!   "log_filter": "info,gatelink_control=debug"
//! }
//! ```

use gatelink_control::{ControllerConfig, LinkConfig, SerialConfig};
use gatelink_core::{Error, Result};
use gatelink_service::ServiceConfig;
use serde::{Deserialize, Serialize};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "GATELINK_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatelinkConfig {
    pub serial: SerialConfig,
    pub link: LinkConfig,
    pub controller: ControllerConfig,
    pub service: ServiceConfig,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for GatelinkConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            link: LinkConfig::default(),
            controller: ControllerConfig::default(),
            service: ServiceConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl GatelinkConfig {
    /// Path from the environment, else the first argument.
    pub fn path_from_env() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::args_os().nth(1).map(PathBuf::from))
    }

    /// Load from `path`. No path, or a path that does not exist, yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text)
                .map_err(|e| Error::config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.path.trim().is_empty() {
            return Err(Error::config("serial.path must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::config("serial.baud_rate must be greater than 0"));
        }
        self.link.validate()?;
        self.controller.validate()?;
        self.service.validate()
    }
}
