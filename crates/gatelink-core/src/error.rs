//! Error taxonomy shared by every layer of the gate protocol stack.
//!
//! Errors fall into five families:
//!
//! - **Framing** ([`FramingError`]): produced by the frame codec. Always
//!   recovered locally by resynchronizing on the next start-of-message byte.
//! - **Correlation**: unsolicited/unexpected frames and write/response
//!   timeouts. Transient, so the correlator retries them.
//! - **Decode**: [`Error::InvalidResponse`]. Permanent, never retried.
//! - **Operation**: faults, timeouts and cancellation of multi-step gate
//!   operations. Always surfaced to the caller.
//! - **Lifecycle**: [`Error::NotRunning`] and [`Error::LinkClosed`].

use thiserror::Error;

/// Result type alias for gate protocol operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while extracting packets from the byte stream.
///
/// None of these close the stream: the codec abandons the frame in progress
/// and keeps scanning for the next start-of-message byte.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Invalid address byte: {byte:#04x}")]
    InvalidAddress { byte: u8 },

    #[error("Invalid message size: {size}")]
    InvalidMessageSize { size: u8 },

    #[error("Invalid message type byte: {byte:#04x}")]
    InvalidMessageType { byte: u8 },

    #[error("Invalid message byte: {byte:#04x}")]
    InvalidMessageByte { byte: u8 },

    #[error("Invalid checksum: frame sums to {sum:#04x} mod 256")]
    InvalidChecksum { sum: u8 },

    #[error("Unexpected byte {byte:#04x} inside frame")]
    UnexpectedByte { byte: u8 },

    #[error("No byte received within {timeout_ms}ms inside frame")]
    ByteTimeout { timeout_ms: u64 },
}

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    // Correlation errors
    #[error("Unsolicited frame of type {message_type:#04x}")]
    UnsolicitedFrame { message_type: u8 },

    #[error("Unexpected frame: expected type {expected:#04x}, got {actual:#04x}")]
    UnexpectedFrame { expected: u8, actual: u8 },

    #[error("Write timeout after {timeout_ms}ms")]
    WriteTimeout { timeout_ms: u64 },

    #[error("Response timeout after {timeout_ms}ms")]
    ResponseTimeout { timeout_ms: u64 },

    #[error("Transaction timeout after {timeout_ms}ms ({attempts} attempts)")]
    TransactionTimeout { timeout_ms: u64, attempts: u32 },

    #[error("Transaction failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    // Decode errors
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    // Operation errors
    #[error("Operation {operation} faulted: {status}")]
    OperationFault { operation: String, status: String },

    #[error("Operation {operation} timed out after {timeout_ms}ms")]
    OperationTimeout { operation: String, timeout_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    // Lifecycle errors
    #[error("Controller is not running")]
    NotRunning,

    #[error("Link closed")]
    LinkClosed,

    // IO errors
    #[error("Serial port error: {message}")]
    Serial { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a serial port error.
    pub fn serial(message: impl Into<String>) -> Self {
        Self::Serial {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Only timeouts and frame-level corruption qualify. Decode failures,
    /// lifecycle errors and operation outcomes are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Framing(_)
                | Self::UnsolicitedFrame { .. }
                | Self::UnexpectedFrame { .. }
                | Self::WriteTimeout { .. }
                | Self::ResponseTimeout { .. }
        )
    }
}
