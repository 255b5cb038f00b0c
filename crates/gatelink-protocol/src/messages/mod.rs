//! Request messages and typed response decoders.
//!
//! Every request knows how to build its outbound [`Packet`]. Requests that
//! expect an answer implement [`Transaction`], which adds a response filter
//! and a decoder producing a concrete response type, so callers get a
//! `GateStatusResponse` or `VersionResponse` back without any downcasting.
//!
//! | Request | Type | Response type | Response |
//! |---|---|---|---|
//! | [`ResetMessage`] | `R` | none | fire-and-forget |
//! | [`VersionTransaction`] | `V` | `V` | [`VersionResponse`] |
//! | [`GateControlTransaction`] | `C` | `C` | acknowledgement |
//! | [`GateStatusTransaction`] | `S` | `N` (configurable) | [`GateStatusResponse`] |
//! | [`GateFaultTransaction`] | `F` | `F` | [`GateFaultResponse`] |

pub mod gate_control;
pub mod gate_fault;
pub mod gate_status;
pub mod reset;
pub mod version;

pub use gate_control::{GateControlRequest, GateControlTransaction};
pub use gate_fault::{GateFaultResponse, GateFaultTransaction};
pub use gate_status::{GateStatusResponse, GateStatusTransaction, STATUS_PAYLOAD_LEN};
pub use reset::ResetMessage;
pub use version::{VersionResponse, VersionTransaction};

use crate::Packet;
use gatelink_core::{Error, Result};

/// An outbound request.
pub trait Message: Send + Sync {
    /// The encoded request frame.
    fn packet(&self) -> &Packet;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// A request answered by exactly one correlated response.
pub trait Transaction: Message {
    /// Decoded response value.
    type Response: Send + 'static;

    /// Message type of the expected response frame.
    fn response_type(&self) -> u8;

    /// Response filter: whether an inbound packet answers this request.
    fn accepts(&self, packet: &Packet) -> bool {
        packet.message_type() == self.response_type()
    }

    /// Decode a packet accepted by the filter.
    ///
    /// # Errors
    /// Returns `Error::InvalidResponse` for an empty, short or malformed
    /// payload. Decode errors are permanent and never retried.
    fn decode(&self, packet: &Packet) -> Result<Self::Response>;
}

/// Sequential reader over an ASCII payload.
pub(crate) struct PayloadReader<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn take(&mut self, width: usize) -> Result<&'a [u8]> {
        let end = self.pos + width;
        let field = self.payload.get(self.pos..end).ok_or_else(|| {
            Error::invalid_response(format!(
                "payload truncated at offset {} (need {} bytes, have {})",
                self.pos,
                end,
                self.payload.len()
            ))
        })?;
        self.pos = end;
        Ok(field)
    }

    pub(crate) fn skip(&mut self, width: usize) -> Result<()> {
        self.take(width).map(|_| ())
    }

    /// Decimal digits.
    pub(crate) fn decimal(&mut self, width: usize) -> Result<u8> {
        let offset = self.pos;
        let field = self.take(width)?;
        if !field.iter().all(u8::is_ascii_digit) {
            return Err(Error::invalid_response(format!(
                "non-decimal field {:?} at offset {offset}",
                String::from_utf8_lossy(field)
            )));
        }
        field
            .iter()
            .try_fold(0u8, |acc, b| acc.checked_mul(10)?.checked_add(b - b'0'))
            .ok_or_else(|| Error::invalid_response(format!("decimal overflow at offset {offset}")))
    }

    /// Hex digits.
    pub(crate) fn hex(&mut self, width: usize) -> Result<u32> {
        let offset = self.pos;
        let field = self.take(width)?;
        if !field.iter().all(u8::is_ascii_hexdigit) {
            return Err(Error::invalid_response(format!(
                "non-hex field {:?} at offset {offset}",
                String::from_utf8_lossy(field)
            )));
        }
        // at most 8 hex digits are ever requested
        Ok(field.iter().fold(0u32, |acc, b| {
            let digit = (*b as char).to_digit(16).unwrap_or(0);
            (acc << 4) | digit
        }))
    }

    /// Single-character flag, set when `'1'`.
    pub(crate) fn flag(&mut self) -> Result<bool> {
        Ok(self.take(1)?[0] == b'1')
    }

    /// Single raw byte.
    pub(crate) fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}
