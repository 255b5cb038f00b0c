//! Gate status request and snapshot decoder.
//!
//! # Payload Layout
//!
//! ```text
//! offset  width  field
//!  0      2      last command status (decimal)
//!  2      2      operator state (decimal)
//!  4      1      faults present
//!  5      1      battery state (decimal)
//!  6      1      AC present
//!  7      7      open/close/partial limits, exit/inner/outer/reset-shadow loops
//! 14      3      relays 1-3 (raw bytes)
//! 17      6      photo eyes and gate edges
//! 23      4      reserved
//! 27      3      open too long, tailgater, loitering
//! 30     62      13 hex counters: 6,6,6,6,6,4,4,4,4,4,4,4,4 digits
//! ```
//!
//! Flags are set when the character is `'1'`. Payloads shorter than
//! [`STATUS_PAYLOAD_LEN`] are rejected; trailing bytes are ignored.

use super::{Message, PayloadReader, Transaction};
use crate::{
    Packet,
    codes::{BatteryState, CommandStatus, OperatorState},
};
use bytes::Bytes;
use gatelink_core::{
    Address, Error, Result,
    constants::{MSG_GATE_STATUS, MSG_GATE_STATUS_RESPONSE},
};
use serde::Serialize;

/// Minimum length of a status payload.
pub const STATUS_PAYLOAD_LEN: usize = 92;

const RESERVED_LEN: usize = 4;

/// Decoded status snapshot.
///
/// `PartialEq` is the change-detection predicate; [`GateStatusResponse::diff`]
/// names the fields that differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateStatusResponse {
    pub last_command_status: CommandStatus,
    pub current_operator_state: OperatorState,
    pub faults_present: bool,
    pub battery_state: BatteryState,
    pub ac_present: bool,
    pub open_limit: bool,
    pub close_limit: bool,
    pub partial_open_limit: bool,
    pub exit_loop: bool,
    pub inner_obstruction_loop: bool,
    pub outer_obstruction_loop: bool,
    pub reset_shadow_loop: bool,
    pub relay1: u8,
    pub relay2: u8,
    pub relay3: u8,
    pub photo_eye_open: bool,
    pub photo_eye_close: bool,
    pub gate_edge_both: bool,
    pub gate_edge_close: bool,
    pub gate_edge_open: bool,
    pub photo_eye_both: bool,
    pub open_too_long: bool,
    pub tailgater: bool,
    pub loitering: bool,
    pub transient_vehicle_count: u32,
    pub tenant_vehicle_count: u32,
    pub special_vehicle_count: u32,
    pub unknown_vehicle_count: u32,
    pub cycle_count: u32,
    pub eld_count: u32,
    pub iold_count: u32,
    pub oold_count: u32,
    pub hld_cld_count: u32,
    pub transient_vends: u32,
    pub tenant_vends: u32,
    pub special_vends: u32,
    pub manual_vends: u32,
}

macro_rules! changed_fields {
    ($a:expr, $b:expr; $($field:ident),+ $(,)?) => {{
        let mut changed = Vec::new();
        $(
            if $a.$field != $b.$field {
                changed.push(stringify!($field));
            }
        )+
        changed
    }};
}

impl GateStatusResponse {
    /// Decode a status payload.
    ///
    /// # Errors
    /// Returns `Error::InvalidResponse` when the payload is shorter than
    /// [`STATUS_PAYLOAD_LEN`] or a decimal/hex field holds other characters.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < STATUS_PAYLOAD_LEN {
            return Err(Error::invalid_response(format!(
                "status payload too short: {} bytes, expected {STATUS_PAYLOAD_LEN}",
                payload.len()
            )));
        }

        let mut r = PayloadReader::new(payload);
        Ok(Self {
            last_command_status: CommandStatus::from_code(r.decimal(2)?),
            current_operator_state: OperatorState::from_code(r.decimal(2)?),
            faults_present: r.flag()?,
            battery_state: BatteryState::from_code(r.decimal(1)?),
            ac_present: r.flag()?,
            open_limit: r.flag()?,
            close_limit: r.flag()?,
            partial_open_limit: r.flag()?,
            exit_loop: r.flag()?,
            inner_obstruction_loop: r.flag()?,
            outer_obstruction_loop: r.flag()?,
            reset_shadow_loop: r.flag()?,
            relay1: r.byte()?,
            relay2: r.byte()?,
            relay3: r.byte()?,
            photo_eye_open: r.flag()?,
            photo_eye_close: r.flag()?,
            gate_edge_both: r.flag()?,
            gate_edge_close: r.flag()?,
            gate_edge_open: r.flag()?,
            photo_eye_both: {
                let flag = r.flag()?;
                r.skip(RESERVED_LEN)?;
                flag
            },
            open_too_long: r.flag()?,
            tailgater: r.flag()?,
            loitering: r.flag()?,
            transient_vehicle_count: r.hex(6)?,
            tenant_vehicle_count: r.hex(6)?,
            special_vehicle_count: r.hex(6)?,
            unknown_vehicle_count: r.hex(6)?,
            cycle_count: r.hex(6)?,
            eld_count: r.hex(4)?,
            iold_count: r.hex(4)?,
            oold_count: r.hex(4)?,
            hld_cld_count: r.hex(4)?,
            transient_vends: r.hex(4)?,
            tenant_vends: r.hex(4)?,
            special_vends: r.hex(4)?,
            manual_vends: r.hex(4)?,
        })
    }

    /// Names of the fields that differ from `other`.
    pub fn diff(&self, other: &Self) -> Vec<&'static str> {
        changed_fields!(self, other;
            last_command_status,
            current_operator_state,
            faults_present,
            battery_state,
            ac_present,
            open_limit,
            close_limit,
            partial_open_limit,
            exit_loop,
            inner_obstruction_loop,
            outer_obstruction_loop,
            reset_shadow_loop,
            relay1,
            relay2,
            relay3,
            photo_eye_open,
            photo_eye_close,
            gate_edge_both,
            gate_edge_close,
            gate_edge_open,
            photo_eye_both,
            open_too_long,
            tailgater,
            loitering,
            transient_vehicle_count,
            tenant_vehicle_count,
            special_vehicle_count,
            unknown_vehicle_count,
            cycle_count,
            eld_count,
            iold_count,
            oold_count,
            hld_cld_count,
            transient_vends,
            tenant_vends,
            special_vends,
            manual_vends,
        )
    }
}

/// Gate status request.
///
/// The operator answers a `S` request with a status frame whose type varies
/// between firmware revisions, so the response filter is explicit.
#[derive(Debug, Clone)]
pub struct GateStatusTransaction {
    packet: Packet,
    response_type: u8,
}

impl GateStatusTransaction {
    /// Status request answered by a `N` frame.
    pub fn new(address: Address) -> Self {
        Self {
            packet: Packet::request(address, MSG_GATE_STATUS, Bytes::new()),
            response_type: MSG_GATE_STATUS_RESPONSE,
        }
    }

    /// Override the expected response type.
    pub fn with_response_type(mut self, response_type: u8) -> Self {
        self.response_type = response_type;
        self
    }
}

impl Message for GateStatusTransaction {
    fn packet(&self) -> &Packet {
        &self.packet
    }

    fn name(&self) -> &'static str {
        "gate_status"
    }
}

impl Transaction for GateStatusTransaction {
    type Response = GateStatusResponse;

    fn response_type(&self) -> u8 {
        self.response_type
    }

    fn decode(&self, packet: &Packet) -> Result<GateStatusResponse> {
        GateStatusResponse::decode(packet.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] =
        b"0404141010000000000000000000000000180000000162680003DF02BA1A000000000000E326002800005E750A6F";

    #[test]
    fn test_decode_sample_status() {
        assert_eq!(SAMPLE.len(), STATUS_PAYLOAD_LEN);
        let status = GateStatusResponse::decode(SAMPLE).unwrap();

        assert_eq!(status.last_command_status, CommandStatus::CloseComplete);
        assert_eq!(status.current_operator_state, OperatorState::NormalStop);
        assert!(status.faults_present);
        assert_eq!(status.battery_state, BatteryState::Good);
        assert!(status.ac_present);
        assert!(!status.open_limit);
        assert!(status.close_limit);
        assert!(!status.partial_open_limit);
        assert_eq!(status.transient_vehicle_count, 24);
        assert_eq!(status.tenant_vehicle_count, 0);
        assert_eq!(status.special_vehicle_count, 0x016268);
        assert_eq!(status.cycle_count, 0x02BA1A);
        assert_eq!(status.manual_vends, 0x0A6F);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert!(matches!(
            GateStatusResponse::decode(b""),
            Err(Error::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_decode_short_payload() {
        assert!(GateStatusResponse::decode(&SAMPLE[..91]).is_err());
    }

    #[test]
    fn test_decode_bad_counter() {
        let mut payload = SAMPLE.to_vec();
        payload[32] = b'Z';
        assert!(matches!(
            GateStatusResponse::decode(&payload),
            Err(Error::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_diff() {
        let a = GateStatusResponse::decode(SAMPLE).unwrap();
        let mut b = a.clone();
        assert!(a.diff(&b).is_empty());

        b.open_limit = true;
        b.cycle_count += 1;
        assert_eq!(a.diff(&b), vec!["open_limit", "cycle_count"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_response_type_configurable() {
        let tx = GateStatusTransaction::new(Address::default());
        assert_eq!(tx.packet().message_type(), b'S');
        assert_eq!(tx.response_type(), b'N');

        let tx = tx.with_response_type(b'S');
        let response = Packet::new(1, b'S', SAMPLE).unwrap();
        assert!(tx.accepts(&response));
        assert!(tx.decode(&response).is_ok());
    }
}
