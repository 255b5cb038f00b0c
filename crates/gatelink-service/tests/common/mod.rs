//! Status fixtures for service integration tests.

#![allow(dead_code)]

use gatelink_protocol::{CommandStatus, GateFaultResponse, GateStatusResponse};

pub const STATUS_SAMPLE: &[u8] =
    b"0404141010000000000000000000000000180000000162680003DF02BA1A000000000000E326002800005E750A6F";

/// Closed gate at rest.
pub fn closed() -> GateStatusResponse {
    GateStatusResponse::decode(STATUS_SAMPLE).unwrap()
}

/// Gate moving toward the open limit.
pub fn opening() -> GateStatusResponse {
    let mut status = closed();
    status.close_limit = false;
    status.last_command_status = CommandStatus::OpenInProgress;
    status
}

/// Gate resting on the open limit.
pub fn open() -> GateStatusResponse {
    let mut status = opening();
    status.open_limit = true;
    status.last_command_status = CommandStatus::OpenComplete;
    status
}

/// Gate halted mid-travel.
pub fn stopped() -> GateStatusResponse {
    let mut status = opening();
    status.last_command_status = CommandStatus::Stopped;
    status
}

pub fn no_faults() -> GateFaultResponse {
    GateFaultResponse::decode(b"00----------------").unwrap()
}
