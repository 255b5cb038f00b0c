//! Gate operations.
//!
//! An operation is one control command followed by status polling until the
//! gate reaches the target state, faults, or the operation times out.
//!
//! | Operation | Done when | Faults when |
//! |---|---|---|
//! | `PushButtonOpen` | open limit | last command `STOPPED` |
//! | `PushButtonClose` | close limit | last command `STOPPED` |
//! | `PushButtonStop` | last command `STOPPED` | never |
//! | `EmergencyOpen` | open limit | never |
//! | `EmergencyClose` | close limit | never |
//! | `OpenPartial` | partial open limit | never |
//! | `OpenInterlock` | partial open limit | never |
//! | `BlockExitVehicleDetector` | partial open limit | never |

use gatelink_core::{Address, Error, Result, constants::OPERATION_TIMEOUT};
use gatelink_protocol::{CommandStatus, GateControlRequest, GateStatusResponse};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};

/// A multi-step gate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    PushButtonOpen,
    PushButtonClose,
    PushButtonStop,
    EmergencyOpen,
    EmergencyClose,
    OpenPartial,
    OpenInterlock,
    BlockExitVehicleDetector,
}

impl Operation {
    /// Every operation, in catalogue order.
    pub const ALL: [Operation; 8] = [
        Operation::PushButtonOpen,
        Operation::PushButtonClose,
        Operation::PushButtonStop,
        Operation::EmergencyOpen,
        Operation::EmergencyClose,
        Operation::OpenPartial,
        Operation::OpenInterlock,
        Operation::BlockExitVehicleDetector,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::PushButtonOpen => "PushButtonOpen",
            Self::PushButtonClose => "PushButtonClose",
            Self::PushButtonStop => "PushButtonStop",
            Self::EmergencyOpen => "EmergencyOpen",
            Self::EmergencyClose => "EmergencyClose",
            Self::OpenPartial => "OpenPartial",
            Self::OpenInterlock => "OpenInterlock",
            Self::BlockExitVehicleDetector => "BlockExitVehicleDetector",
        }
    }

    /// Bound for the whole operation, control write included.
    pub fn timeout(&self) -> Duration {
        OPERATION_TIMEOUT
    }

    /// Control command that starts the operation.
    pub fn control_request(&self, address: Address) -> GateControlRequest {
        let mut request = GateControlRequest::new(address);
        match self {
            Self::PushButtonOpen => request.push_button_open = true,
            Self::PushButtonClose => request.push_button_close = true,
            Self::PushButtonStop => request.push_button_stop = true,
            Self::EmergencyOpen => request.emergency_open = true,
            Self::EmergencyClose => request.emergency_close = true,
            Self::OpenPartial => request.open_partial = true,
            Self::OpenInterlock => request.open_interlock = true,
            Self::BlockExitVehicleDetector => request.block_exit_vehicle_detector = true,
        }
        request
    }

    /// Whether `status` shows the operation complete.
    pub fn is_done(&self, status: &GateStatusResponse) -> bool {
        match self {
            Self::PushButtonOpen | Self::EmergencyOpen => status.open_limit,
            Self::PushButtonClose | Self::EmergencyClose => status.close_limit,
            Self::PushButtonStop => status.last_command_status == CommandStatus::Stopped,
            Self::OpenPartial | Self::OpenInterlock | Self::BlockExitVehicleDetector => {
                status.partial_open_limit
            }
        }
    }

    /// Whether the gate reports the motion under way. Only logged.
    pub fn is_in_progress(&self, status: &GateStatusResponse) -> bool {
        match self {
            Self::PushButtonOpen | Self::EmergencyOpen => {
                status.last_command_status == CommandStatus::OpenInProgress
            }
            Self::PushButtonClose | Self::EmergencyClose => {
                status.last_command_status == CommandStatus::CloseInProgress
            }
            _ => false,
        }
    }

    /// Terminal failure shown by `status`, if any.
    pub fn fault(&self, status: &GateStatusResponse) -> Option<Error> {
        match self {
            Self::PushButtonOpen | Self::PushButtonClose
                if status.last_command_status == CommandStatus::Stopped =>
            {
                Some(Error::OperationFault {
                    operation: self.id().to_string(),
                    status: status.last_command_status.to_string(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Operation {
    type Err = Error;

    /// Parse an operation id, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_request(format!("Unknown operation: {s}")))
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationOutcome {
    Done,
    Faulted,
    TimedOut,
    Cancelled,
    Failed,
}

impl OperationOutcome {
    pub(crate) fn of(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(Error::OperationFault { .. }) => Self::Faulted,
            Err(Error::OperationTimeout { .. }) => Self::TimedOut,
            Err(Error::Cancelled) => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Done => "done",
            Self::Faulted => "faulted",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
