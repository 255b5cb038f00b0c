//! Status code registries reported by the gate operator.
//!
//! The status payload carries three small decimal codes: the outcome of the
//! last command, the operator state machine position, and the battery state.
//! Each registry maps the numeric code to a variant and a stable upper-case
//! label used in logs and serialized snapshots. Codes outside the registry
//! decode to `Unknown(code)` rather than failing, since newer firmware adds
//! states without changing the frame layout.
//!
//! # Example
//!
//! ```
//! use gatelink_protocol::codes::{BatteryState, CommandStatus};
//!
//! let status = CommandStatus::from_code(5);
//! assert_eq!(status, CommandStatus::Stopped);
//! assert_eq!(status.as_str(), "STOPPED");
//!
//! assert_eq!(BatteryState::from_code(9), BatteryState::Unknown(9));
//! ```

use serde::{Serialize, Serializer};
use std::fmt;

macro_rules! code_registry {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident = $code:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
            /// Code absent from the registry.
            Unknown(u8),
        }

        impl $name {
            /// Map a raw code to its variant.
            pub fn from_code(code: u8) -> Self {
                match code {
                    $( $code => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }

            /// Raw numeric code.
            pub fn code(&self) -> u8 {
                match self {
                    $( Self::$variant => $code, )+
                    Self::Unknown(code) => *code,
                }
            }

            /// Upper-case label.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                    Self::Unknown(_) => "UNKNOWN",
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Unknown(_))
            }
        }

        impl From<u8> for $name {
            fn from(code: u8) -> Self {
                Self::from_code(code)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Unknown(code) => write!(f, "UNKNOWN({code})"),
                    known => f.write_str(known.as_str()),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }
    };
}

code_registry! {
    /// Outcome of the most recent command.
    pub enum CommandStatus {
        Reset = 0 => "RESET",
        OpenInProgress = 1 => "OPEN_INPROGRESS",
        OpenComplete = 2 => "OPEN_COMPLETE",
        CloseInProgress = 3 => "CLOSE_INPROGRESS",
        CloseComplete = 4 => "CLOSE_COMPLETE",
        Stopped = 5 => "STOPPED",
        GateEdgeBoth = 6 => "GEB",
        Ies = 7 => "IES",
        ExitLoopDetector = 8 => "ELD",
        ShadowLoopDetector = 9 => "SLD_HLD",
        InnerObstructionLoop = 10 => "IOLD",
        OuterObstructionLoop = 11 => "OOLD",
        PhotoEyeOpen = 12 => "PEO",
        PhotoEyeClose = 13 => "PEC",
        OpenInterlock = 14 => "OI",
        LockInterlock = 15 => "LI",
        PowerLock = 16 => "POWER_LOCK",
        Mode4ObstructionLoops = 17 => "MODE4_IOLD_OOLD",
        Alert14 = 18 => "ALERT14",
        OpenCommand = 19 => "OPEN_CMD",
        Entrapment = 20 => "ENTRAPMENT",
        RelearnMode = 21 => "RELEARN_MODE",
        Fault = 22 => "FAULT",
        Error = 23 => "ERROR",
        Alert = 24 => "ALERT",
        EmergencyOpenInProgress = 25 => "EMOPEN_INPROGRESS",
        EmergencyOpenComplete = 26 => "EMOPEN_COMPLETE",
        EmergencyCloseInProgress = 27 => "EMCLOSE_INPROGRESS",
        EmergencyCloseComplete = 28 => "EMCLOSE_COMPLETE",
        PhotoEyeBoth = 29 => "PEB",
        GateEdgeClose = 30 => "GEC",
        GateEdgeOpen = 31 => "GEO",
    }
}

code_registry! {
    /// Position of the operator's internal state machine.
    pub enum OperatorState {
        Reset = 0 => "RESET",
        LearnLimitStop = 1 => "LEARNLIMITSTOP",
        LearnLimitOpen = 2 => "LEARNLIMITOPEN",
        LearnLimitClose = 3 => "LEARNLIMITCLOSE",
        NormalStop = 4 => "NORMALSTOP",
        CheckPhotoEyeOpen = 5 => "CHECKPEOPEN",
        PhotoEyePauseToOpen = 6 => "PEP2OPEN",
        WarnBeforeOpen = 7 => "WARNB4OPEN",
        NormalOpen = 8 => "NORMALOPEN",
        ReverseToClosePhotoEyeOpen = 9 => "REVERSE2CLOSEPEO",
        WaitPhotoEyeOpen = 10 => "WAITPEO",
        DelayPhotoEyeOpen = 11 => "DELAYPEO",
        CheckPhotoEyeClose = 12 => "CHECKPECLOSE",
        PhotoEyePauseToClose = 13 => "PEP2CLOSE",
        WarnBeforeClose = 14 => "WARNB4CLOSE",
        NormalClose = 15 => "NORMALCLOSE",
        WaitVehicleDetector = 16 => "WAITVD",
        ReverseToOpenPhotoEyeClose = 17 => "REVERSE2OPENPEC",
        WaitPhotoEye = 18 => "WAITPE",
        DelayPhotoEye = 19 => "DELAYPE",
        ReverseToClose = 20 => "REVERSE2CLOSE",
        ReverseToOpen = 21 => "REVERSE2OPEN",
        SafetyStop = 22 => "SAFETYSTOP",
        EntrapmentStop = 23 => "ENTRAPMENTSTOP",
        Fault1 = 24 => "FAULT1",
        Fault2 = 25 => "FAULT2",
        Fault3 = 26 => "FAULT3",
        Fault4 = 27 => "FAULT4",
        Fault5 = 28 => "FAULT5",
        Fault7 = 29 => "FAULT7",
        Fault8 = 30 => "FAULT8",
        Fault14 = 31 => "FAULT14",
        Fault15 = 32 => "FAULT15",
        Error1 = 33 => "ERROR1",
        Error2 = 34 => "ERROR2",
        Error6 = 35 => "ERROR6",
        Error8 = 36 => "ERROR8",
        Error9 = 37 => "ERROR9",
        Error10 = 38 => "ERROR10",
        Error12 = 39 => "ERROR12",
        Error13 = 40 => "ERROR13",
        Alert1 = 41 => "ALERT1",
        Alert2 = 42 => "ALERT2",
        Alert4 = 43 => "ALERT4",
        Alert5 = 44 => "ALERT5",
        Alert6 = 45 => "ALERT6",
        Alert21 = 46 => "ALERT21",
        FactoryTest = 47 => "FACTORY_TEST",
        LearnLimitGateEdgeOpen = 48 => "LEARNLIMIT_GEO",
        LearnLimitGateEdgeClose = 49 => "LEARNLIMIT_GEC",
    }
}

code_registry! {
    /// Battery backup state.
    pub enum BatteryState {
        Dead = 0 => "BATTERY_DEAD",
        DeadOpenGate = 1 => "BATTERY_DEAD_OPEN_GATE",
        ConserveLevel2 = 2 => "BATTERY_CONSERVE_LEVEL2",
        ConserveLevel1 = 3 => "BATTERY_CONSERVE_LEVEL1",
        Good = 4 => "BATTERY_OK",
    }
}

impl CommandStatus {
    /// Whether the gate is moving toward a limit.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::OpenInProgress
                | Self::CloseInProgress
                | Self::EmergencyOpenInProgress
                | Self::EmergencyCloseInProgress
        )
    }
}

impl OperatorState {
    /// Fault, error and alert states.
    pub fn is_abnormal(&self) -> bool {
        (24..=46).contains(&self.code())
    }
}
