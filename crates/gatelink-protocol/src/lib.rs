//! Frame codec and message set for the gate operator RS-485 protocol.
//!
//! - [`Packet`] and [`packet::checksum`]: validated frames
//! - [`GateCodec`]: resynchronizing tokio-util codec
//! - [`messages`]: requests and typed response decoders
//! - [`codes`] and [`faults`]: status and fault registries

pub mod codec;
pub mod codes;
pub mod faults;
pub mod messages;
pub mod packet;

pub use codec::{GateCodec, ParserState};
pub use codes::{BatteryState, CommandStatus, OperatorState};
pub use faults::FaultCode;
pub use messages::{
    GateControlRequest, GateControlTransaction, GateFaultResponse, GateFaultTransaction,
    GateStatusResponse, GateStatusTransaction, Message, ResetMessage, Transaction,
    VersionResponse, VersionTransaction,
};
pub use packet::Packet;
