//! Gate operations and status publication on top of a gate controller.
//!
//! - [`GateControl`]: the controller seam, implemented by
//!   [`GateController`](gatelink_control::GateController) and [`mock::MockGate`]
//! - [`Operation`]: the multi-step gate operations
//! - [`GateService`]: operation engine and status poller
//! - [`Publisher`]: subscriber fan-out with a last-value cache

pub mod mock;
pub mod operation;
pub mod publisher;
pub mod service;
pub mod traits;

pub use operation::{Operation, OperationOutcome};
pub use publisher::{Publisher, Snapshot, Subscription};
pub use service::{GateService, ServiceConfig, ServiceStats};
pub use traits::GateControl;
