//! The seam between the service layer and a gate controller.
//!
//! Methods return `Send` futures so the poller can run on a spawned task.
//! [`GateController`] is the production implementation; tests use
//! [`MockGate`](crate::mock::MockGate).

use gatelink_control::GateController;
use gatelink_core::{Address, Result};
use gatelink_protocol::{GateControlRequest, GateFaultResponse, GateStatusResponse, VersionResponse};

/// Request/response access to one gate operator.
pub trait GateControl: Send + Sync {
    fn reset(&self, address: Address) -> impl Future<Output = Result<()>> + Send;

    fn version(&self, address: Address) -> impl Future<Output = Result<VersionResponse>> + Send;

    fn gate_control(&self, request: &GateControlRequest) -> impl Future<Output = Result<()>> + Send;

    fn gate_status(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<GateStatusResponse>> + Send;

    fn gate_fault(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<GateFaultResponse>> + Send;
}

impl GateControl for GateController {
    fn reset(&self, address: Address) -> impl Future<Output = Result<()>> + Send {
        GateController::reset(self, address)
    }

    fn version(&self, address: Address) -> impl Future<Output = Result<VersionResponse>> + Send {
        GateController::version(self, address)
    }

    fn gate_control(
        &self,
        request: &GateControlRequest,
    ) -> impl Future<Output = Result<()>> + Send {
        GateController::gate_control(self, request)
    }

    fn gate_status(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<GateStatusResponse>> + Send {
        GateController::gate_status(self, address)
    }

    fn gate_fault(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<GateFaultResponse>> + Send {
        GateController::gate_fault(self, address)
    }
}
