//! Scripted gate for tests and development.
//!
//! Responses are queued per request kind. When a queue runs dry the last
//! successful response repeats, so a script only has to describe the
//! transitions it cares about.

use crate::traits::GateControl;
use gatelink_core::{Address, Error, Result};
use gatelink_protocol::{
    GateControlRequest, GateFaultResponse, GateStatusResponse, VersionResponse,
};
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Script {
    statuses: VecDeque<Result<GateStatusResponse>>,
    faults: VecDeque<Result<GateFaultResponse>>,
    control_errors: VecDeque<Error>,
    last_status: Option<GateStatusResponse>,
    last_fault: Option<GateFaultResponse>,
    control_requests: Vec<GateControlRequest>,
}

/// In-memory [`GateControl`] implementation.
///
/// # Examples
///
/// ```
/// use gatelink_core::Address;
/// use gatelink_service::{GateControl, mock::MockGate};
///
/// #[tokio::main]
/// async fn main() {
///     let gate = MockGate::new();
///     gate.push_fault(Default::default()).await;
///
///     let fault = gate.gate_fault(Address::default()).await.unwrap();
///     assert!(!fault.has_faults());
///     assert_eq!(gate.fault_calls(), 1);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockGate {
    script: Mutex<Script>,
    version: String,
    reset_calls: AtomicU64,
    control_calls: AtomicU64,
    status_calls: AtomicU64,
    fault_calls: AtomicU64,
}

impl MockGate {
    pub fn new() -> Self {
        Self::with_version("mock-1.0")
    }

    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Queue a status response.
    pub async fn push_status(&self, status: GateStatusResponse) {
        self.script.lock().await.statuses.push_back(Ok(status));
    }

    /// Queue a failed status request.
    pub async fn push_status_error(&self, error: Error) {
        self.script.lock().await.statuses.push_back(Err(error));
    }

    /// Queue a fault response.
    pub async fn push_fault(&self, fault: GateFaultResponse) {
        self.script.lock().await.faults.push_back(Ok(fault));
    }

    /// Queue a failed fault request.
    pub async fn push_fault_error(&self, error: Error) {
        self.script.lock().await.faults.push_back(Err(error));
    }

    /// Fail the next control command with `error`.
    pub async fn fail_next_control(&self, error: Error) {
        self.script.lock().await.control_errors.push_back(error);
    }

    /// Control commands received so far.
    pub async fn control_requests(&self) -> Vec<GateControlRequest> {
        self.script.lock().await.control_requests.clone()
    }

    pub fn reset_calls(&self) -> u64 {
        self.reset_calls.load(Ordering::SeqCst)
    }

    pub fn control_calls(&self) -> u64 {
        self.control_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u64 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fault_calls(&self) -> u64 {
        self.fault_calls.load(Ordering::SeqCst)
    }
}

/// Pop the next scripted result, falling back to a repeat of the last
/// success. An empty script behaves like a silent device.
fn next_scripted<T: Clone>(queue: &mut VecDeque<Result<T>>, last: &mut Option<T>) -> Result<T> {
    match queue.pop_front() {
        Some(Ok(value)) => {
            *last = Some(value.clone());
            Ok(value)
        }
        Some(Err(e)) => Err(e),
        None => last
            .clone()
            .ok_or(Error::ResponseTimeout { timeout_ms: 0 }),
    }
}

impl GateControl for MockGate {
    async fn reset(&self, _address: Address) -> Result<()> {
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn version(&self, _address: Address) -> Result<VersionResponse> {
        Ok(VersionResponse {
            version: self.version.clone(),
        })
    }

    async fn gate_control(&self, request: &GateControlRequest) -> Result<()> {
        self.control_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        script.control_requests.push(*request);
        match script.control_errors.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn gate_status(&self, _address: Address) -> Result<GateStatusResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let script = &mut *self.script.lock().await;
        next_scripted(&mut script.statuses, &mut script.last_status)
    }

    async fn gate_fault(&self, _address: Address) -> Result<GateFaultResponse> {
        self.fault_calls.fetch_add(1, Ordering::SeqCst);
        let script = &mut *self.script.lock().await;
        next_scripted(&mut script.faults, &mut script.last_fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_last_response_repeats() {
        let gate = MockGate::new();
        gate.push_fault(GateFaultResponse {
            number_of_faults: 2,
            fault_codes: Vec::new(),
        })
        .await;

        for _ in 0..3 {
            let fault = gate.gate_fault(Address::default()).await.unwrap();
            assert_eq!(fault.number_of_faults, 2);
        }
        assert_eq!(gate.fault_calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_times_out() {
        let gate = MockGate::new();
        let result = gate.gate_status(Address::default()).await;
        assert!(matches!(result, Err(Error::ResponseTimeout { .. })));
    }

    #[tokio::test]
    async fn test_scripted_errors() {
        let gate = MockGate::new();
        gate.push_fault(GateFaultResponse::default()).await;
        gate.push_fault_error(Error::LinkClosed).await;
        gate.fail_next_control(Error::NotRunning).await;

        assert!(gate.gate_fault(Address::default()).await.is_ok());
        assert!(matches!(
            gate.gate_fault(Address::default()).await,
            Err(Error::LinkClosed)
        ));
        // repeats the last success after the error
        assert!(gate.gate_fault(Address::default()).await.is_ok());

        let request = GateControlRequest::new(Address::default());
        assert!(gate.gate_control(&request).await.is_err());
        assert!(gate.gate_control(&request).await.is_ok());
        assert_eq!(gate.control_requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_version_and_reset() {
        let gate = MockGate::with_version("4.2");
        assert_eq!(gate.version(Address::default()).await.unwrap().version, "4.2");
        gate.reset(Address::default()).await.unwrap();
        assert_eq!(gate.reset_calls(), 1);
    }
}
