//! Gate service: operations, status polling and publication.
//!
//! # Poll loop
//!
//! ```text
//!  ┌──> gate_status ──err──> publish error ──┐
//!  │        │ changed?                        │
//!  │        └──> publish status               │
//!  │    gate_fault ───err──> publish error ───┤
//!  │        │ changed?                        │
//!  │        └──> publish fault                │
//!  └──────────── sleep(poll_interval) <───────┘
//! ```
//!
//! The loop runs until [`GateService::shutdown`]. Transport errors never stop
//! it; they are counted and published to every subscriber.

use crate::{
    operation::{Operation, OperationOutcome},
    publisher::{Publisher, Subscription},
    traits::GateControl,
};
use gatelink_core::{
    Address, Error, Result,
    constants::{OPERATION_TIMEOUT, POLL_INTERVAL},
};
use gatelink_protocol::{GateFaultResponse, GateStatusResponse, VersionResponse};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Gate polled and operated by this service.
    pub address: Address,

    /// Delay between poll cycles.
    #[serde(with = "gatelink_core::duration_ms", rename = "poll_interval_ms")]
    pub poll_interval: Duration,

    /// Delay between status checks while an operation runs.
    #[serde(with = "gatelink_core::duration_ms", rename = "operation_poll_interval_ms")]
    pub operation_poll_interval: Duration,

    /// Queue depth of each subscriber sink.
    pub subscriber_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: Address::default(),
            poll_interval: POLL_INTERVAL,
            operation_poll_interval: POLL_INTERVAL,
            subscriber_capacity: 16,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_capacity == 0 {
            return Err(Error::config("service.subscriber_capacity must be greater than 0"));
        }
        if self.operation_poll_interval >= OPERATION_TIMEOUT {
            return Err(Error::config(
                "service.operation_poll_interval_ms must be shorter than the operation timeout",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    transactions: AtomicU64,
    errors: AtomicU64,
    faults_observed: AtomicU64,
    operations: AtomicU64,
    operations_failed: AtomicU64,
    gate_up: AtomicU64,
    gate_down: AtomicU64,
}

/// Snapshot of service counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    /// Successful gate requests.
    pub transactions: u64,
    /// Failed gate requests seen by the poller.
    pub errors: u64,
    /// Sum of fault counts over published fault snapshots.
    pub faults_observed: u64,
    /// Values dropped by full subscriber queues.
    pub dropped_deliveries: u64,
    /// Operations started.
    pub operations: u64,
    /// Operations that did not finish `Done`.
    pub operations_failed: u64,
    /// Open operations started.
    pub gate_up: u64,
    /// Close operations started.
    pub gate_down: u64,
}

/// Operations and status publication for one gate.
pub struct GateService<G> {
    gate: Arc<G>,
    config: ServiceConfig,
    publisher: Arc<Publisher>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl<G: GateControl + 'static> GateService<G> {
    pub fn new(gate: Arc<G>, config: ServiceConfig) -> Self {
        let publisher = Arc::new(Publisher::new(config.subscriber_capacity));
        Self {
            gate,
            config,
            publisher,
            counters: Arc::new(Counters::default()),
            cancel: CancellationToken::new(),
            poller: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<G> {
        &self.gate
    }

    pub fn publisher(&self) -> &Arc<Publisher> {
        &self.publisher
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> ServiceStats {
        let c = &self.counters;
        ServiceStats {
            transactions: c.transactions.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            faults_observed: c.faults_observed.load(Ordering::Relaxed),
            dropped_deliveries: self.publisher.dropped(),
            operations: c.operations.load(Ordering::Relaxed),
            operations_failed: c.operations_failed.load(Ordering::Relaxed),
            gate_up: c.gate_up.load(Ordering::Relaxed),
            gate_down: c.gate_down.load(Ordering::Relaxed),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        self.publisher.subscribe().await
    }

    pub async fn unsubscribe(&self, id: Uuid) -> bool {
        self.publisher.unsubscribe(id).await
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    fn record<T>(&self, result: Result<T>) -> Result<T> {
        if result.is_ok() {
            self.counters.transactions.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    pub async fn reset(&self) -> Result<()> {
        self.ensure_running()?;
        self.record(self.gate.reset(self.config.address).await)
    }

    pub async fn version(&self) -> Result<VersionResponse> {
        self.ensure_running()?;
        self.record(self.gate.version(self.config.address).await)
    }

    pub async fn gate_status(&self) -> Result<GateStatusResponse> {
        self.ensure_running()?;
        self.record(self.gate.gate_status(self.config.address).await)
    }

    pub async fn gate_fault(&self) -> Result<GateFaultResponse> {
        self.ensure_running()?;
        self.record(self.gate.gate_fault(self.config.address).await)
    }

    /// Run `op` to completion.
    ///
    /// Sends the control command, then polls status until the operation is
    /// done or faults. Bounded by [`Operation::timeout`]; `cancel` (or service
    /// shutdown) ends it with `Error::Cancelled` without further requests.
    ///
    /// # Errors
    /// - the control or status request error, unchanged
    /// - `Error::OperationFault` when the gate reports a terminal failure
    /// - `Error::OperationTimeout` when the gate never reaches the target
    /// - `Error::Cancelled` on cancellation
    pub async fn run_operation(&self, op: Operation, cancel: &CancellationToken) -> Result<()> {
        self.ensure_running()?;

        self.counters.operations.fetch_add(1, Ordering::Relaxed);
        match op {
            Operation::PushButtonOpen => {
                self.counters.gate_up.fetch_add(1, Ordering::Relaxed);
            }
            Operation::PushButtonClose => {
                self.counters.gate_down.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        info!(operation = %op, address = %self.config.address, "Operation issued");
        let started = Instant::now();
        let timeout = op.timeout();

        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = tokio::time::timeout(timeout, self.drive(op)) => match result {
                Ok(result) => result,
                Err(_) => Err(Error::OperationTimeout {
                    operation: op.id().to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
            },
        };

        let outcome = OperationOutcome::of(&result);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => info!(operation = %op, %outcome, elapsed_ms, "Operation finished"),
            Err(e) => {
                self.counters.operations_failed.fetch_add(1, Ordering::Relaxed);
                warn!(operation = %op, %outcome, elapsed_ms, error = %e, "Operation finished");
            }
        }
        result
    }

    async fn drive(&self, op: Operation) -> Result<()> {
        let address = self.config.address;
        let request = op.control_request(address);
        self.record(self.gate.gate_control(&request).await)?;

        let mut polls = 0u32;
        loop {
            let status = self.record(self.gate.gate_status(address).await)?;
            polls += 1;

            if op.is_done(&status) {
                debug!(operation = %op, polls, "Target state reached");
                return Ok(());
            }
            if let Some(fault) = op.fault(&status) {
                return Err(fault);
            }

            if op.is_in_progress(&status) {
                debug!(operation = %op, polls, "In progress, checking again");
            } else {
                debug!(
                    operation = %op,
                    polls,
                    last_command = %status.last_command_status,
                    "Not complete, checking again"
                );
            }

            tokio::time::sleep(self.config.operation_poll_interval).await;
        }
    }

    /// Spawn the poll loop. Calling it again while the loop runs is a no-op.
    ///
    /// # Errors
    /// Returns `Error::NotRunning` after [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<()> {
        self.ensure_running()?;

        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Poller already running");
            return Ok(());
        }

        let task = Poller {
            gate: self.gate.clone(),
            address: self.config.address,
            interval: self.config.poll_interval,
            publisher: self.publisher.clone(),
            counters: self.counters.clone(),
        };
        *poller = Some(tokio::spawn(task.run(self.cancel.clone())));

        info!(
            address = %self.config.address,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Status poller started"
        );
        Ok(())
    }

    /// Stop the poll loop and refuse further requests. Safe to call more
    /// than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.poller.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Poller task ended abnormally");
            }
            info!("Status poller stopped");
        }
    }
}

impl<G> Drop for GateService<G> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Poller<G> {
    gate: Arc<G>,
    address: Address,
    interval: Duration,
    publisher: Arc<Publisher>,
    counters: Arc<Counters>,
}

impl<G: GateControl> Poller<G> {
    async fn run(self, cancel: CancellationToken) {
        let mut last_status = None;
        let mut last_fault = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.poll_once(&mut last_status, &mut last_fault) => {}
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Poll loop stopped");
    }

    /// One status + fault cycle. A failed status request skips the fault
    /// request for this cycle.
    async fn poll_once(
        &self,
        last_status: &mut Option<GateStatusResponse>,
        last_fault: &mut Option<GateFaultResponse>,
    ) {
        let status = match self.gate.gate_status(self.address).await {
            Ok(status) => status,
            Err(e) => return self.fail("gate_status", e).await,
        };
        self.counters.transactions.fetch_add(1, Ordering::Relaxed);

        let changed = match last_status.as_ref() {
            None => true,
            Some(prev) if prev != &status => {
                debug!(fields = ?prev.diff(&status), "Status changed");
                true
            }
            Some(_) => false,
        };
        if changed {
            self.publisher.publish_status(&status).await;
        }
        *last_status = Some(status);

        let fault = match self.gate.gate_fault(self.address).await {
            Ok(fault) => fault,
            Err(e) => return self.fail("gate_fault", e).await,
        };
        self.counters.transactions.fetch_add(1, Ordering::Relaxed);

        if last_fault.as_ref().is_none_or(|prev| prev != &fault) {
            if fault.has_faults() {
                warn!(faults = ?fault.fault_codes, "Gate reports faults");
            }
            self.counters
                .faults_observed
                .fetch_add(u64::from(fault.number_of_faults), Ordering::Relaxed);
            self.publisher.publish_fault(&fault).await;
        }
        *last_fault = Some(fault);
    }

    async fn fail(&self, request: &'static str, error: Error) {
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        debug!(request, error = %error, "Poll request failed");
        self.publisher.publish_error(Arc::new(error)).await;
    }
}
