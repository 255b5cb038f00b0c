//! Transaction correlator.
//!
//! [`GateController`] matches each outbound request with its response over a
//! half-duplex link where at most one exchange may be in flight.
//!
//! # Concurrency model
//!
//! ```text
//!  callers ──lock──> tx slot register ──┐
//!     │                                 v
//!     │ write         ┌───────────────────────────────┐
//!     └──> link ──>   │ dispatch task                 │
//!                     │  owns Option<PendingTx>       │
//!   inbound frames ──>│  pending?  forward to caller  │
//!                     │  none?     UnsolicitedFrame   │
//!                     └───────────────────────────────┘
//! ```
//!
//! - The transaction lock (a tokio `Mutex` guarding the transaction counter)
//!   serializes every transaction and fire-and-forget write.
//! - Only the dispatch task touches the pending slot. The caller holding the
//!   lock registers and releases it through a control channel which the
//!   dispatch loop polls before inbound frames, so a registration is always
//!   seen before the response it is waiting for.
//! - The caller applies the response filter and decoder, so each transaction
//!   yields its own response type.
//!
//! # Retry policy
//!
//! Each attempt writes the request (bounded by the write timeout) and waits
//! for one routed item (bounded by the response timeout). Transient failures
//! (timeouts, framing errors, a response of the wrong type) are retried up to
//! `max_attempts`; decode failures end the transaction at once. The whole
//! exchange, including the wait for the lock, is bounded by the caller's
//! timeout.

use crate::link::{FrameLink, FrameResult, LinkConfig};
use gatelink_core::{
    Address, Error, Result,
    constants::{
        MAX_ATTEMPTS, MSG_GATE_STATUS_RESPONSE, RESPONSE_TIMEOUT, TRANSACTION_TIMEOUT,
        WRITE_TIMEOUT,
    },
};
use gatelink_protocol::{
    GateControlRequest, GateControlTransaction, GateFaultResponse, GateFaultTransaction,
    GateStatusResponse, GateStatusTransaction, Message, Packet, ResetMessage, Transaction,
    VersionResponse, VersionTransaction,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Items queued for the pending transaction between attempts.
const SLOT_CAPACITY: usize = 4;

/// Correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Deadline for handing a request to the writer.
    #[serde(with = "gatelink_core::duration_ms", rename = "write_timeout_ms")]
    pub write_timeout: Duration,

    /// Deadline for the response after each write.
    #[serde(with = "gatelink_core::duration_ms", rename = "response_timeout_ms")]
    pub response_timeout: Duration,

    /// Outer bound for a whole transaction, lock wait included.
    #[serde(with = "gatelink_core::duration_ms", rename = "transaction_timeout_ms")]
    pub transaction_timeout: Duration,

    /// Write/response attempts per transaction.
    pub max_attempts: u32,

    /// Message type of gate status responses.
    pub status_response_type: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            write_timeout: WRITE_TIMEOUT,
            response_timeout: RESPONSE_TIMEOUT,
            transaction_timeout: TRANSACTION_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
            status_response_type: MSG_GATE_STATUS_RESPONSE,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.transaction_timeout.is_zero() {
            return Err(Error::config(
                "controller.transaction_timeout_ms must be greater than 0",
            ));
        }
        if self.write_timeout.is_zero() || self.response_timeout.is_zero() {
            return Err(Error::config("controller sub-timeouts must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("controller.max_attempts must be at least 1"));
        }
        if self.status_response_type > 127 {
            return Err(Error::config(
                "controller.status_response_type must be an ASCII byte",
            ));
        }
        Ok(())
    }
}

/// Counters maintained by the correlator.
#[derive(Debug, Default)]
struct Counters {
    transactions: AtomicU64,
    messages: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
    unsolicited: AtomicU64,
    framing_errors: AtomicU64,
}

/// Snapshot of correlator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    /// Completed transactions.
    pub transactions: u64,
    /// Fire-and-forget messages written.
    pub messages: u64,
    /// Attempts repeated after a transient failure.
    pub retries: u64,
    /// Transactions that ended in an error.
    pub failures: u64,
    /// Frames received with no transaction pending.
    pub unsolicited: u64,
    /// Framing errors reported by the reader.
    pub framing_errors: u64,
}

enum SlotCommand {
    Register {
        tx_id: u8,
        sender: mpsc::Sender<FrameResult>,
    },
    Release {
        tx_id: u8,
    },
}

struct PendingTx {
    tx_id: u8,
    sender: mpsc::Sender<FrameResult>,
}

/// Releases the pending slot when the transaction ends, however it ends.
struct SlotGuard<'a> {
    tx_id: u8,
    control: &'a mpsc::UnboundedSender<SlotCommand>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let _ = self.control.send(SlotCommand::Release { tx_id: self.tx_id });
    }
}

/// Transaction correlator over a frame link.
///
/// # Example
///
/// ```no_run
/// use gatelink_control::{ControllerConfig, GateController, LinkConfig, SerialConfig, open_serial};
/// use gatelink_core::Address;
///
/// # async fn example() -> gatelink_core::Result<()> {
/// let port = open_serial(&SerialConfig::new("/dev/ttyUSB0")).await?;
/// let controller =
///     GateController::spawn(port, &LinkConfig::default(), ControllerConfig::default());
///
/// let status = controller.gate_status(Address::default()).await?;
/// println!("close limit: {}", status.close_limit);
///
/// controller.close();
/// # Ok(())
/// # }
/// ```
pub struct GateController {
    outbound: mpsc::Sender<Packet>,
    control: mpsc::UnboundedSender<SlotCommand>,
    /// Transaction lock; guards the last transaction id.
    tx_lock: Mutex<u8>,
    config: ControllerConfig,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    link: FrameLink,
}

impl GateController {
    /// Spawn a frame link over `stream` and a correlator on top of it.
    pub fn spawn<S>(stream: S, link_config: &LinkConfig, config: ControllerConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (link, inbound) = FrameLink::spawn(stream, link_config);
        Self::new(link, inbound, config)
    }

    /// Build a correlator over an already running link.
    pub fn new(
        link: FrameLink,
        inbound: mpsc::Receiver<FrameResult>,
        config: ControllerConfig,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        let cancel = link.cancellation_token();

        tokio::spawn(dispatch_loop(
            inbound,
            control_rx,
            cancel.clone(),
            counters.clone(),
        ));

        info!(
            transaction_timeout_ms = config.transaction_timeout.as_millis() as u64,
            max_attempts = config.max_attempts,
            "Gate controller started"
        );

        Self {
            outbound: link.sender(),
            control: control_tx,
            tx_lock: Mutex::new(0),
            config,
            counters,
            cancel,
            link,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn stats(&self) -> ControllerStats {
        let c = &self.counters;
        ControllerStats {
            transactions: c.transactions.load(Ordering::Relaxed),
            messages: c.messages.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            unsolicited: c.unsolicited.load(Ordering::Relaxed),
            framing_errors: c.framing_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop the dispatch loop and the link. Safe to call more than once;
    /// every later call returns `Error::NotRunning`.
    pub fn close(&self) {
        if self.is_running() {
            info!("Closing gate controller");
        }
        self.link.close();
    }

    /// Token cancelled when the controller stops.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(Error::NotRunning)
        }
    }

    /// Write a fire-and-forget message.
    ///
    /// Waits for the transaction lock up to the transaction timeout, then
    /// hands the packet to the writer within the write timeout.
    pub async fn send_message<M: Message + ?Sized>(&self, message: &M) -> Result<()> {
        self.ensure_running()?;

        let lock = tokio::time::timeout(self.config.transaction_timeout, self.tx_lock.lock());
        let guard = match lock.await {
            Ok(guard) => guard,
            Err(_) => {
                warn!(message = message.name(), "Timed out waiting for transaction lock");
                return Err(Error::TransactionTimeout {
                    timeout_ms: self.config.transaction_timeout.as_millis() as u64,
                    attempts: 0,
                });
            }
        };
        self.ensure_running()?;

        let result = self.write(message.packet()).await;
        drop(guard);

        match &result {
            Ok(()) => {
                self.counters.messages.fetch_add(1, Ordering::Relaxed);
                debug!(message = message.name(), "Message written");
            }
            Err(e) => warn!(message = message.name(), error = %e, "Message write failed"),
        }
        result
    }

    /// Run a request/response exchange bounded by `timeout`.
    ///
    /// # Errors
    /// - `Error::NotRunning` after `close()` or once the link has died
    /// - `Error::TransactionTimeout` when `timeout` elapses, lock wait included
    /// - `Error::RetriesExhausted` when every attempt failed transiently
    /// - `Error::InvalidResponse` when the matched response cannot be decoded
    /// - `Error::LinkClosed` when the link dies mid-exchange
    pub async fn send_transaction<T: Transaction>(
        &self,
        tx: &T,
        timeout: Duration,
    ) -> Result<T::Response> {
        self.ensure_running()?;

        let started = Instant::now();
        let mut attempts = 0u32;
        let outcome = tokio::time::timeout(timeout, self.run_transaction(tx, &mut attempts)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    transaction = tx.name(),
                    attempts,
                    "Transaction timeout after {}ms",
                    timeout.as_millis()
                );
                Err(Error::TransactionTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                    attempts,
                })
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => {
                self.counters.transactions.fetch_add(1, Ordering::Relaxed);
                debug!(transaction = tx.name(), attempts, elapsed_ms, "Transaction complete");
            }
            Err(e) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                debug!(
                    transaction = tx.name(),
                    attempts,
                    elapsed_ms,
                    error = %e,
                    "Transaction failed"
                );
            }
        }
        result
    }

    async fn run_transaction<T: Transaction>(
        &self,
        tx: &T,
        attempts: &mut u32,
    ) -> Result<T::Response> {
        let lock_started = Instant::now();
        let mut last_id = self.tx_lock.lock().await;
        let tx_id = next_tx_id(*last_id);
        *last_id = tx_id;

        trace!(
            tx_id,
            transaction = tx.name(),
            lock_wait_ms = lock_started.elapsed().as_millis() as u64,
            "Transaction lock acquired"
        );

        let (sender, mut responses) = mpsc::channel(SLOT_CAPACITY);
        self.control
            .send(SlotCommand::Register { tx_id, sender })
            .map_err(|_| Error::NotRunning)?;
        let _slot = SlotGuard {
            tx_id,
            control: &self.control,
        };

        let mut last_error = None;
        for attempt in 1..=self.config.max_attempts {
            *attempts = attempt;
            if attempt > 1 {
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
            }

            // Drop anything routed after the previous attempt gave up
            while responses.try_recv().is_ok() {}

            match self.attempt(tx, tx_id, &mut responses).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() => {
                    warn!(
                        tx_id,
                        transaction = tx.name(),
                        attempt,
                        error = %e,
                        "Transaction attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::RetriesExhausted {
            attempts: self.config.max_attempts,
            last: Box::new(last_error.unwrap_or(Error::ResponseTimeout {
                timeout_ms: self.config.response_timeout.as_millis() as u64,
            })),
        })
    }

    async fn attempt<T: Transaction>(
        &self,
        tx: &T,
        tx_id: u8,
        responses: &mut mpsc::Receiver<FrameResult>,
    ) -> Result<T::Response> {
        self.write(tx.packet()).await?;

        let wait_started = Instant::now();
        match tokio::time::timeout(self.config.response_timeout, responses.recv()).await {
            Ok(Some(Ok(packet))) => {
                debug!(
                    tx_id,
                    response_wait_ms = wait_started.elapsed().as_millis() as u64,
                    %packet,
                    "Response received"
                );
                if !tx.accepts(&packet) {
                    return Err(Error::UnexpectedFrame {
                        expected: tx.response_type(),
                        actual: packet.message_type(),
                    });
                }
                tx.decode(&packet)
            }
            Ok(Some(Err(framing))) => Err(framing.into()),
            Ok(None) => Err(Error::LinkClosed),
            Err(_) => Err(Error::ResponseTimeout {
                timeout_ms: self.config.response_timeout.as_millis() as u64,
            }),
        }
    }

    async fn write(&self, packet: &Packet) -> Result<()> {
        let started = Instant::now();
        let send = self.outbound.send(packet.clone());
        match tokio::time::timeout(self.config.write_timeout, send).await {
            Ok(Ok(())) => {
                let write_wait_ms = started.elapsed().as_millis() as u64;
                trace!(write_wait_ms, "Request handed to writer");
                Ok(())
            }
            Ok(Err(_)) => Err(Error::LinkClosed),
            Err(_) => Err(Error::WriteTimeout {
                timeout_ms: self.config.write_timeout.as_millis() as u64,
            }),
        }
    }

    /// Reset the operator. No response is expected.
    pub async fn reset(&self, address: Address) -> Result<()> {
        self.send_message(&ResetMessage::new(address)).await
    }

    /// Read the firmware version.
    pub async fn version(&self, address: Address) -> Result<VersionResponse> {
        self.send_transaction(&VersionTransaction::new(address), self.config.transaction_timeout)
            .await
    }

    /// Send a gate control command and wait for the acknowledgement.
    pub async fn gate_control(&self, request: &GateControlRequest) -> Result<()> {
        let tx = GateControlTransaction::new(*request);
        self.send_transaction(&tx, self.config.transaction_timeout).await
    }

    /// Read the current status snapshot.
    pub async fn gate_status(&self, address: Address) -> Result<GateStatusResponse> {
        let tx = GateStatusTransaction::new(address)
            .with_response_type(self.config.status_response_type);
        self.send_transaction(&tx, self.config.transaction_timeout).await
    }

    /// Read the active fault list.
    pub async fn gate_fault(&self, address: Address) -> Result<GateFaultResponse> {
        self.send_transaction(&GateFaultTransaction::new(address), self.config.transaction_timeout)
            .await
    }
}

impl Drop for GateController {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("Gate controller dropped while running, closing");
        }
        self.cancel.cancel();
    }
}

/// Transaction ids run 1..=254 and wrap back to 1.
fn next_tx_id(current: u8) -> u8 {
    if current >= 254 { 1 } else { current + 1 }
}

async fn dispatch_loop(
    mut inbound: mpsc::Receiver<FrameResult>,
    mut control: mpsc::UnboundedReceiver<SlotCommand>,
    cancel: CancellationToken,
    counters: Arc<Counters>,
) {
    let mut pending: Option<PendingTx> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(command) = control.recv() => match command {
                SlotCommand::Register { tx_id, sender } => {
                    trace!(tx_id, "Pending transaction registered");
                    pending = Some(PendingTx { tx_id, sender });
                }
                SlotCommand::Release { tx_id } => {
                    if pending.as_ref().is_some_and(|p| p.tx_id == tx_id) {
                        trace!(tx_id, "Pending transaction released");
                        pending = None;
                    }
                }
            },

            item = inbound.recv() => {
                let Some(item) = item else {
                    warn!("Frame link closed, stopping dispatch");
                    break;
                };

                if item.is_err() {
                    counters.framing_errors.fetch_add(1, Ordering::Relaxed);
                }

                match (&pending, item) {
                    (Some(tx), item) => {
                        if tx.sender.try_send(item).is_err() {
                            warn!(
                                tx_id = tx.tx_id,
                                "Pending transaction not draining, frame dropped"
                            );
                        }
                    }
                    (None, Ok(packet)) => {
                        counters.unsolicited.fetch_add(1, Ordering::Relaxed);
                        let error = Error::UnsolicitedFrame {
                            message_type: packet.message_type(),
                        };
                        warn!(%packet, "{error}");
                    }
                    (None, Err(e)) => {
                        debug!(error = %e, "Framing error with no transaction pending");
                    }
                }
            }
        }
    }

    cancel.cancel();
    debug!("Dispatch loop stopped");
}
