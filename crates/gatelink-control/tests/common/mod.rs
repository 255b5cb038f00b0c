//! Shared helpers for controller integration tests.
//!
//! [`SimulatedGate`] is the far end of an in-memory duplex stream speaking
//! the frame protocol, so each test scripts the device side request by
//! request.

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use gatelink_control::{ControllerConfig, GateController, LinkConfig};
use gatelink_protocol::{GateCodec, Packet};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

pub const STATUS_SAMPLE: &[u8] =
    b"0404141010000000000000000000000000180000000162680003DF02BA1A000000000000E326002800005E750A6F";

/// Device side of the duplex stream.
pub struct SimulatedGate {
    framed: Framed<DuplexStream, GateCodec>,
}

impl SimulatedGate {
    /// Next request written by the controller.
    pub async fn next_request(&mut self) -> Packet {
        self.framed
            .next()
            .await
            .expect("controller closed the stream")
            .expect("decoder failed")
            .expect("framing error on request")
    }

    /// Assert the controller writes nothing for `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        let next = tokio::time::timeout(window, self.framed.next()).await;
        assert!(next.is_err(), "unexpected request: {next:?}");
    }

    /// Write raw bytes, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.framed.get_mut().write_all(bytes).await.unwrap();
    }

    pub async fn reply(&mut self, message_type: u8, payload: &'static [u8]) {
        let packet = Packet::new(1, message_type, payload).unwrap();
        self.framed.send(packet).await.unwrap();
    }

    /// Answer the next request with a frame of the given type.
    pub async fn answer(
        &mut self,
        expected: u8,
        message_type: u8,
        payload: &'static [u8],
    ) -> Packet {
        let request = self.next_request().await;
        assert_eq!(request.message_type(), expected);
        self.reply(message_type, payload).await;
        request
    }
}

/// Controller with default settings wired to a simulated gate.
pub fn connect() -> (GateController, SimulatedGate) {
    connect_with(ControllerConfig::default())
}

pub fn connect_with(config: ControllerConfig) -> (GateController, SimulatedGate) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("gatelink_control=debug")
        .try_init();

    let (local, remote) = tokio::io::duplex(1024);
    let controller = GateController::spawn(local, &LinkConfig::default(), config);
    let gate = SimulatedGate {
        framed: Framed::new(remote, GateCodec::new()),
    };
    (controller, gate)
}
