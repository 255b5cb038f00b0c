use super::Message;
use crate::Packet;
use bytes::Bytes;
use gatelink_core::{Address, constants::MSG_RESET};

/// Reset request. The device restarts and sends no response.
#[derive(Debug, Clone)]
pub struct ResetMessage {
    packet: Packet,
}

impl ResetMessage {
    pub fn new(address: Address) -> Self {
        Self {
            packet: Packet::request(address, MSG_RESET, Bytes::new()),
        }
    }
}

impl Message for ResetMessage {
    fn packet(&self) -> &Packet {
        &self.packet
    }

    fn name(&self) -> &'static str {
        "reset"
    }
}
