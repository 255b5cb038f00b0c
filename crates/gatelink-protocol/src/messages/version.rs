use super::{Message, Transaction};
use crate::Packet;
use bytes::Bytes;
use gatelink_core::{Address, Result, constants::MSG_VERSION};
use serde::Serialize;

/// Firmware version reported by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// Firmware version request.
#[derive(Debug, Clone)]
pub struct VersionTransaction {
    packet: Packet,
}

impl VersionTransaction {
    pub fn new(address: Address) -> Self {
        Self {
            packet: Packet::request(address, MSG_VERSION, Bytes::new()),
        }
    }
}

impl Message for VersionTransaction {
    fn packet(&self) -> &Packet {
        &self.packet
    }

    fn name(&self) -> &'static str {
        "version"
    }
}

impl Transaction for VersionTransaction {
    type Response = VersionResponse;

    fn response_type(&self) -> u8 {
        MSG_VERSION
    }

    fn decode(&self, packet: &Packet) -> Result<VersionResponse> {
        Ok(VersionResponse {
            version: packet.payload_str(),
        })
    }
}
