use super::{Message, Transaction};
use crate::Packet;
use gatelink_core::{Address, Result, constants::MSG_GATE_CONTROL};
use serde::{Deserialize, Serialize};

/// Gate control command flags.
///
/// Encoded as eight ASCII `'0'`/`'1'` characters in field order. Emergency
/// close, open interlock and block-exit-detector are latched by the operator
/// until a later command clears them.
///
/// # Example
///
/// ```
/// use gatelink_protocol::GateControlRequest;
///
/// let request = GateControlRequest {
///     push_button_open: true,
///     ..Default::default()
/// };
/// assert_eq!(&request.payload(), b"10000000");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateControlRequest {
    pub address: Address,
    pub push_button_open: bool,
    pub push_button_close: bool,
    pub push_button_stop: bool,
    pub open_partial: bool,
    pub emergency_open: bool,
    pub emergency_close: bool,
    pub open_interlock: bool,
    pub block_exit_vehicle_detector: bool,
}

impl GateControlRequest {
    /// Request with every flag cleared.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// ASCII payload in wire order.
    pub fn payload(&self) -> [u8; 8] {
        [
            self.push_button_open,
            self.push_button_close,
            self.push_button_stop,
            self.open_partial,
            self.emergency_open,
            self.emergency_close,
            self.open_interlock,
            self.block_exit_vehicle_detector,
        ]
        .map(|flag| if flag { b'1' } else { b'0' })
    }
}

/// Gate control request. The operator acknowledges with an empty `C` frame.
#[derive(Debug, Clone)]
pub struct GateControlTransaction {
    request: GateControlRequest,
    packet: Packet,
}

impl GateControlTransaction {
    pub fn new(request: GateControlRequest) -> Self {
        let payload = request.payload().to_vec();
        Self {
            request,
            packet: Packet::request(request.address, MSG_GATE_CONTROL, payload),
        }
    }

    pub fn request(&self) -> &GateControlRequest {
        &self.request
    }
}

impl Message for GateControlTransaction {
    fn packet(&self) -> &Packet {
        &self.packet
    }

    fn name(&self) -> &'static str {
        "gate_control"
    }
}

impl Transaction for GateControlTransaction {
    type Response = ();

    fn response_type(&self) -> u8 {
        MSG_GATE_CONTROL
    }

    fn decode(&self, _packet: &Packet) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_push_button_open_encoding() {
        let request = GateControlRequest {
            push_button_open: true,
            ..GateControlRequest::new(Address::default())
        };
        let tx = GateControlTransaction::new(request);

        assert_eq!(tx.packet().message_type(), b'C');
        assert_eq!(tx.packet().payload(), b"10000000");
        assert_eq!(tx.packet().size(), 9);
    }

    #[rstest]
    #[case(GateControlRequest { push_button_stop: true, ..Default::default() }, b"00100000")]
    #[case(GateControlRequest { emergency_close: true, ..Default::default() }, b"00000100")]
    #[case(
        GateControlRequest { block_exit_vehicle_detector: true, ..Default::default() },
        b"00000001"
    )]
    #[case(GateControlRequest::default(), b"00000000")]
    fn test_flag_order(#[case] request: GateControlRequest, #[case] expected: &[u8; 8]) {
        assert_eq!(&request.payload(), expected);
    }

    #[test]
    fn test_acknowledgement() {
        let tx = GateControlTransaction::new(GateControlRequest::default());
        let ack = Packet::new(1, b'C', bytes::Bytes::new()).unwrap();
        assert!(tx.accepts(&ack));
        assert!(tx.decode(&ack).is_ok());
    }
}
