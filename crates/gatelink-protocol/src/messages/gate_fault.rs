use super::{Message, PayloadReader, Transaction};
use crate::{FaultCode, Packet};
use bytes::Bytes;
use gatelink_core::{Address, Error, Result, constants::MSG_GATE_FAULT};
use serde::Serialize;

/// Decoded fault snapshot.
///
/// The payload is a two-digit decimal count followed by that many two-digit
/// hex codes. Firmware pads the list with `-`; anything past the declared
/// count is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateFaultResponse {
    pub number_of_faults: u8,
    pub fault_codes: Vec<FaultCode>,
}

impl GateFaultResponse {
    /// Decode a fault payload.
    ///
    /// # Errors
    /// Returns `Error::InvalidResponse` for an empty payload, a non-decimal
    /// count, or fewer code pairs than the count declares.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::invalid_response("empty fault payload"));
        }

        let mut reader = PayloadReader::new(payload);
        let number_of_faults = reader.decimal(2)?;
        let fault_codes = (0..number_of_faults)
            .map(|_| reader.hex(2).map(|code| FaultCode::new(code as u8)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            number_of_faults,
            fault_codes,
        })
    }

    pub fn has_faults(&self) -> bool {
        self.number_of_faults > 0
    }

    /// Names of the fields that differ from `other`.
    pub fn diff(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.number_of_faults != other.number_of_faults {
            changed.push("number_of_faults");
        }
        if self.fault_codes != other.fault_codes {
            changed.push("fault_codes");
        }
        changed
    }
}

/// Gate fault request.
#[derive(Debug, Clone)]
pub struct GateFaultTransaction {
    packet: Packet,
}

impl GateFaultTransaction {
    pub fn new(address: Address) -> Self {
        Self {
            packet: Packet::request(address, MSG_GATE_FAULT, Bytes::new()),
        }
    }
}

impl Message for GateFaultTransaction {
    fn packet(&self) -> &Packet {
        &self.packet
    }

    fn name(&self) -> &'static str {
        "gate_fault"
    }
}

impl Transaction for GateFaultTransaction {
    type Response = GateFaultResponse;

    fn response_type(&self) -> u8 {
        MSG_GATE_FAULT
    }

    fn decode(&self, packet: &Packet) -> Result<GateFaultResponse> {
        GateFaultResponse::decode(packet.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_fault() {
        let response = GateFaultResponse::decode(b"01A1--------------").unwrap();
        assert_eq!(response.number_of_faults, 1);
        assert_eq!(response.fault_codes, vec![FaultCode::new(0xA1)]);
        assert!(response.has_faults());
    }

    #[test]
    fn test_decode_no_faults() {
        let response = GateFaultResponse::decode(b"00----------------").unwrap();
        assert_eq!(response, GateFaultResponse::default());
    }

    #[test]
    fn test_decode_multiple_faults() {
        let response = GateFaultResponse::decode(b"03002B8F").unwrap();
        let names: Vec<_> = response.fault_codes.iter().map(FaultCode::name).collect();
        assert_eq!(names, vec![Some("FAL1"), Some("AL13"), Some("AL19")]);
    }

    #[test]
    fn test_decode_truncated_list() {
        assert!(matches!(
            GateFaultResponse::decode(b"02A1"),
            Err(Error::InvalidResponse { .. })
        ));
        assert!(GateFaultResponse::decode(b"").is_err());
        assert!(GateFaultResponse::decode(b"x1").is_err());
    }

    #[test]
    fn test_diff() {
        let a = GateFaultResponse::decode(b"01A1").unwrap();
        let b = GateFaultResponse::decode(b"0190").unwrap();
        assert_eq!(a.diff(&b), vec!["fault_codes"]);
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn test_fault_transaction() {
        let tx = GateFaultTransaction::new(Address::default());
        assert_eq!(tx.packet().message_type(), b'F');
        let response = Packet::new(1, b'F', &b"00"[..]).unwrap();
        assert!(tx.accepts(&response));
        assert_eq!(tx.decode(&response).unwrap().number_of_faults, 0);
    }
}
