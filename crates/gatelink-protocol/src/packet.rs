use bytes::{BufMut, Bytes, BytesMut};
use gatelink_core::{
    Address, FramingError, Result,
    constants::{FRAME_OVERHEAD, MAX_ADDRESS, MAX_ASCII, MAX_PAYLOAD_LEN, START_OF_MESSAGE},
};
use std::fmt;

/// Packet is one validated frame of the gate controller protocol.
///
/// # Wire Format
///
/// ```text
/// FF 01 03 56 31 32 44
/// ^^ ^^ ^^ ^^ ^^^^^ ^^
/// |  |  |  |  |     checksum: (FF+01+03+56+31+32+44) mod 256 == 0
/// |  |  |  |  payload ("12")
/// |  |  |  message type ('V')
/// |  |  size: type byte + payload bytes
/// |  address
/// start-of-message
/// ```
///
/// A packet is immutable once built: the checksum is computed in the
/// constructor (outbound) or verified by the codec (inbound).
///
/// # Basic Usage
///
/// ```
/// use gatelink_protocol::Packet;
///
/// let packet = Packet::new(1, b'V', &b"12"[..]).unwrap();
/// assert_eq!(packet.size(), 3);
/// assert!(packet.verify_checksum().is_ok());
///
/// let bytes = packet.to_bytes();
/// assert_eq!(bytes[0], 0xFF);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    address: u8,
    message_type: u8,
    payload: Bytes,
    checksum: u8,
}

impl Packet {
    /// Build an outbound packet, validating every field and computing the
    /// checksum.
    ///
    /// # Errors
    /// Returns `Error::Framing` if the address is 255, the payload is longer
    /// than 253 bytes, or the type or any payload byte is above 127.
    pub fn new(address: u8, message_type: u8, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        validate_fields(address, message_type, &payload)?;
        Ok(Self::from_validated(address, message_type, payload))
    }

    /// Build a request packet from parts that are valid by construction.
    pub(crate) fn request(address: Address, message_type: u8, payload: impl Into<Bytes>) -> Self {
        Self::from_validated(address.as_u8(), message_type, payload.into())
    }

    /// Assemble a packet received from the wire, keeping its checksum as-is.
    pub(crate) fn from_wire(address: u8, message_type: u8, payload: Bytes, checksum: u8) -> Self {
        Self {
            address,
            message_type,
            payload,
            checksum,
        }
    }

    fn from_validated(address: u8, message_type: u8, payload: Bytes) -> Self {
        let mut packet = Self {
            address,
            message_type,
            payload,
            checksum: 0,
        };
        packet.checksum = checksum(&packet.checksummed_bytes());
        packet
    }

    /// Device address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// ASCII message type.
    pub fn message_type(&self) -> u8 {
        self.message_type
    }

    /// Payload bytes following the message type.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Checksum byte.
    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    /// Message size field: type byte plus payload.
    pub fn size(&self) -> u8 {
        // payload length is bounded by MAX_PAYLOAD_LEN on every construction path
        (self.payload.len() + 1) as u8
    }

    /// Total length of the frame on the wire.
    pub fn frame_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Serialize the complete frame including start-of-message and checksum.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.frame_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Append the complete frame to `dst`.
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.frame_len());
        dst.put_u8(START_OF_MESSAGE);
        dst.put_u8(self.address);
        dst.put_u8(self.size());
        dst.put_u8(self.message_type);
        dst.put_slice(&self.payload);
        dst.put_u8(self.checksum);
    }

    /// Check that every frame byte, start-of-message included, sums to zero
    /// mod 256.
    ///
    /// # Errors
    /// Returns `FramingError::InvalidChecksum` carrying the residual sum.
    pub fn verify_checksum(&self) -> std::result::Result<(), FramingError> {
        let sum = byte_sum(&self.checksummed_bytes()).wrapping_add(self.checksum);
        if sum == 0 {
            Ok(())
        } else {
            Err(FramingError::InvalidChecksum { sum })
        }
    }

    /// Check the field-range invariants of the packet.
    pub fn validate(&self) -> std::result::Result<(), FramingError> {
        validate_fields(self.address, self.message_type, &self.payload)
    }

    /// Payload as text, for logging and version strings.
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Every frame byte except the checksum itself.
    fn checksummed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.payload.len() + 4);
        bytes.push(START_OF_MESSAGE);
        bytes.push(self.address);
        bytes.push(self.size());
        bytes.push(self.message_type);
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Compute the checksum for the given frame bytes (start-of-message
/// included, checksum excluded): sum mod 256, complement, add one.
///
/// # Example
///
/// ```
/// use gatelink_protocol::packet::checksum;
///
/// let bytes = [0xFF, 0x01, 0x01, b'S'];
/// assert_eq!(checksum(&bytes), 0xAC);
///
/// let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
/// assert_eq!(sum.wrapping_add(checksum(&bytes)), 0);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    (!byte_sum(bytes)).wrapping_add(1)
}

fn byte_sum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn validate_fields(
    address: u8,
    message_type: u8,
    payload: &[u8],
) -> std::result::Result<(), FramingError> {
    if address > MAX_ADDRESS {
        return Err(FramingError::InvalidAddress { byte: address });
    }

    if payload.len() > MAX_PAYLOAD_LEN {
        // size byte would exceed MAX_MESSAGE_SIZE
        let size = (payload.len() + 1).min(u8::MAX as usize) as u8;
        return Err(FramingError::InvalidMessageSize { size });
    }

    if message_type > MAX_ASCII {
        return Err(FramingError::InvalidMessageType { byte: message_type });
    }

    if let Some(&byte) = payload.iter().find(|&&b| b > MAX_ASCII) {
        return Err(FramingError::InvalidMessageByte { byte });
    }

    Ok(())
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex: String = self
            .payload
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "Packet[addr={}, type='{}', size={}, payload=[{}], checksum={:02X}]",
            self.address,
            self.message_type as char,
            self.size(),
            hex,
            self.checksum
        )
    }
}
