//! Tokio codec for gate controller frames.
//!
//! `GateCodec` turns a raw RS-485 byte stream into [`Packet`]s and back. The
//! decoder is a byte-level state machine:
//!
//! ```text
//! WaitingStart -> ReadingAddress -> ReadingSize -> ReadingType
//!              -> ReadingPayload (size-1 bytes) -> ReadingChecksum
//! ```
//!
//! # Resynchronization
//!
//! Framing errors never terminate the stream. The decoder yields
//! `Some(Err(FramingError))` as an item, drops the frame in progress and goes
//! back to scanning for the start-of-message byte:
//!
//! - bytes before a start-of-message are discarded silently
//! - a `0xFF` anywhere after the start-of-message, checksum position
//!   included, yields [`FramingError::UnexpectedByte`] and is left in the
//!   buffer, so it starts the next frame
//! - an out-of-range size, type or payload byte abandons the frame at once
//! - a bad checksum yields [`FramingError::InvalidChecksum`]
//!
//! # Inter-byte deadline
//!
//! The codec has no clock. The reader task checks [`GateCodec::in_frame`]
//! and, when the next byte fails to arrive within the deadline, calls
//! [`GateCodec::abandon_frame`] and reports a `ByteTimeout`.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use gatelink_protocol::{GateCodec, Packet};
//!
//! let mut codec = GateCodec::new();
//! let packet = Packet::new(1, b'V', &b"12"[..]).unwrap();
//!
//! // Garbage before the frame is skipped
//! let mut buf = BytesMut::from(&b"\x00\x13"[..]);
//! buf.extend_from_slice(&packet.to_bytes());
//!
//! let decoded = codec.decode(&mut buf).unwrap().unwrap().unwrap();
//! assert_eq!(decoded, packet);
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::Packet;
use gatelink_core::{
    Error, FramingError,
    constants::{MAX_ASCII, MAX_MESSAGE_SIZE, START_OF_MESSAGE},
};

/// Position of the decoder inside the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Scanning for the start-of-message byte.
    WaitingStart,
    ReadingAddress,
    ReadingSize,
    ReadingType,
    ReadingPayload,
    ReadingChecksum,
}

/// Tokio codec for gate controller frames.
#[derive(Debug)]
pub struct GateCodec {
    state: ParserState,
    address: u8,
    size: u8,
    message_type: u8,
    payload: BytesMut,
    /// Bytes skipped while scanning for a start-of-message.
    discarded: u64,
}

impl GateCodec {
    /// Create a codec waiting for the first start-of-message byte.
    pub fn new() -> Self {
        Self {
            state: ParserState::WaitingStart,
            address: 0,
            size: 0,
            message_type: 0,
            payload: BytesMut::with_capacity(MAX_MESSAGE_SIZE as usize),
            discarded: 0,
        }
    }

    /// Current parser state.
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Whether a start-of-message has been seen and the frame is incomplete.
    pub fn in_frame(&self) -> bool {
        self.state != ParserState::WaitingStart
    }

    /// Drop the frame in progress and resume scanning.
    pub fn abandon_frame(&mut self) {
        if self.in_frame() {
            trace!(state = ?self.state, "Abandoning partial frame");
        }
        self.reset();
    }

    /// Total bytes discarded while scanning for a start-of-message.
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    fn reset(&mut self) {
        self.state = ParserState::WaitingStart;
        self.address = 0;
        self.size = 0;
        self.message_type = 0;
        self.payload.clear();
    }

    fn fail(&mut self, error: FramingError) -> Option<std::result::Result<Packet, FramingError>> {
        self.reset();
        Some(Err(error))
    }

    /// Feed one byte, returning a finished item when the byte completes or
    /// breaks a frame. The caller has already consumed `byte`.
    fn step(&mut self, byte: u8) -> Option<std::result::Result<Packet, FramingError>> {
        match self.state {
            ParserState::WaitingStart => {
                if byte == START_OF_MESSAGE {
                    self.state = ParserState::ReadingAddress;
                } else {
                    self.discarded += 1;
                }
                None
            }
            ParserState::ReadingAddress => {
                self.address = byte;
                self.state = ParserState::ReadingSize;
                None
            }
            ParserState::ReadingSize => {
                if byte == 0 || byte > MAX_MESSAGE_SIZE {
                    return self.fail(FramingError::InvalidMessageSize { size: byte });
                }
                self.size = byte;
                self.state = ParserState::ReadingType;
                None
            }
            ParserState::ReadingType => {
                if byte > MAX_ASCII {
                    return self.fail(FramingError::InvalidMessageType { byte });
                }
                self.message_type = byte;
                self.state = if self.size == 1 {
                    ParserState::ReadingChecksum
                } else {
                    ParserState::ReadingPayload
                };
                None
            }
            ParserState::ReadingPayload => {
                if byte > MAX_ASCII {
                    return self.fail(FramingError::InvalidMessageByte { byte });
                }
                self.payload.extend_from_slice(&[byte]);
                if self.payload.len() + 1 == self.size as usize {
                    self.state = ParserState::ReadingChecksum;
                }
                None
            }
            ParserState::ReadingChecksum => {
                let packet = Packet::from_wire(
                    self.address,
                    self.message_type,
                    self.payload.split().freeze(),
                    byte,
                );
                self.reset();
                Some(packet.verify_checksum().map(|()| packet))
            }
        }
    }
}

impl Default for GateCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for GateCodec {
    type Item = std::result::Result<Packet, FramingError>;
    type Error = Error;

    /// Decode the next packet or framing error from the buffer.
    ///
    /// Returns `Ok(None)` when the buffer is exhausted mid-frame; the partial
    /// frame is kept in the codec and completed by later calls.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while src.has_remaining() {
            let byte = src[0];

            // Sentinel inside a frame: report it and leave it for the next frame
            if byte == START_OF_MESSAGE && self.in_frame() {
                return Ok(self.fail(FramingError::UnexpectedByte { byte }));
            }

            src.advance(1);
            if let Some(item) = self.step(byte) {
                return Ok(Some(item));
            }
        }

        Ok(None)
    }

    /// A partial frame at end of stream is dropped without an error.
    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None => {
                self.abandon_frame();
                Ok(None)
            }
        }
    }
}

impl Encoder<Packet> for GateCodec {
    type Error = Error;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        packet.write_to(dst);
        Ok(())
    }
}

impl Encoder<&Packet> for GateCodec {
    type Error = Error;

    fn encode(&mut self, packet: &Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        packet.write_to(dst);
        Ok(())
    }
}
