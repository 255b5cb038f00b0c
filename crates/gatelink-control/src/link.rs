//! Frame link: the reader and writer tasks around a byte stream.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐   Result<Packet, FramingError>
//!  byte stream ──>│ reader task  │──────────────────────────────> inbound rx
//!       ^         │  GateCodec   │
//!       │         └──────────────┘
//!       │         ┌──────────────┐
//!       └─────────│ writer task  │<────────────────────────────── outbound tx
//!                 │ FramedWrite  │   Packet
//!                 └──────────────┘
//! ```
//!
//! The two tasks never wait on each other. The reader applies the inter-byte
//! deadline only while a frame is in progress, so an idle line never times
//! out. Both tasks share a [`CancellationToken`]: closing the link, EOF or an
//! I/O error on either side stops both, and the inbound channel closes once
//! the reader exits.

use bytes::BytesMut;
use futures::SinkExt;
use gatelink_core::{Error, FramingError, Result, constants::BYTE_TIMEOUT};
use gatelink_protocol::{GateCodec, Packet};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite},
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::{
    codec::{Decoder, FramedWrite},
    sync::CancellationToken,
};
use tracing::{debug, error, info, trace, warn};

/// Item produced by the reader task.
pub type FrameResult = std::result::Result<Packet, FramingError>;

/// Frame link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Deadline for each byte once a frame has started.
    #[serde(with = "gatelink_core::duration_ms", rename = "byte_timeout_ms")]
    pub byte_timeout: Duration,

    /// Capacity of the outbound packet queue.
    pub outbound_capacity: usize,

    /// Capacity of the inbound frame queue.
    pub inbound_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            byte_timeout: BYTE_TIMEOUT,
            outbound_capacity: 1,
            inbound_capacity: 32,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.byte_timeout.is_zero() {
            return Err(Error::config("link.byte_timeout_ms must be greater than 0"));
        }
        if self.outbound_capacity == 0 || self.inbound_capacity == 0 {
            return Err(Error::config("link queue capacities must be greater than 0"));
        }
        Ok(())
    }
}

/// Handle to the running reader and writer tasks.
#[derive(Debug)]
pub struct FrameLink {
    outbound: mpsc::Sender<Packet>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl FrameLink {
    /// Split `stream` and spawn the reader and writer tasks.
    ///
    /// Returns the link handle and the receiver of decoded frames.
    pub fn spawn<S>(stream: S, config: &LinkConfig) -> (Self, mpsc::Receiver<FrameResult>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity.max(1));
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
        let cancel = CancellationToken::new();

        let reader = tokio::spawn(read_loop(
            read_half,
            inbound_tx,
            cancel.clone(),
            config.byte_timeout,
        ));
        let writer = tokio::spawn(write_loop(write_half, outbound_rx, cancel.clone()));

        debug!(byte_timeout_ms = config.byte_timeout.as_millis() as u64, "Frame link started");

        (
            Self {
                outbound: outbound_tx,
                cancel,
                reader,
                writer,
            },
            inbound_rx,
        )
    }

    /// Sender feeding the writer task.
    pub fn sender(&self) -> mpsc::Sender<Packet> {
        self.outbound.clone()
    }

    /// Token cancelled when the link stops for any reason.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop both tasks. Safe to call more than once.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("Closing frame link");
            self.cancel.cancel();
        }
    }

    /// Close the link and wait for both tasks to exit.
    pub async fn shutdown(mut self) {
        self.close();
        if let Err(e) = (&mut self.reader).await {
            warn!(error = %e, "Reader task ended abnormally");
        }
        if let Err(e) = (&mut self.writer).await {
            warn!(error = %e, "Writer task ended abnormally");
        }
    }
}

impl Drop for FrameLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_loop<R>(
    mut reader: R,
    inbound: mpsc::Sender<FrameResult>,
    cancel: CancellationToken,
    byte_timeout: Duration,
) where
    R: AsyncRead + Unpin,
{
    let mut codec = GateCodec::new();
    let mut buf = BytesMut::with_capacity(256);

    'outer: loop {
        // Drain every complete item before reading more
        loop {
            match codec.decode(&mut buf) {
                Ok(Some(item)) => {
                    match &item {
                        Ok(packet) => trace!(%packet, "Frame received"),
                        Err(e) => debug!(error = %e, "Framing error, resynchronizing"),
                    }
                    if inbound.send(item).await.is_err() {
                        debug!("Inbound receiver dropped");
                        break 'outer;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(error = %e, "Decoder failed");
                    break 'outer;
                }
            }
        }

        let in_frame = codec.in_frame();
        let read = async {
            if in_frame {
                tokio::time::timeout(byte_timeout, reader.read_buf(&mut buf))
                    .await
                    .ok()
            } else {
                Some(reader.read_buf(&mut buf).await)
            }
        };

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = read => result,
        };

        match result {
            Some(Ok(0)) => {
                info!("Byte stream closed by peer");
                break;
            }
            Some(Ok(n)) => trace!(bytes = n, "Read from byte stream"),
            Some(Err(e)) => {
                error!(error = %e, "Read failed");
                break;
            }
            None => {
                codec.abandon_frame();
                let timeout_ms = byte_timeout.as_millis() as u64;
                debug!(timeout_ms, "Inter-byte deadline expired, frame abandoned");
                if inbound
                    .send(Err(FramingError::ByteTimeout { timeout_ms }))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    cancel.cancel();
    debug!(discarded = codec.discarded_bytes(), "Reader task stopped");
}

async fn write_loop<W>(writer: W, mut outbound: mpsc::Receiver<Packet>, cancel: CancellationToken)
where
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(writer, GateCodec::new());

    loop {
        let packet = tokio::select! {
            _ = cancel.cancelled() => break,
            packet = outbound.recv() => match packet {
                Some(packet) => packet,
                None => break,
            },
        };

        trace!(%packet, "Writing frame");
        if let Err(e) = framed.send(packet).await {
            error!(error = %e, "Write failed");
            break;
        }
    }

    cancel.cancel();
    debug!("Writer task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (local, mut remote) = tokio::io::duplex(256);
        let (link, mut inbound) = FrameLink::spawn(local, &LinkConfig::default());

        let request = Packet::new(1, b'S', Bytes::new()).unwrap();
        link.sender().send(request.clone()).await.unwrap();

        let mut written = vec![0u8; request.frame_len()];
        remote.read_exact(&mut written).await.unwrap();
        assert_eq!(written, request.to_bytes().to_vec());

        let response = Packet::new(1, b'F', &b"00"[..]).unwrap();
        remote.write_all(&response.to_bytes()).await.unwrap();
        assert_eq!(inbound.recv().await, Some(Ok(response)));

        link.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_byte_timeout_abandons_frame() {
        let (local, mut remote) = tokio::io::duplex(256);
        let (link, mut inbound) = FrameLink::spawn(local, &LinkConfig::default());

        // half a frame, then silence
        remote.write_all(&[0xFF, 0x01, 0x03]).await.unwrap();
        let item = inbound.recv().await;
        assert_eq!(item, Some(Err(FramingError::ByteTimeout { timeout_ms: 500 })));

        // the stream keeps working afterwards
        let packet = Packet::new(1, b'V', &b"12"[..]).unwrap();
        remote.write_all(&packet.to_bytes()).await.unwrap();
        assert_eq!(inbound.recv().await, Some(Ok(packet)));

        assert!(!link.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_line_never_times_out() {
        let (local, _remote) = tokio::io::duplex(256);
        let (_link, mut inbound) = FrameLink::spawn(local, &LinkConfig::default());

        let waited = tokio::time::timeout(Duration::from_secs(5), inbound.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_eof_closes_link() {
        let (local, remote) = tokio::io::duplex(256);
        let (link, mut inbound) = FrameLink::spawn(local, &LinkConfig::default());

        drop(remote);
        assert_eq!(inbound.recv().await, None);
        link.cancellation_token().cancelled().await;
        assert!(link.is_closed());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (local, _remote) = tokio::io::duplex(256);
        let (link, mut inbound) = FrameLink::spawn(local, &LinkConfig::default());

        link.close();
        link.close();
        assert_eq!(inbound.recv().await, None);
        link.shutdown().await;
    }

    #[test]
    fn test_validate() {
        assert!(LinkConfig::default().validate().is_ok());
        let config = LinkConfig {
            byte_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
