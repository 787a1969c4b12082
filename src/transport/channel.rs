//! Framed peer channel over an ordered byte stream.
//!
//! A [`PeerChannel`] owns the write half of a negotiated stream; a background
//! reader task turns the read half into [`ChannelEvent`]s. Frames are u32-LE
//! length-prefixed payloads. `Open` and `Closed` are each delivered at most
//! once.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE};

/// Transport channel errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The channel is no longer established.
    #[error("channel closed")]
    Closed,

    /// Frame payload exceeds the accepted maximum.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Offending payload size.
        size: usize,
        /// Accepted maximum.
        max: usize,
    },

    /// Underlying stream I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Connectivity notifications from a channel, delivered in order.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel became established. Emitted exactly once, first.
    Open,
    /// One inbound frame payload.
    Message(Vec<u8>),
    /// The channel closed (peer hangup or stream error). Emitted at most
    /// once, last.
    Closed,
}

/// Write side of an established peer channel.
///
/// Constructed from any ordered reliable stream; production code hands it a
/// negotiated TCP stream, tests an in-memory duplex pipe.
pub struct PeerChannel {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    established: bool,
}

impl std::fmt::Debug for PeerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerChannel")
            .field("established", &self.established)
            .finish()
    }
}

impl PeerChannel {
    /// Wrap an established stream, spawning the reader task.
    ///
    /// Returns the channel and the receiver for its events.
    pub fn from_stream<S>(stream: S) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(read_loop(read_half, tx));
        (
            Self {
                writer: Box::new(write_half),
                established: true,
            },
            rx,
        )
    }

    /// Whether the channel is still established.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Transmit one frame. Only valid while established.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.established {
            return Err(TransportError::Closed);
        }
        if payload.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        let header = (payload.len() as u32).to_le_bytes();
        self.writer.write_all(&header).await?;
        self.writer.write_all(payload).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Shut down the write side and mark the channel closed.
    pub async fn close(&mut self) {
        if self.established {
            self.established = false;
            let _ = self.writer.shutdown().await;
        }
    }

    /// Mark the channel closed without touching the stream (used when the
    /// reader already observed a hangup).
    pub fn mark_closed(&mut self) {
        self.established = false;
    }
}

async fn read_loop<R>(mut reader: R, tx: mpsc::UnboundedSender<ChannelEvent>)
where
    R: AsyncRead + Send + Unpin,
{
    if tx.send(ChannelEvent::Open).is_err() {
        return;
    }
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(frame)) => {
                if tx.send(ChannelEvent::Message(frame)).is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(err) => {
                debug!(%err, "channel read failed");
                break;
            }
        }
    }
    let _ = tx.send(ChannelEvent::Closed);
}

/// Read one length-prefixed frame. `Ok(None)` on clean EOF at a frame
/// boundary.
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}
