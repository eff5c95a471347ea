//! SQream frame structure and I/O.

use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::message::{write_frame_header, Message, TextMessage};
use crate::protocol::messages::Ping;

/// A bidirectional byte stream a connection can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Boxed transport, as returned by a `Connector`.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Parsed 10-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol version the peer speaks.
    pub version: u8,
    /// `FRAME_KIND_TEXT` or `FRAME_KIND_BINARY`.
    pub kind: u8,
    /// Payload length in bytes.
    pub length: usize,
}

impl FrameHeader {
    /// Parse and validate a received header.
    pub fn parse(bytes: &[u8; FRAME_HEADER_SIZE]) -> Result<Self> {
        let version = bytes[0];
        if !SUPPORTED_PROTOCOL_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedProtocolVersion {
                version,
                supported: SUPPORTED_PROTOCOL_VERSIONS,
            });
        }

        let kind = bytes[1];
        if kind != FRAME_KIND_TEXT && kind != FRAME_KIND_BINARY {
            return Err(Error::protocol(format!("Unknown frame kind {}", kind)));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[2..]);
        let length = i64::from_le_bytes(len_bytes);
        let length = usize::try_from(length)
            .ok()
            .filter(|&len| len <= MAX_FRAME_SIZE)
            .ok_or_else(|| Error::protocol(format!("Invalid frame length {}", length)))?;

        Ok(Self {
            version,
            kind,
            length,
        })
    }
}

/// A received frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Frame payload (excluding header).
    pub payload: Bytes,
}

impl Frame {
    /// Whether this frame carries JSON.
    pub fn is_text(&self) -> bool {
        self.header.kind == FRAME_KIND_TEXT
    }

    /// The payload of a text frame, as UTF-8.
    pub fn text(&self) -> Result<&str> {
        if !self.is_text() {
            return Err(Error::UnexpectedFrameKind {
                expected: FRAME_KIND_TEXT,
                actual: self.header.kind,
            });
        }
        std::str::from_utf8(&self.payload)
            .map_err(|e| Error::protocol(format!("Text frame is not UTF-8: {}", e)))
    }

    /// The payload of a binary frame.
    pub fn into_binary(self) -> Result<Bytes> {
        if self.header.kind != FRAME_KIND_BINARY {
            return Err(Error::UnexpectedFrameKind {
                expected: FRAME_KIND_BINARY,
                actual: self.header.kind,
            });
        }
        Ok(self.payload)
    }
}

/// Frame reader/writer over a transport stream.
///
/// The stream is split so a pending read survives a keep-alive write.
pub struct FrameStream {
    reader: ReadHalf<BoxedStream>,
    writer: WriteHalf<BoxedStream>,
}

impl FrameStream {
    /// Create a new frame stream.
    pub fn new(stream: BoxedStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self { reader, writer }
    }

    /// Swap in a new transport, dropping the old one.
    pub fn replace(&mut self, stream: BoxedStream) {
        *self = Self::new(stream);
    }

    /// Read one frame.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        read_frame_from(&mut self.reader).await
    }

    /// Read one frame, sending a ping every `interval` until it arrives.
    ///
    /// With `None`, this is `read_frame`. No ping is sent once the frame is
    /// complete.
    pub async fn read_frame_with_keepalive(&mut self, interval: Option<Duration>) -> Result<Frame> {
        let Some(period) = interval else {
            return self.read_frame().await;
        };

        let ping = TextMessage::new(&Ping)?;
        let read = read_frame_from(&mut self.reader);
        tokio::pin!(read);
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                frame = &mut read => return frame,
                _ = ticker.tick() => {
                    debug!("keep-alive ping");
                    write_message(&mut self.writer, &ping).await?;
                }
            }
        }
    }

    /// Send a message as one frame.
    pub async fn send_message<M: Message>(&mut self, msg: &M) -> Result<()> {
        write_message(&mut self.writer, msg).await
    }

    /// Serialize a command to JSON and send it as a text frame.
    pub async fn send_command<T: Serialize>(&mut self, command: &T) -> Result<()> {
        self.send_message(&TextMessage::new(command)?).await
    }

    /// Flush and shut down the write side.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

async fn read_frame_from(reader: &mut ReadHalf<BoxedStream>) -> Result<Frame> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    read_exact(reader, &mut header).await?;
    let header = FrameHeader::parse(&header)?;

    let mut payload = Vec::new();
    payload.try_reserve_exact(header.length).map_err(|e| {
        Error::protocol(format!("Cannot buffer {}-byte frame: {}", header.length, e))
    })?;
    payload.resize(header.length, 0);
    read_exact(reader, &mut payload).await?;
    trace!(kind = header.kind, len = header.length, "received frame");

    Ok(Frame {
        header,
        payload: Bytes::from(payload),
    })
}

async fn read_exact(reader: &mut ReadHalf<BoxedStream>, buf: &mut [u8]) -> Result<()> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn write_message<M: Message>(writer: &mut WriteHalf<BoxedStream>, msg: &M) -> Result<()> {
    let payload_size = msg.wire_size();
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + payload_size);
    write_frame_header(&mut buf, msg.frame_kind(), payload_size);
    msg.write_to(&mut buf)?;

    writer.write_all(&buf).await?;
    writer.flush().await?;
    trace!(kind = msg.frame_kind(), len = payload_size, "sent frame");
    Ok(())
}
