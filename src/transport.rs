//! Packet transport seam
//!
//! The session engine never touches wire bytes itself: it reads and writes
//! [`Packet`] values through the [`PacketSource`] / [`PacketSink`] traits.
//! [`FramedConn`] adapts any connected byte stream together with a
//! caller-supplied codec ([`Encoder`] / [`Decoder`]) into that interface.

use std::fmt;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::protocol::Packet;

/// Error produced by a codec implementation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError(String);

impl CodecError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "codec error: {}", self.0)
    }
}

impl std::error::Error for CodecError {}

/// Errors that can occur on the packet transport
#[derive(Debug)]
pub enum TransportError {
    /// The peer closed the stream (clean EOF)
    Closed,
    /// I/O failure on the stream
    Io(std::io::Error),
    /// The codec rejected inbound or outbound data
    Codec(CodecError),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "connection closed"),
            Self::Io(e) => write!(f, "io error: {}", e),
            Self::Codec(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e)
    }
}

impl From<CodecError> for TransportError {
    fn from(e: CodecError) -> Self {
        TransportError::Codec(e)
    }
}

/// Serializes packets onto a byte buffer. Implemented by the external codec.
pub trait Encoder: Send {
    fn encode(&mut self, packet: &Packet, dst: &mut BytesMut) -> Result<(), CodecError>;
}

/// Parses packets out of a byte buffer. Implemented by the external codec.
///
/// `decode` consumes a complete packet from the front of `src` and returns
/// `Ok(None)` when more bytes are needed.
pub trait Decoder: Send {
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, CodecError>;
}

/// Write half of a packet connection
#[async_trait]
pub trait PacketSink: Send {
    async fn write_packet(&mut self, packet: &Packet) -> Result<(), TransportError>;
}

/// Read half of a packet connection
#[async_trait]
pub trait PacketSource: Send {
    async fn read_packet(&mut self) -> Result<Packet, TransportError>;
}

/// A bidirectional packet connection the session can split into its write
/// and read halves. The writer task takes the sink, the reader the source.
pub trait PacketConn: Send {
    fn split(self: Box<Self>) -> (Box<dyn PacketSink>, Box<dyn PacketSource>);
}

/// Packet connection over a connected byte stream plus an external codec
pub struct FramedConn<T> {
    stream: T,
    encoder: Box<dyn Encoder>,
    decoder: Box<dyn Decoder>,
}

impl<T> FramedConn<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: T, encoder: Box<dyn Encoder>, decoder: Box<dyn Decoder>) -> Self {
        Self {
            stream,
            encoder,
            decoder,
        }
    }
}

impl<T> PacketConn for FramedConn<T>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    fn split(self: Box<Self>) -> (Box<dyn PacketSink>, Box<dyn PacketSource>) {
        let (read_half, write_half) = tokio::io::split(self.stream);
        (
            Box::new(FramedSink {
                half: write_half,
                encoder: self.encoder,
                buf: BytesMut::with_capacity(2048),
            }),
            Box::new(FramedSource {
                half: read_half,
                decoder: self.decoder,
                buf: BytesMut::with_capacity(2048),
            }),
        )
    }
}

struct FramedSink<T> {
    half: WriteHalf<T>,
    encoder: Box<dyn Encoder>,
    buf: BytesMut,
}

#[async_trait]
impl<T> PacketSink for FramedSink<T>
where
    T: AsyncWrite + Send + 'static,
{
    async fn write_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.buf.clear();
        self.encoder.encode(packet, &mut self.buf)?;
        self.half.write_all(&self.buf).await?;
        Ok(())
    }
}

struct FramedSource<T> {
    half: ReadHalf<T>,
    decoder: Box<dyn Decoder>,
    buf: BytesMut,
}

#[async_trait]
impl<T> PacketSource for FramedSource<T>
where
    T: AsyncRead + Send + 'static,
{
    async fn read_packet(&mut self) -> Result<Packet, TransportError> {
        loop {
            if let Some(packet) = self.decoder.decode(&mut self.buf)? {
                return Ok(packet);
            }
            let n = self.half.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
        }
    }
}
