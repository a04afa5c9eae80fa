//! Transport abstraction between the correlation core and the socket layer

use async_trait::async_trait;
use bytes::BytesMut;
use melsec_core::{ClientConfig, MelsecResult, RequestFrame, ResponseFrame};
use tokio::sync::mpsc;

/// Frame codec for a specific MELSEC protocol dialect
///
/// The correlation core treats frame contents as opaque; a codec converts
/// request payloads to wire bytes and reassembles response frames from the
/// inbound byte stream.
pub trait FrameCodec: Send + Sync + 'static {
    /// Encode a request frame into the destination buffer
    fn encode(&self, frame: &RequestFrame, dst: &mut BytesMut) -> MelsecResult<()>;

    /// Try to decode one response frame from the accumulated inbound bytes
    ///
    /// Returns `Ok(None)` when more bytes are needed. Consumed bytes must be
    /// advanced out of `src`.
    fn decode(&self, src: &mut BytesMut) -> MelsecResult<Option<ResponseFrame>>;
}

/// An event delivered by the transport's inbound stream, in arrival order
///
/// `Fault` is terminal: no further events follow it on the same connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A decoded response frame
    Response(ResponseFrame),
    /// An unrecoverable transport error, including peer-initiated close
    Fault(String),
}

/// Receiving side of a connection's ordered event stream
pub type EventStream = mpsc::Receiver<TransportEvent>;

/// Write side of an open connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one request frame to the wire
    ///
    /// # Errors
    /// Returns [`melsec_core::MelsecError::WriteFailure`] if the frame could
    /// not be flushed to the socket.
    async fn write(&mut self, frame: RequestFrame) -> MelsecResult<()>;

    /// Close the connection's write side
    async fn close(&mut self);
}

/// Transport factory able to open connections to a configured device
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection to the device described by `config`
    ///
    /// On success returns the write side and the ordered inbound event
    /// stream. The connect timeout from `config` applies to establishment.
    ///
    /// # Errors
    /// Returns `ConnectTimeout` if establishment exceeds the configured
    /// timeout, `ConnectFailure` for any other establishment error.
    async fn open(&self, config: &ClientConfig) -> MelsecResult<(Box<dyn FrameSink>, EventStream)>;
}
