//! TCP transport implementation

use crate::transport::{EventStream, FrameCodec, FrameSink, Transport, TransportEvent};
use async_trait::async_trait;
use bytes::BytesMut;
use melsec_core::{ClientConfig, MelsecError, MelsecResult, RequestFrame};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Capacity of the inbound event channel per connection
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// TCP transport for MELSEC communication
///
/// Opens a `TcpStream` per connection, splits it, and runs a read loop that
/// feeds decoded response frames (or a terminal fault) into the event stream.
pub struct TcpTransport<C> {
    codec: Arc<C>,
}

impl<C: FrameCodec> TcpTransport<C> {
    /// Create a TCP transport using the given frame codec
    pub fn new(codec: C) -> Self {
        Self {
            codec: Arc::new(codec),
        }
    }
}

#[async_trait]
impl<C: FrameCodec> Transport for TcpTransport<C> {
    async fn open(&self, config: &ClientConfig) -> MelsecResult<(Box<dyn FrameSink>, EventStream)> {
        let addr = (config.address.as_str(), config.port);
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| MelsecError::ConnectTimeout(config.connect_timeout))?
            .map_err(|e| MelsecError::ConnectFailure(e.to_string()))?;

        if let Err(e) = stream.set_nodelay(true) {
            log::debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(read_loop(read_half, self.codec.clone(), tx));

        let sink = TcpFrameSink {
            writer: write_half,
            codec: self.codec.clone(),
            buf: BytesMut::with_capacity(256),
        };
        Ok((Box::new(sink), rx))
    }
}

/// Write side of an open TCP connection
struct TcpFrameSink<C> {
    writer: OwnedWriteHalf,
    codec: Arc<C>,
    buf: BytesMut,
}

#[async_trait]
impl<C: FrameCodec> FrameSink for TcpFrameSink<C> {
    async fn write(&mut self, frame: RequestFrame) -> MelsecResult<()> {
        self.buf.clear();
        self.codec.encode(&frame, &mut self.buf)?;
        self.writer
            .write_all(&self.buf)
            .await
            .map_err(|e| MelsecError::WriteFailure(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| MelsecError::WriteFailure(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

/// Read loop for one connection
///
/// Accumulates inbound bytes and emits every decodable response frame in
/// order. EOF, read errors, and decode errors all end the loop with one
/// terminal `Fault` event.
async fn read_loop<C: FrameCodec>(
    mut reader: OwnedReadHalf,
    codec: Arc<C>,
    events: mpsc::Sender<TransportEvent>,
) {
    let mut buf = BytesMut::with_capacity(4096);

    let cause = loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => break "connection closed by peer".to_string(),
            Ok(_) => loop {
                match codec.decode(&mut buf) {
                    Ok(Some(frame)) => {
                        if events.send(TransportEvent::Response(frame)).await.is_err() {
                            // Receiver dropped: the client is gone, stop reading.
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = events.send(TransportEvent::Fault(e.to_string())).await;
                        return;
                    }
                }
            },
            Err(e) => break e.to_string(),
        }
    };

    log::debug!("TCP read loop ended: {}", cause);
    let _ = events.send(TransportEvent::Fault(cause)).await;
}
