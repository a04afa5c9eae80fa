//! Transport layer for MELSEC communication
//!
//! This crate defines the seam between the correlation core and the socket
//! layer (`Transport`, `FrameSink`, `FrameCodec`, `TransportEvent`) and
//! provides the TCP implementation.

pub mod tcp;
pub mod transport;

pub use tcp::TcpTransport;
pub use transport::{EventStream, FrameCodec, FrameSink, Transport, TransportEvent};
