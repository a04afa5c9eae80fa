//! Frame types exchanged with a MELSEC device
//!
//! The correlation core never looks inside a frame; it only needs to tell
//! requests and responses apart as values. The payload bytes are produced and
//! consumed by a protocol-specific codec.

use bytes::Bytes;

/// A request frame to be written to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFrame {
    payload: Bytes,
}

impl RequestFrame {
    /// Create a request frame from encoded payload bytes
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Encoded payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, returning its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// A response frame delivered by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseFrame {
    payload: Bytes,
}

impl ResponseFrame {
    /// Create a response frame from decoded payload bytes
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Decoded payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, returning its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}
