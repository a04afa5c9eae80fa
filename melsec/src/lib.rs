//! MELSEC communication protocol client
//!
//! TCP client for MELSEC communication with concurrent request/response
//! correlation.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `melsec-core`: Core types, error handling, frames, configuration
//! - `melsec-transport`: Transport layer (TCP) and the codec seam
//! - `melsec-client`: Connection management and request correlation
//!
//! # Usage
//!
//! ```no_run
//! use melsec::client::MelsecClient;
//! use melsec::{ClientConfig, RequestFrame};
//! ```

// Re-export core types
pub use melsec_core::{ClientConfig, MelsecError, MelsecResult, ReconnectPolicy};
pub use melsec_core::{RequestFrame, ResponseFrame};

// Re-export client API
pub mod client {
    pub use melsec_client::*;
}

// Re-export transport API
pub mod transport {
    pub use melsec_transport::*;
}
