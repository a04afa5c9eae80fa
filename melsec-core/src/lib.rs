//! Core types for the MELSEC communication client
//!
//! This crate provides the shared data model used across the client:
//! error types, opaque request/response frames, and client configuration.

pub mod config;
pub mod error;
pub mod frame;

pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{MelsecError, MelsecResult};
pub use frame::{RequestFrame, ResponseFrame};
