//! MELSEC communication TCP client
//!
//! This crate implements the request/response correlation core of the client:
//!
//! - **Connection management**: a single live connection handle, with
//!   concurrent connect attempts coalesced into one (single-flight) and
//!   explicit disconnect.
//! - **Request correlation**: every accepted request resolves exactly once
//!   with its response, a timeout, or a connection error. The device answers
//!   in strict send order, so correlation is FIFO head-of-queue resolution —
//!   there is no request identifier on the wire.
//!
//! Frame encoding and the socket layer live behind the traits in
//! `melsec-transport`.

mod correlation;
mod manager;

pub mod client;

pub use client::MelsecClient;
