//! Helper library for native applications.
//!
//! Establishes sessions over:
//! - WebTransport (HTTP/3)
//! - Raw QUIC (ALPN `moq-00`, no HTTP/3 framing)
//!
//! See [`Client`] for dialing by URL and [`Server`] for accepting connections.

mod client;
mod quic;
mod server;

pub use client::*;
pub use quic::*;
pub use server::*;

// Re-export these crates.
pub use moqt;
pub use rustls;
pub use web_transport_quinn;
