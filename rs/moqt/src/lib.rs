//! # moqt: a Media over QUIC Transfork endpoint
//!
//! `moqt` speaks a fork of the Media over QUIC transport built around named
//! broadcasts instead of numeric aliases. Either side of a connection may
//! publish and subscribe at the same time; there is no client/server asymmetry
//! past the handshake.
//!
//! ## API
//!
//! The API is built around a [Session] and a [TrackMux]:
//! - [Session::connect] or [Session::accept] to establish a session over any
//!   [web_transport_trait::Session] (raw QUIC or WebTransport).
//! - [TrackMux::publish] to register a [TrackHandler] under a [BroadcastPath];
//!   the path is announced to interested peers automatically.
//! - [Session::subscribe] to receive a track as a [TrackReader], popping
//!   [GroupReader]s in the negotiated [GroupOrder].
//! - [Session::announced] to discover broadcasts matching a [Pattern]:
//!   a snapshot, a [AnnouncedEvent::Live] marker, then live deltas.
//! - [Session::fetch] for a one-shot grab of a single group.
//!
//! Everything is cancelled through a hierarchical [Context]: cancelling a
//! context tears down its whole subtree with a typed cause, from the session
//! down to individual group streams.

mod announced;
mod announcement;
mod context;
mod error;
mod model;
mod mux;
mod path;
mod queue;
mod session;
mod transport;

pub mod coding;
pub mod message;

pub use announced::{AnnouncedEvent, AnnouncedReader};
pub use announcement::*;
pub use context::*;
pub use error::*;
pub use model::*;
pub use mux::*;
pub use path::*;
pub use queue::*;
pub use session::*;
