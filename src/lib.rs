//! Async WebSocket client implementation for the Tokio stack.
//!
//! This library implements the client side of the
//! [WebSocket Protocol RFC](https://datatracker.ietf.org/doc/html/rfc6455):
//! it performs the HTTP/1.1 upgrade handshake over TCP or TLS, masks and
//! encodes outgoing frames, reassembles fragmented messages out of a
//! streaming frame parser, answers pings, and drives the bidirectional
//! closing handshake.
//!
//! [`handshake::connect_async`] opens a connection; the returned
//! [`connection::WSConnection`] is a `futures::Stream` of whole messages
//! and can be split into independent reader and writer halves.

pub mod config;
pub mod connection;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod extensions;
pub mod frame;
pub mod handshake;
pub mod message;
pub mod split;
pub mod stream;

mod read;
mod request;
mod utils;
mod write;
