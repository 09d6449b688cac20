//! EPP registry server for async Rust
//!
//! A registrar-facing back office speaking the Extensible Provisioning
//! Protocol (RFC 5730-5734) over length-prefixed XML frames on TLS, with
//! read-only WHOIS (RFC 3912) and RDAP (RFC 9083) views of the same data.
//!
//! The pieces line up with the protocol: [`connection`] frames the stream,
//! [`request`] and [`response`] are the XML codec, [`session`] tracks
//! greeting/login state, the dispatcher routes each command to the
//! [`domain`], [`contact`] and [`host`] handlers, and [`store`] gives every
//! command a transaction over the registry database.

pub mod common;
pub mod config;
pub mod connection;
pub mod contact;
mod dispatch;
pub mod domain;
pub mod error;
mod greeting;
pub mod host;
pub mod rdap;
pub mod request;
pub mod response;
pub mod server;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod whois;
mod xml;

pub use error::Error;
