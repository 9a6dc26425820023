//! Transport layer: TCP endpoints and the connection handle.
//!
//! A [`Connection`] owns one byte stream exclusively and exposes blocking
//! send plus pattern-matching receive with a timeout.

pub mod config;
mod connection;

pub use config::{ConnectionOptions, Endpoint};
pub use connection::Connection;
