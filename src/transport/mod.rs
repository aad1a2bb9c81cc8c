//! Transport module - binds a [`Server`](crate::Server) to an HTTP listener.
//!
//! The dispatcher itself only sees `http::Request<Bytes>`; this module
//! provides the hyper-based HTTP/1 loop that produces them.

mod serve;

pub use serve::{bind, serve, ServeConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_CONNECTIONS};
