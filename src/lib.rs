//! # httprpc
//!
//! RPC over HTTP: register typed service methods, pick a wire codec per
//! content type, and dispatch `http::Request`s to the right method.
//!
//! ## Architecture
//!
//! - **Service registry**: `Service.Method` names mapped to typed bindings
//! - **Codecs**: JSON and MessagePack envelopes, keyed by content type
//! - **Server**: verb allow-list, codec selection, hooks, error mapping
//! - **Transport**: optional hyper HTTP/1 loop feeding a shared `Server`
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use httprpc::codec::JsonCodec;
//! use httprpc::{RequestHandle, Server, Service, ServiceError};
//!
//! #[derive(serde::Deserialize)]
//! struct HelloArgs {
//!     who: String,
//! }
//!
//! struct HelloService;
//!
//! #[tokio::main]
//! async fn main() {
//!     let hello = Service::new(HelloService).method(
//!         "Say",
//!         |_svc, _req: RequestHandle, args: HelloArgs| async move {
//!             Ok::<_, ServiceError>(format!("Hello, {}!", args.who))
//!         },
//!     );
//!
//!     let mut server = Server::new();
//!     server.register_codec(JsonCodec::new(), "application/json");
//!     server.register_service(hello, "").unwrap();
//!
//!     let listener = httprpc::transport::bind("127.0.0.1:10000").await.unwrap();
//!     httprpc::transport::serve(listener, Arc::new(server), Default::default())
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod codec;
pub mod error;
pub mod server;
pub mod service;
pub mod transport;

pub use error::{Result, RpcError, ServiceError};
pub use server::{write_error, RequestHandle, RequestInfo, Server};
pub use service::{MethodDescriptor, Service, ServiceDescriptor, ServiceRegistry};
