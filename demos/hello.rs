//! Hello service served over HTTP with the JSON codec.
//!
//! Run with:
//!
//! ```text
//! RUST_LOG=httprpc=debug cargo run --example hello
//! curl 'http://127.0.0.1:10000/rpc/HelloService.Say?who=World'
//! curl -H 'Content-Type: application/json' \
//!      -d '{"method":"HelloService.Say","params":{"who":"World"}}' \
//!      http://127.0.0.1:10000/rpc
//! ```

use std::sync::Arc;

use httprpc::codec::{JsonCodec, JSON_CONTENT_TYPE};
use httprpc::transport::{self, ServeConfig};
use httprpc::{RequestHandle, Server, Service, ServiceError};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

struct HelloService {
    greeting: String,
}

#[derive(Deserialize)]
struct HelloArgs {
    who: String,
}

#[derive(Serialize)]
struct HelloReply {
    message: String,
}

async fn say(
    svc: Arc<HelloService>,
    _req: RequestHandle,
    args: HelloArgs,
) -> Result<HelloReply, ServiceError> {
    if args.who.is_empty() {
        return Err(ServiceError::new("who is required"));
    }
    Ok(HelloReply {
        message: format!("{}, {}!", svc.greeting, args.who),
    })
}

async fn no_args(_svc: Arc<HelloService>, req: RequestHandle) -> Result<String, ServiceError> {
    Ok(format!("no args needed at {}", req.uri.path()))
}

#[tokio::main]
async fn main() -> httprpc::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let hello = Service::new(HelloService {
        greeting: "Hello".to_string(),
    })
    .method("Say", say)
    .method_no_args("NoArgs", no_args);

    let mut server = Server::new();
    server.register_codec(JsonCodec::new(), JSON_CONTENT_TYPE);
    server.register_service(hello, "")?;
    server.register_after_func(|info| {
        if let Some(err) = &info.error {
            tracing::warn!("{} failed: {}", info.method, err);
        }
    });

    let listener = transport::bind("127.0.0.1:10000").await?;
    tracing::info!("listening on 127.0.0.1:10000");
    transport::serve(listener, Arc::new(server), ServeConfig::default()).await
}
