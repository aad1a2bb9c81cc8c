//! HTTP/1 accept loop feeding requests into a [`Server`].
//!
//! Each connection is served on its own task. The number of connections
//! served at once is bounded by a semaphore; once the limit is reached the
//! accept loop waits for a connection to finish.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use httprpc::transport::{bind, serve, ServeConfig};
//!
//! let listener = bind("127.0.0.1:10000").await?;
//! serve(listener, Arc::new(server), ServeConfig::default()).await?;
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Semaphore;

use crate::error::{Result, RpcError};
use crate::server::Server;

/// Default maximum request body size (4 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Default maximum connections served at once.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Configuration for [`serve`].
#[derive(Debug, Clone)]
pub struct ServeConfig {
    /// Requests with a larger body get a 413.
    pub max_body_bytes: usize,
    /// Connections served concurrently.
    pub max_connections: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ServeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum request body size.
    ///
    /// Default: 4 MiB
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Set the maximum number of connections served at once.
    ///
    /// Default: 1024
    pub fn max_connections(mut self, limit: usize) -> Self {
        self.max_connections = limit;
        self
    }
}

/// Bind a TCP listener.
pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<TcpListener> {
    Ok(TcpListener::bind(addr).await?)
}

/// Serve connections from `listener`.
///
/// Accept errors are logged and the loop keeps going; it only returns if
/// the connection semaphore is closed.
pub async fn serve(listener: TcpListener, server: Arc<Server>, config: ServeConfig) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.max_connections));
    tracing::debug!("Serving RPC on {:?}", listener.local_addr());

    loop {
        // Never closed, so acquiring only fails if the semaphore is gone.
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            return Ok(());
        };
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // Transient (e.g. out of file descriptors); keep serving.
                tracing::warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let server = server.clone();
        let max_body_bytes = config.max_body_bytes;

        tokio::spawn(async move {
            // Permit is held until this connection completes
            let _permit = permit;

            let service = service_fn(move |request: Request<Incoming>| {
                let server = server.clone();
                async move { Ok::<_, Infallible>(handle(&server, request, max_body_bytes).await) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                tracing::debug!("Connection error from {}: {}", peer, e);
            }
        });
    }
}

/// Collect the body and dispatch.
async fn handle(
    server: &Server,
    request: Request<Incoming>,
    max_body_bytes: usize,
) -> Response<Full<Bytes>> {
    let (head, body) = request.into_parts();

    let body = match Limited::new(body, max_body_bytes).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let err = if e.downcast_ref::<LengthLimitError>().is_some() {
                RpcError::PayloadTooLarge {
                    limit: max_body_bytes,
                }
            } else {
                RpcError::Body(e.to_string())
            };
            tracing::warn!("Rejected request body for {}: {}", head.uri, err);
            return server.reject(head, err.status(), err).map(Full::new);
        }
    };

    server
        .dispatch(Request::from_parts(head, body))
        .await
        .map(Full::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ServeConfig::default();
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_config_chaining() {
        let config = ServeConfig::new().max_body_bytes(1024).max_connections(8);
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.max_connections, 8);
    }
}
