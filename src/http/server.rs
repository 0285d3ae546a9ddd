//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::service::{protect, AppState};
use crate::error::{Result, WindowGuardError};
use crate::ratelimit::RateLimiterBackend;

/// HTTP server exposing the protected route.
pub struct HttpServer<R: RateLimiterBackend + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared handler state
    state: Arc<AppState<R>>,
}

impl<R: RateLimiterBackend + 'static> HttpServer<R> {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, state: AppState<R>) -> Self {
        Self {
            addr,
            state: Arc::new(state),
        }
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(protect::<R>))
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await.map_err(|e| {
            error!(addr = %self.addr, error = %e, "Failed to bind HTTP listener");
            e
        })?;
        self.serve_on(listener, signal).await
    }

    /// Serve on an already bound listener until `signal` resolves.
    pub async fn serve_on<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "Server is running on http://{}", local_addr);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            WindowGuardError::Io(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::FixedWindowLimiter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn get_root(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[test]
    fn test_server_creation() {
        let addr: SocketAddr = "127.0.0.1:3001".parse().unwrap();
        let rate_limiter = Arc::new(FixedWindowLimiter::new(5, 60_000).unwrap());
        let _server = HttpServer::new(addr, AppState::new(rate_limiter));
    }

    #[tokio::test]
    async fn test_serves_greeting_then_429() {
        let rate_limiter = Arc::new(FixedWindowLimiter::new(1, 60_000).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = HttpServer::new(addr, AppState::new(rate_limiter.clone()));

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_on(listener, async move {
            let _ = rx.await;
        }));

        let first = get_root(addr).await;
        assert!(first.starts_with("HTTP/1.1 200"), "{}", first);
        assert!(first.ends_with("Hello, World!"), "{}", first);

        let second = get_root(addr).await;
        assert!(second.starts_with("HTTP/1.1 429"), "{}", second);
        assert!(second.to_lowercase().contains("retry-after: 60"), "{}", second);

        assert_eq!(rate_limiter.window("127.0.0.1").unwrap().count, 1);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
