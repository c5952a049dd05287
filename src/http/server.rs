//! HTTP server setup for the standalone guard.
//!
//! # Responsibilities
//! - Build the Axum router: guard middleware in front of the upstream proxy
//! - Wire up cross-cutting layers (timeout, request ID, tracing, security headers)
//! - Bind plain TCP or TLS and serve until shutdown
//! - Feed hot-reloaded configuration into the guard

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, Router};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{GuardConfig, TlsConfig};
use crate::guard::RequestGuard;
use crate::http::proxy::{proxy_handler, ProxyState};
use crate::security::headers::SecurityHeaderInjector;

/// Grace period for in-flight TLS connections after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

/// Sidecar server: guard in front, upstream behind.
pub struct GuardServer {
    router: Router,
    config: GuardConfig,
    guard: Arc<RequestGuard>,
}

impl GuardServer {
    pub fn new(config: GuardConfig, guard: RequestGuard) -> Self {
        let guard = Arc::new(guard);
        let router = Self::build_router(&config, &guard);
        Self {
            router,
            config,
            guard,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, guard: &RequestGuard) -> Router {
        let app = Router::new()
            .fallback(proxy_handler)
            .with_state(ProxyState::new(config.upstream.as_ref()));
        let mut app = guard.protect(app);
        if config.security.enable_headers {
            app = SecurityHeaderInjector.apply(app);
        }

        app.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Start sweepers and the config update loop.
    fn start_background(
        &self,
        mut config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) -> Vec<JoinHandle<()>> {
        let mut handles = self.guard.spawn_sweepers(shutdown);

        let guard = Arc::clone(&self.guard);
        handles.push(tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                tracing::info!("Applying configuration update");
                guard.apply_update(&new_config);
            }
        }));
        handles
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let background = self.start_background(config_updates, &shutdown);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        for handle in background {
            handle.abort();
        }
        self.guard.clear();
        result?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on the configured bind address.
    pub async fn run_tls(
        self,
        tls: &TlsConfig,
        config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let background = self.start_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            shutdown_handle.graceful_shutdown(Some(TLS_DRAIN));
        });

        let result = axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await;

        for handle in background {
            handle.abort();
        }
        self.guard.clear();
        result?;
        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn guard(&self) -> &Arc<RequestGuard> {
        &self.guard
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}
