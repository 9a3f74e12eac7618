//! Listener bootstrap: compose the router, add request logging, CORS and timeouts, serve
//! until interrupted, then drain in-flight requests for at most the graceful timeout.

use crate::config::{CorsPolicy, ServerConfig};
use crate::error::{ConfigError, ServerError};
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

fn cors_layer(policy: &CorsPolicy) -> Result<Option<CorsLayer>, ConfigError> {
    match policy {
        CorsPolicy::Disabled => Ok(None),
        CorsPolicy::Permissive => Ok(Some(CorsLayer::permissive())),
        CorsPolicy::Configured {
            origin,
            methods,
            headers,
        } => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|_| ConfigError::InvalidCors(format!("origin '{}'", origin)))?;
            let headers = headers
                .iter()
                .map(|h| {
                    HeaderName::from_bytes(h.as_bytes())
                        .map_err(|_| ConfigError::InvalidCors(format!("header '{}'", h)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(
                CorsLayer::new()
                    .allow_origin(origin)
                    .allow_methods(methods.clone())
                    .allow_headers(headers),
            ))
        }
    }
}

/// Build the application: `register` receives an empty router exactly once and returns it
/// with its routes; the cross-cutting layers are then wrapped around every route.
pub fn build_app<F>(config: &ServerConfig, register: F) -> Result<Router, ConfigError>
where
    F: FnOnce(Router) -> Router,
{
    let mut app = register(Router::new()).layer(TimeoutLayer::new(config.request_timeout));
    if let Some(cors) = cors_layer(&config.cors)? {
        app = app.layer(cors);
    }
    if config.log_requests {
        app = app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );
    }
    Ok(app)
}

/// Bind `config.addr()` and serve `app` until `shutdown` resolves.
pub async fn serve<S>(config: &ServerConfig, app: Router, shutdown: S) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind(config.addr()).await?;
    serve_on(listener, app, config.graceful_timeout, shutdown).await
}

/// Serve on an already bound listener. After `shutdown` resolves no new connections are
/// accepted; open ones get `grace` to finish before this returns regardless.
pub async fn serve_on<S>(
    listener: TcpListener,
    app: Router,
    grace: Duration,
    shutdown: S,
) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send,
{
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "starting http server");

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        res = &mut server => return joined(res),
        _ = shutdown => {}
    }

    tracing::info!(grace = ?grace, "shutting down");
    let _ = stop_tx.send(());
    match tokio::time::timeout(grace, &mut server).await {
        Ok(res) => joined(res),
        Err(_) => {
            tracing::warn!(grace = ?grace, "graceful timeout elapsed, abandoning open connections");
            server.abort();
            Ok(())
        }
    }
}

fn joined(
    res: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    match res {
        Ok(inner) => Ok(inner?),
        Err(e) => Err(ServerError::Io(std::io::Error::other(e))),
    }
}

/// Resolves on Ctrl-C (SIGINT). If the handler cannot be installed it never resolves.
pub async fn interrupt_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for interrupt signal");
        std::future::pending::<()>().await;
    }
}

/// Build the app with `register`, serve it on `config.addr()`, stop on Ctrl-C.
pub async fn start_http_listener<F>(config: ServerConfig, register: F) -> Result<(), ServerError>
where
    F: FnOnce(Router) -> Router,
{
    let app = build_app(&config, register)?;
    serve(&config, app, interrupt_signal()).await
}
