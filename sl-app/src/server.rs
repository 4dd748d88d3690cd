//! sheetline server assembly.
//!
//! Builds the external-service clients from config and mounts the webhook
//! routes behind the shared HTTP middleware stack.

use crate::config::AppConfig;
use crate::routes;
use anyhow::Result;
use axum::http::{HeaderMap, Request};
use axum::response::Response;
use sl_channels::{ReplySender, WhatsAppCloudSender};
use sl_sheets::{RowAppender, ServiceAccountKey, SheetsClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::classify::ServerErrorsFailureClass;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub verify_token: String,
    pub appender: Arc<dyn RowAppender>,
    pub replies: Arc<dyn ReplySender>,
}

pub async fn serve() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(
        bind_addr = %addr,
        sheet_name = %cfg.sheet_name,
        service_account = %cfg.service_account_email,
        http_timeout_seconds = cfg.http_timeout_seconds,
        http_max_in_flight = cfg.http_max_in_flight,
        "server configuration loaded"
    );
    let listener = preflight_bind_listener(addr).await?;

    let state = Arc::new(build_state(&cfg)?);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
                request_id = %request_id_from_headers(request.headers())
            )
        })
        .on_request(|request: &Request<_>, _span: &tracing::Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id_from_headers(request.headers()),
                "http request started"
            );
        })
        .on_response(
            |response: &Response, latency: Duration, _span: &tracing::Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis() as u64,
                    "http request completed"
                );
            },
        )
        .on_failure(
            |error: ServerErrorsFailureClass, latency: Duration, _span: &tracing::Span| {
                tracing::error!(
                    error_class = %error,
                    latency_ms = latency.as_millis() as u64,
                    "http request failed"
                );
            },
        );

    let app = routes::router(state)
        .layer(GlobalConcurrencyLimitLayer::new(cfg.http_max_in_flight))
        .layer(TimeoutLayer::new(Duration::from_secs(
            cfg.http_timeout_seconds,
        )))
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    tracing::info!(%addr, "sheetline serving");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("http server shutdown completed");

    Ok(())
}

pub async fn doctor() -> Result<()> {
    let cfg = AppConfig::from_env()?;
    // Proves the private key parses and both clients construct.
    build_state(&cfg)?;
    tracing::info!(
        sheet_name = %cfg.sheet_name,
        service_account = %cfg.service_account_email,
        port = cfg.port,
        "config ok"
    );
    Ok(())
}

pub async fn send_one_shot(recipient: &str, message: &str) -> Result<()> {
    let cfg = AppConfig::from_env()?;
    let sender = WhatsAppCloudSender::new(&cfg.whatsapp_token, &cfg.phone_number_id)?;
    sender.send_text(recipient, message).await?;
    Ok(())
}

fn build_state(cfg: &AppConfig) -> Result<AppState> {
    let key = ServiceAccountKey {
        client_email: cfg.service_account_email.clone(),
        private_key: cfg.private_key.clone(),
    };
    let appender = SheetsClient::new(key, &cfg.sheet_id, &cfg.sheet_name)?;
    let replies = WhatsAppCloudSender::new(&cfg.whatsapp_token, &cfg.phone_number_id)?;
    Ok(AppState {
        verify_token: cfg.verify_token.clone(),
        appender: Arc::new(appender),
        replies: Arc::new(replies),
    })
}

async fn preflight_bind_listener(addr: SocketAddr) -> Result<tokio::net::TcpListener> {
    tracing::info!(%addr, "preflight bind check starting");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("preflight bind failed for {addr}: {e}"))?;
    tracing::info!(%addr, "preflight bind check passed");
    Ok(listener)
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "missing".to_string())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("received ctrl-c; beginning graceful shutdown");
            }
            _ = terminate.recv() => {
                tracing::warn!("received SIGTERM; beginning graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        } else {
            tracing::warn!("received ctrl-c; beginning graceful shutdown");
        }
    }
}
