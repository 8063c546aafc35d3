//! Static page shown when a blocked site is opened.
//!
//! Blocked hostnames resolve to the redirect address, so a browser that
//! follows one lands here if the page is served on that address.

use std::net::SocketAddr;

use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Site blocked</title>
<style>
body { font-family: Helvetica, Arial, sans-serif; text-align: center; margin-top: 15vh; color: #333; }
h1 { color: #c0392b; }
</style>
</head>
<body>
<h1>This site is blocked</h1>
<p>Get back to work.</p>
</body>
</html>
"#;

/// Routes served by the block page.
pub fn router() -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .fallback(index)
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

async fn healthz() -> impl IntoResponse {
    "ok"
}

/// Serves the page on `addr` until `cancel` fires.
///
/// # Errors
///
/// Returns [`BlockerError::Io`](crate::BlockerError::Io) if the address
/// cannot be bound or the server fails.
pub async fn serve(addr: SocketAddr, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving block page");
    axum::serve(listener, router())
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    tracing::info!("Block page stopped");
    Ok(())
}
