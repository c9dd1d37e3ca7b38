//! In-process HTTP fakes for the API tests.

use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;

use crate::prelude::*;

/// Serve the router on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> Result<Url> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, router).await });
    Ok(Url::parse(&format!("http://{address}/"))?)
}
