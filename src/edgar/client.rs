use log::debug;
use mime::Mime;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::Path;
use url::Url;

use super::rate_limiter::{RateLimiter, REQUEST_DELAY};
use crate::recon::error::ReconError;

/// Rate-limited GET returning the response body as text. Non-success
/// statuses become errors instead of empty bodies.
pub async fn fetch_text(
    client: &Client,
    url: &Url,
    user_agent: &str,
    accept: Mime,
) -> Result<String, ReconError> {
    let _permit = RateLimiter::edgar().acquire().await;
    debug!("fetching URL: {}", url);

    let response = client
        .get(url.as_str())
        .header(reqwest::header::USER_AGENT, user_agent)
        .header(reqwest::header::ACCEPT, accept.as_ref())
        .header(reqwest::header::ACCEPT_ENCODING, "gzip, deflate")
        .send()
        .await?;
    tokio::time::sleep(REQUEST_DELAY).await;

    debug!("response status: {}", response.status());
    let response = response.error_for_status()?;
    Ok(response.text().await?)
}

/// Rate-limited GET deserializing a JSON body.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &Url,
    user_agent: &str,
) -> Result<T, ReconError> {
    let body = fetch_text(client, url, user_agent, mime::APPLICATION_JSON).await?;
    Ok(serde_json::from_str(&body)?)
}

/// Fetch a JSON document to disk, verifying the payload parses before the
/// file is considered written. Used for the cacheable feeds (tickers,
/// submissions) so reruns skip the network.
pub async fn fetch_and_save(
    client: &Client,
    url: &Url,
    filepath: &Path,
    user_agent: &str,
) -> Result<(), ReconError> {
    let content = fetch_text(client, url, user_agent, mime::APPLICATION_JSON).await?;

    serde_json::from_str::<serde_json::Value>(&content).map_err(|e| ReconError::BadResponse {
        context: url.to_string(),
        detail: format!("invalid JSON payload: {}", e),
    })?;

    if let Some(parent) = filepath.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(filepath, &content)?;
    debug!("saved {} bytes to {:?}", content.len(), filepath);
    Ok(())
}

/// Build the HTTP client every EDGAR call shares.
pub fn build_client() -> Result<Client, ReconError> {
    Ok(Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .connect_timeout(std::time::Duration::from_secs(10))
        .build()?)
}
