//! HTTP sources: JSON endpoints and the forecast page scrape.

use super::json::value_to_table;
use super::local::scrape_current_weather;
use crate::error::{EtlError, Result};
use polars::prelude::*;
use reqwest::blocking::{Client, Response};
use reqwest::header::USER_AGENT;
use std::time::Duration;
use tracing::{error, info};

/// User agent sent with page requests; some forecast sites reject bare clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// Request timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

fn client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}

fn ensure_success(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        error!("Request to {} failed with status {}", url, status);
        return Err(EtlError::read_failed(url, format!("HTTP status {status}")));
    }
    Ok(response)
}

/// GET a JSON document and turn it into a table.
pub fn fetch_json_table(url: &str) -> Result<DataFrame> {
    info!("Fetching data from {}", url);
    let response = ensure_success(url, client()?.get(url).send()?)?;
    let value: serde_json::Value = response.json()?;
    let df = value_to_table(&value)?;
    info!("Fetched {:?} from {}", df.shape(), url);
    Ok(df)
}

/// Download a forecast page and scrape the current temperatures for `city`.
pub fn fetch_weather(url: &str, city: &str) -> Result<DataFrame> {
    info!("Fetching weather page for {}", city);
    let response = client()?
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .inspect_err(|e| error!("Error fetching weather data: {}", e))?;
    let html = ensure_success(url, response)?.text()?;
    scrape_current_weather(city, &html)
}
