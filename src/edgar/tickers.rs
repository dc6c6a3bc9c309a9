use log::debug;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use url::Url;

use super::client::fetch_and_save;
use crate::recon::error::ReconError;

const TICKER_URL: &str = "https://www.sec.gov/files/company_tickers.json";

/// Validated, upper-cased ticker symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ticker(String);

impl Ticker {
    pub fn new(ticker: impl Into<String>) -> Result<Self, ReconError> {
        let uppercase = ticker.into().to_uppercase();
        if uppercase.is_empty()
            || !uppercase.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(ReconError::UnknownTicker(uppercase));
        }
        Ok(Ticker(uppercase))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolve a ticker to its zero-padded 10-digit CIK via the SEC's public
/// company-tickers map, cached on disk after the first download.
pub async fn lookup_cik(
    client: &Client,
    ticker: &Ticker,
    user_agent: &str,
    data_dir: &Path,
) -> Result<String, ReconError> {
    let path = data_dir.join("tickers.json");
    if !path.exists() {
        debug!("tickers file not found, downloading from SEC");
        let url = Url::parse(TICKER_URL).expect("static URL");
        fetch_and_save(client, &url, &path, user_agent).await?;
    }

    let json: HashMap<String, Value> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    debug!("loaded {} ticker entries", json.len());

    for entry in json.values() {
        let symbol = entry["ticker"].as_str().unwrap_or("").trim();
        if symbol.eq_ignore_ascii_case(ticker.as_str()) {
            let cik = entry["cik_str"].as_u64().ok_or_else(|| ReconError::BadResponse {
                context: "company_tickers.json".to_string(),
                detail: "cik_str missing or non-numeric".to_string(),
            })?;
            return Ok(format!("{:010}", cik));
        }
    }

    Err(ReconError::UnknownTicker(ticker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickers_normalize_and_validate() {
        assert_eq!(Ticker::new("aapl").unwrap().as_str(), "AAPL");
        assert_eq!(Ticker::new("BRK-B").unwrap().as_str(), "BRK-B");
        assert!(Ticker::new("").is_err());
        assert!(Ticker::new("BAD TICKER").is_err());
    }
}
