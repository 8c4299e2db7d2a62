//! Yahoo Finance options client
//!
//! The options endpoint is unauthenticated but gated by a session cookie and a
//! matching "crumb" token. The client primes its cookie jar once, caches the
//! crumb for its lifetime, and then issues plain GET requests, one at a time.

use crate::api::MarketDataProvider;
use crate::config::YahooConfig;
use crate::error::{Result, SurfaceError};
use crate::models::{Expiry, OptionChain, OptionRow};
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const COOKIE_URL: &str = "https://fc.yahoo.com";

static YAHOO_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut h = HeaderMap::new();
    h.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        ),
    );
    h.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    h.insert("accept-language", HeaderValue::from_static("en-US,en;q=0.9"));
    h
});

pub struct YahooClient {
    client: reqwest::Client,
    config: YahooConfig,
    crumb: OnceCell<String>,
}

impl YahooClient {
    pub fn new(config: YahooConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(YAHOO_HEADERS.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| SurfaceError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            crumb: OnceCell::new(),
        })
    }

    /// Session crumb, fetched on first use
    async fn crumb(&self) -> Result<&str> {
        let crumb = self
            .crumb
            .get_or_try_init(|| async {
                debug!("Priming Yahoo session cookie");
                // fc.yahoo.com answers 404 but still sets the session cookie
                if let Err(e) = self.client.get(COOKIE_URL).send().await {
                    warn!("Cookie request failed, continuing without it: {}", e);
                }

                let url = format!("{}/v1/test/getcrumb", self.config.base_url);
                let crumb = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .and_then(|resp| resp.error_for_status())
                    .map_err(|e| SurfaceError::NetworkError(format!("Failed to get crumb: {}", e)))?
                    .text()
                    .await
                    .map_err(|e| SurfaceError::NetworkError(format!("Failed to read crumb: {}", e)))?;

                let crumb = crumb.trim().to_string();
                if crumb.is_empty() || crumb.contains('<') {
                    return Err(SurfaceError::ProviderError(
                        "Yahoo returned an invalid crumb".to_string(),
                    ));
                }
                Ok::<String, SurfaceError>(crumb)
            })
            .await?;
        Ok(crumb.as_str())
    }

    async fn get_options(&self, symbol: &str, date: Option<i64>) -> Result<String> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v7/finance/options/{}", self.config.base_url, symbol);

        let mut query: Vec<(&str, String)> = vec![("crumb", crumb.to_string())];
        if let Some(ts) = date {
            query.push(("date", ts.to_string()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| SurfaceError::NetworkError(format!("Request for {} failed: {}", symbol, e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| SurfaceError::NetworkError(format!("Failed to read response: {}", e)))?;

        // Unknown symbols come back as 404 with a JSON error body; let the parser report it
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(SurfaceError::NetworkError(format!(
                "Options request for {} returned HTTP {}",
                symbol, status
            )));
        }
        Ok(body)
    }
}

impl MarketDataProvider for YahooClient {
    async fn expiry_dates(&self, symbol: &str) -> Result<Vec<Expiry>> {
        info!("Getting option expiries for {}", symbol);
        let body = self.get_options(symbol, None).await?;
        let expiries = parse_expiry_dates(&body)?;
        info!("{} has {} listed expiries", symbol, expiries.len());
        Ok(expiries)
    }

    async fn option_chain(&self, symbol: &str, expiry: &Expiry) -> Result<OptionChain> {
        debug!("Getting {} option chain for {}", symbol, expiry);
        let body = self.get_options(symbol, Some(expiry.timestamp)).await?;
        parse_option_chain(&body, expiry)
    }
}

// Yahoo Finance API response structures

#[derive(Debug, Deserialize)]
struct YahooOptionsResponse {
    #[serde(rename = "optionChain")]
    option_chain: YahooOptionChain,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChain {
    #[serde(default)]
    result: Vec<YahooOptionChainData>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionChainData {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<YahooOptions>,
}

#[derive(Debug, Deserialize)]
struct YahooOptions {
    #[serde(default)]
    calls: Vec<YahooOptionData>,
    #[serde(default)]
    puts: Vec<YahooOptionData>,
}

#[derive(Debug, Deserialize)]
struct YahooOptionData {
    #[serde(rename = "contractSymbol")]
    contract_symbol: Option<String>,
    strike: Option<f64>,
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
}

fn first_result(body: &str) -> Result<YahooOptionChainData> {
    let response: YahooOptionsResponse = serde_json::from_str(body)
        .map_err(|e| SurfaceError::ParseError(format!("Failed to parse options response: {}", e)))?;

    if let Some(err) = response.option_chain.error {
        return Err(SurfaceError::ProviderError(format!(
            "{}: {}",
            err.code.unwrap_or_else(|| "error".to_string()),
            err.description.unwrap_or_default()
        )));
    }

    response
        .option_chain
        .result
        .into_iter()
        .next()
        .ok_or_else(|| SurfaceError::ProviderError("No options data returned".to_string()))
}

/// Expiries from an options response, in the order Yahoo lists them
pub(crate) fn parse_expiry_dates(body: &str) -> Result<Vec<Expiry>> {
    let data = first_result(body)?;
    Ok(data
        .expiration_dates
        .into_iter()
        .filter_map(Expiry::from_timestamp)
        .collect())
}

/// Calls and puts from an options response; rows missing a strike or an
/// implied volatility are dropped
pub(crate) fn parse_option_chain(body: &str, expiry: &Expiry) -> Result<OptionChain> {
    let data = first_result(body)?;
    let mut chain = OptionChain::new(expiry.clone());

    if let Some(options) = data.options.into_iter().next() {
        chain.calls = convert_rows(options.calls);
        chain.puts = convert_rows(options.puts);
    }

    Ok(chain)
}

fn convert_rows(rows: Vec<YahooOptionData>) -> Vec<OptionRow> {
    rows.into_iter()
        .filter_map(|row| match (row.strike, row.implied_volatility) {
            (Some(strike), Some(implied_volatility)) => Some(OptionRow {
                contract_symbol: row.contract_symbol,
                strike,
                implied_volatility,
            }),
            _ => {
                debug!("Dropping incomplete row {:?}", row.contract_symbol);
                None
            }
        })
        .collect()
}
