//! DeFiLlama price lookups.
//!
//! API docs: https://defillama.com/docs/api
//! Endpoint: GET https://coins.llama.fi/prices/current/{coins}
//! Coins are `{chain}:{address}` joined by commas; no auth required.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::Address;
use reqwest::Client;
use rust_decimal::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::PriceProvider;

const BASE_URL: &str = "https://coins.llama.fi";
const PROVIDER_NAME: &str = "defillama";

/// Coin id DeFiLlama uses for native ETH pricing.
const NATIVE_COIN: &str = "coingecko:ethereum";

/// Keep URLs comfortably below common length limits.
const MAX_COINS_PER_REQUEST: usize = 50;

/// Prices below this confidence are treated as unknown.
const MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Deserialize)]
struct PricesResponse {
    #[serde(default)]
    coins: HashMap<String, LlamaCoin>,
}

#[derive(Debug, Deserialize)]
struct LlamaCoin {
    price: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

/// DeFiLlama coins API client.
pub struct DefiLlamaClient {
    http: Client,
    base_url: String,
    chain: String,
}

impl DefiLlamaClient {
    pub fn new(chain: &str) -> Result<Self> {
        Self::with_base_url(chain, BASE_URL)
    }

    pub fn with_base_url(chain: &str, base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .user_agent("BaseClean/0.1.0")
            .build()
            .context("Failed to build HTTP client for DeFiLlama")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            chain: chain.to_string(),
        })
    }

    fn coin_id(&self, contract: &Address) -> String {
        format!("{}:{contract:?}", self.chain)
    }

    async fn fetch(&self, coins: &[String]) -> Result<PricesResponse> {
        let url = format!("{}/prices/current/{}", self.base_url, coins.join(","));
        debug!(coins = coins.len(), "Fetching DeFiLlama prices");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("DeFiLlama price request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("DeFiLlama API error {status}: {body}");
        }

        resp.json()
            .await
            .context("Failed to parse DeFiLlama price response")
    }

    /// Map `{chain}:{address}` keys back to addresses, dropping entries
    /// from other chains, non-positive prices and low-confidence quotes.
    fn parse_prices(&self, resp: PricesResponse) -> HashMap<Address, Decimal> {
        let prefix = format!("{}:", self.chain);
        resp.coins
            .into_iter()
            .filter_map(|(key, coin)| {
                let addr = key.strip_prefix(&prefix)?.parse::<Address>().ok()?;
                if coin.price <= 0.0 || coin.confidence.unwrap_or(1.0) < MIN_CONFIDENCE {
                    return None;
                }
                Some((addr, Decimal::from_f64(coin.price)?))
            })
            .collect()
    }
}

#[async_trait]
impl PriceProvider for DefiLlamaClient {
    async fn prices_usd(&self, contracts: &[Address]) -> Result<HashMap<Address, Decimal>> {
        let mut prices = HashMap::new();

        for chunk in contracts.chunks(MAX_COINS_PER_REQUEST) {
            let coins: Vec<String> = chunk.iter().map(|c| self.coin_id(c)).collect();
            match self.fetch(&coins).await {
                Ok(resp) => prices.extend(self.parse_prices(resp)),
                Err(e) => {
                    // One failed chunk should not hide prices from the rest.
                    warn!(error = %e, chunk = chunk.len(), "DeFiLlama chunk failed, continuing");
                }
            }
        }

        debug!(requested = contracts.len(), priced = prices.len(), "Prices resolved");
        Ok(prices)
    }

    async fn native_price_usd(&self) -> Result<Option<Decimal>> {
        let resp = self.fetch(&[NATIVE_COIN.to_string()]).await?;
        Ok(resp
            .coins
            .get(NATIVE_COIN)
            .filter(|c| c.price > 0.0)
            .and_then(|c| Decimal::from_f64(c.price)))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
