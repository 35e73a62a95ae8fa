//! Alchemy integration.
//!
//! Token balances and metadata come from the enhanced JSON-RPC methods
//! (`alchemy_getTokenBalances`, `alchemy_getTokenMetadata`); NFTs come from
//! NFT API v3 `getNFTsForOwner`, which also carries Alchemy's own spam
//! classification per contract.
//!
//! RPC:  https://{network}.g.alchemy.com/v2/{key}
//! NFT:  https://{network}.g.alchemy.com/nft/v3/{key}/getNFTsForOwner

use anyhow::{Context, Result};
use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::Client;
use rust_decimal::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{parse_hex_u256, parse_token_id, NftProvider, RawTokenBalance, TokenBalanceProvider, TokenMetadata};
use crate::types::{NftHolding, NftStandard};

const PROVIDER_NAME: &str = "alchemy";

/// NFT API page size (API max is 100).
const NFT_PAGE_SIZE: u32 = 100;

/// Hard stop for pagination on pathological wallets.
const MAX_PAGES: usize = 50;

// ---------------------------------------------------------------------------
// API response types (Alchemy JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenBalancesResult {
    token_balances: Vec<AlchemyTokenBalance>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlchemyTokenBalance {
    contract_address: String,
    #[serde(default)]
    token_balance: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct AlchemyTokenMetadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    decimals: Option<i64>,
    #[serde(default)]
    logo: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedNftsResponse {
    owned_nfts: Vec<OwnedNft>,
    #[serde(default)]
    page_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedNft {
    contract: NftContract,
    token_id: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    image: Option<NftImage>,
    #[serde(default)]
    balance: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftContract {
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    is_spam: Option<bool>,
    #[serde(default)]
    spam_classifications: Vec<String>,
    #[serde(default)]
    open_sea_metadata: Option<OpenSeaMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSeaMetadata {
    #[serde(default)]
    floor_price: Option<f64>,
    #[serde(default)]
    collection_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NftImage {
    #[serde(default)]
    cached_url: Option<String>,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    original_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Alchemy balances, metadata and NFT client.
pub struct AlchemyClient {
    http: Client,
    rpc_url: String,
    nft_url: String,
}

impl AlchemyClient {
    pub fn new(network: &str, api_key: &str) -> Result<Self> {
        let base = format!("https://{network}.g.alchemy.com");
        Self::with_base_urls(
            format!("{base}/v2/{api_key}"),
            format!("{base}/nft/v3/{api_key}"),
        )
    }

    /// Point the client at arbitrary endpoints (proxies, local mocks).
    pub fn with_base_urls(rpc_url: String, nft_url: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("BaseClean/0.1.0")
            .build()
            .context("Failed to build HTTP client for Alchemy")?;

        Ok(Self { http, rpc_url, nft_url })
    }

    // -- Internal helpers ------------------------------------------------

    async fn rpc<T: serde::de::DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!(method, "Alchemy RPC request");

        let resp = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Alchemy {method} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Alchemy API error {status}: {body}");
        }

        let parsed: RpcResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Alchemy {method} response"))?;

        if let Some(err) = parsed.error {
            anyhow::bail!("Alchemy {method} error {}: {}", err.code, err.message);
        }
        parsed
            .result
            .with_context(|| format!("Alchemy {method} returned no result"))
    }

    async fn nft_page(&self, owner: Address, page_key: Option<&str>) -> Result<OwnedNftsResponse> {
        let mut url = format!(
            "{}/getNFTsForOwner?owner={owner:?}&withMetadata=true&pageSize={NFT_PAGE_SIZE}",
            self.nft_url
        );
        if let Some(key) = page_key {
            url.push_str(&format!("&pageKey={}", urlencoding::encode(key)));
        }

        let resp = self
            .http
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .context("Alchemy getNFTsForOwner request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Alchemy NFT API error {status}: {body}");
        }

        resp.json()
            .await
            .context("Failed to parse Alchemy getNFTsForOwner response")
    }

    /// Keep only parseable, non-zero balances.
    fn to_raw_balances(page: &TokenBalancesResult) -> Vec<RawTokenBalance> {
        page.token_balances
            .iter()
            .filter(|b| b.error.is_none())
            .filter_map(|b| {
                let contract = b.contract_address.parse::<Address>().ok()?;
                let raw_balance = parse_hex_u256(b.token_balance.as_deref()?)?;
                (!raw_balance.is_zero()).then_some(RawTokenBalance { contract, raw_balance })
            })
            .collect()
    }

    fn to_metadata(m: AlchemyTokenMetadata) -> TokenMetadata {
        let non_empty = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        TokenMetadata {
            name: non_empty(m.name),
            symbol: non_empty(m.symbol),
            decimals: m.decimals.and_then(|d| u8::try_from(d).ok()),
            logo: non_empty(m.logo),
        }
    }

    /// Convert an Alchemy `OwnedNft` into a holding. Skips entries with
    /// unparseable addresses or ids and non-NFT token types.
    fn to_holding(nft: OwnedNft) -> Option<NftHolding> {
        let contract = nft.contract.address.parse::<Address>().ok()?;
        let token_id = parse_token_id(&nft.token_id)?;

        let type_str = nft
            .token_type
            .as_deref()
            .or(nft.contract.token_type.as_deref())
            .unwrap_or("ERC721");
        let standard: NftStandard = type_str.parse().ok()?;

        let amount = match standard {
            NftStandard::Erc721 => U256::one(),
            NftStandard::Erc1155 => nft
                .balance
                .as_deref()
                .and_then(parse_token_id)
                .unwrap_or_else(U256::one),
        };

        let collection_name = nft
            .contract
            .open_sea_metadata
            .as_ref()
            .and_then(|o| o.collection_name.clone())
            .or_else(|| nft.contract.name.clone())
            .unwrap_or_default();

        let floor_price_eth = nft
            .contract
            .open_sea_metadata
            .as_ref()
            .and_then(|o| o.floor_price)
            .filter(|p| *p > 0.0)
            .and_then(Decimal::from_f64);

        let image = nft.image.and_then(|i| i.cached_url.or(i.thumbnail_url).or(i.original_url));

        Some(NftHolding {
            contract,
            token_id,
            standard,
            amount,
            name: nft.name.unwrap_or_default(),
            collection_name,
            image,
            floor_price_eth,
            floor_price_usd: None,
            provider_spam: nft.contract.is_spam.unwrap_or(false),
            provider_spam_reasons: nft.contract.spam_classifications,
        })
    }
}

// ---------------------------------------------------------------------------
// Provider trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl TokenBalanceProvider for AlchemyClient {
    async fn token_balances(&self, owner: Address) -> Result<Vec<RawTokenBalance>> {
        let mut balances = Vec::new();
        let mut page_key: Option<String> = None;

        for page in 0..MAX_PAGES {
            let params = match &page_key {
                Some(k) => json!([format!("{owner:?}"), "erc20", { "pageKey": k }]),
                None => json!([format!("{owner:?}"), "erc20"]),
            };
            let result: TokenBalancesResult = self.rpc("alchemy_getTokenBalances", params).await?;
            balances.extend(Self::to_raw_balances(&result));

            debug!(page, total = balances.len(), "Token balance page fetched");

            match result.page_key {
                Some(k) if !k.is_empty() => page_key = Some(k),
                _ => break,
            }
        }

        info!(owner = ?owner, count = balances.len(), "Token balances fetched");
        Ok(balances)
    }

    async fn token_metadata(&self, contract: Address) -> Result<TokenMetadata> {
        let meta: AlchemyTokenMetadata = self
            .rpc("alchemy_getTokenMetadata", json!([format!("{contract:?}")]))
            .await?;
        Ok(Self::to_metadata(meta))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl NftProvider for AlchemyClient {
    async fn nfts_for_owner(&self, owner: Address) -> Result<Vec<NftHolding>> {
        let mut holdings = Vec::new();
        let mut page_key: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.nft_page(owner, page_key.as_deref()).await?;
            let fetched = page.owned_nfts.len();
            let before = holdings.len();
            holdings.extend(page.owned_nfts.into_iter().filter_map(Self::to_holding));
            if holdings.len() - before < fetched {
                warn!(skipped = fetched - (holdings.len() - before), "Skipped malformed NFT entries");
            }

            match page.page_key {
                Some(k) if !k.is_empty() => page_key = Some(k),
                _ => break,
            }
        }

        info!(owner = ?owner, count = holdings.len(), "NFTs fetched");
        Ok(holdings)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
