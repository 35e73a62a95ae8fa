//! Wallet scanner.
//!
//! Pulls ERC-20 balances and NFTs for an address, resolves token metadata
//! and USD prices through the TTL caches, classifies everything and
//! returns a [`ScanReport`].
//!
//! Only the balance source is load-bearing. A failing price source leaves
//! assets unpriced and a failing NFT source leaves the NFT list empty;
//! both are logged and the scan carries on.

use anyhow::{Context, Result};
use ethers::types::Address;
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::data::alchemy::AlchemyClient;
use crate::data::defillama::DefiLlamaClient;
use crate::data::{
    scale_balance, NftProvider, PriceProvider, RawTokenBalance, TokenBalanceProvider, TokenMetadata,
};
use crate::spam::SpamClassifier;
use crate::types::{Asset, NftHolding, ScanReport, TokenHolding};

/// ERC-20 convention when a contract reports no decimals.
const FALLBACK_DECIMALS: u8 = 18;

const NATIVE_PRICE_KEY: &str = "native";

pub struct Scanner {
    balances: Arc<dyn TokenBalanceProvider>,
    nfts: Arc<dyn NftProvider>,
    prices: Option<Arc<dyn PriceProvider>>,
    metadata_cache: TtlCache<TokenMetadata>,
    price_cache: TtlCache<Decimal>,
    classifier: SpamClassifier,
    chain_id: u64,
}

impl Scanner {
    /// Scanner with memory-only caches.
    pub fn new(
        balances: Arc<dyn TokenBalanceProvider>,
        nfts: Arc<dyn NftProvider>,
        prices: Option<Arc<dyn PriceProvider>>,
        classifier: SpamClassifier,
        chain_id: u64,
    ) -> Self {
        Self {
            balances,
            nfts,
            prices,
            metadata_cache: TtlCache::in_memory("token_metadata", 86_400),
            price_cache: TtlCache::in_memory("prices", 300),
            classifier,
            chain_id,
        }
    }

    pub fn with_caches(mut self, metadata: TtlCache<TokenMetadata>, prices: TtlCache<Decimal>) -> Self {
        self.metadata_cache = metadata;
        self.price_cache = prices;
        self
    }

    /// Wire up Alchemy, DeFiLlama and the configured caches.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = AppConfig::resolve_env(&config.alchemy.api_key_env)?;
        let alchemy = Arc::new(AlchemyClient::new(&config.alchemy.network, &api_key)?);

        let prices: Option<Arc<dyn PriceProvider>> = if config.prices.enabled {
            Some(Arc::new(DefiLlamaClient::new(&config.prices.defillama_chain)?))
        } else {
            None
        };

        let cache_dir = config.cache.dir.as_deref();
        let classifier = SpamClassifier::new(config.spam.clone(), config.chain.chain_id);

        Ok(Self::new(alchemy.clone(), alchemy, prices, classifier, config.chain.chain_id).with_caches(
            TtlCache::from_dir("token_metadata", config.cache.metadata_ttl_secs, cache_dir),
            TtlCache::from_dir("prices", config.cache.price_ttl_secs, cache_dir),
        ))
    }

    pub fn classifier(&self) -> &SpamClassifier {
        &self.classifier
    }

    /// Scan `owner` and classify every holding.
    pub async fn scan(&self, owner: Address) -> Result<ScanReport> {
        info!(owner = ?owner, chain_id = self.chain_id, "Starting wallet scan");

        let (balances, nfts) = tokio::join!(self.balances.token_balances(owner), self.nfts.nfts_for_owner(owner));

        let balances = balances
            .with_context(|| format!("{} balance lookup failed", self.balances.name()))?;

        let mut nfts = nfts.unwrap_or_else(|e| {
            warn!(provider = self.nfts.name(), error = %e, "NFT scan failed, continuing without");
            Vec::new()
        });

        let balances: Vec<RawTokenBalance> = balances.into_iter().filter(|b| !b.raw_balance.is_zero()).collect();
        info!(tokens = balances.len(), nfts = nfts.len(), "Raw holdings fetched");

        let metadata = self.resolve_metadata(&balances).await;
        let contracts: Vec<Address> = balances.iter().map(|b| b.contract).collect();
        let prices = self.resolve_prices(&contracts).await;

        let tokens: Vec<Asset> = balances
            .iter()
            .map(|b| {
                let meta = metadata.get(&b.contract).cloned().unwrap_or_default();
                Asset::Token(build_holding(b, meta, prices.get(&b.contract).copied()))
            })
            .collect();

        if nfts.iter().any(|n| n.floor_price_eth.is_some()) {
            let native = self.resolve_native_price().await;
            price_floors(&mut nfts, native);
        }

        let tokens = self.classifier.classify_all(tokens);
        let nfts = self.classifier.classify_all(nfts.into_iter().map(Asset::Nft).collect());

        for cache in [self.metadata_cache.flush(), self.price_cache.flush()] {
            if let Err(e) = cache {
                warn!(error = %e, "Failed to persist cache");
            }
        }

        let report = ScanReport::new(owner, self.chain_id, tokens, nfts);
        info!(
            tokens = report.tokens.len(),
            nfts = report.nfts.len(),
            spam = report.spam_count(),
            value = format!("${:.2}", report.total_value_usd),
            "Scan complete"
        );
        Ok(report)
    }

    async fn resolve_metadata(&self, balances: &[RawTokenBalance]) -> HashMap<Address, TokenMetadata> {
        let mut resolved = HashMap::new();
        let mut missing = Vec::new();

        for b in balances {
            match self.metadata_cache.get(&cache_key(&b.contract)) {
                Some(meta) => {
                    resolved.insert(b.contract, meta);
                }
                None => missing.push(b.contract),
            }
        }
        debug!(cached = resolved.len(), missing = missing.len(), "Resolving token metadata");

        let fetched = join_all(missing.iter().map(|contract| async move {
            (*contract, self.balances.token_metadata(*contract).await)
        }))
        .await;

        for (contract, result) in fetched {
            match result {
                Ok(meta) => {
                    self.metadata_cache.insert(&cache_key(&contract), meta.clone());
                    resolved.insert(contract, meta);
                }
                Err(e) => {
                    // Left out of the cache so the next scan retries.
                    warn!(contract = ?contract, error = %e, "Token metadata lookup failed");
                }
            }
        }
        resolved
    }

    async fn resolve_prices(&self, contracts: &[Address]) -> HashMap<Address, Decimal> {
        let mut prices = HashMap::new();
        let Some(provider) = &self.prices else {
            return prices;
        };

        let mut missing = Vec::new();
        for contract in contracts {
            match self.price_cache.get(&cache_key(contract)) {
                Some(p) => {
                    prices.insert(*contract, p);
                }
                None => missing.push(*contract),
            }
        }
        if missing.is_empty() {
            return prices;
        }

        match provider.prices_usd(&missing).await {
            Ok(fetched) => {
                debug!(requested = missing.len(), priced = fetched.len(), "Prices fetched");
                for (contract, price) in fetched {
                    self.price_cache.insert(&cache_key(&contract), price);
                    prices.insert(contract, price);
                }
            }
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Price lookup failed, continuing without prices");
            }
        }
        prices
    }

    async fn resolve_native_price(&self) -> Option<Decimal> {
        if let Some(p) = self.price_cache.get(NATIVE_PRICE_KEY) {
            return Some(p);
        }
        let provider = self.prices.as_ref()?;
        match provider.native_price_usd().await {
            Ok(Some(p)) => {
                self.price_cache.insert(NATIVE_PRICE_KEY, p);
                Some(p)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Native price lookup failed");
                None
            }
        }
    }
}

fn cache_key(contract: &Address) -> String {
    format!("{contract:?}")
}

/// Combine a raw balance with its metadata and price.
fn build_holding(balance: &RawTokenBalance, meta: TokenMetadata, price: Option<Decimal>) -> TokenHolding {
    let verified = meta.is_complete();
    let decimals = meta.decimals.unwrap_or(FALLBACK_DECIMALS);

    let mut holding = TokenHolding {
        contract: balance.contract,
        symbol: meta.symbol.unwrap_or_default(),
        name: meta.name.unwrap_or_default(),
        decimals,
        raw_balance: balance.raw_balance,
        balance: scale_balance(balance.raw_balance, decimals),
        price_usd: None,
        value_usd: None,
        logo: meta.logo,
        verified,
    };
    holding.apply_price(price);
    holding
}

/// Convert ETH floor prices to USD. Without a native price floors stay unset.
fn price_floors(nfts: &mut [NftHolding], native_usd: Option<Decimal>) {
    let Some(eth_usd) = native_usd else {
        return;
    };
    for nft in nfts.iter_mut() {
        if let Some(floor) = nft.floor_price_eth {
            nft.floor_price_usd = Some(floor.saturating_mul(eth_usd).round_dp(2));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
