//! Spam classification.
//!
//! Scores every holding against naming, value, airdrop and risk signals
//! (see [`signals`]), sums the weights of the signals that fired and
//! thresholds the score by the holding's estimated USD value. Valuable
//! assets need far stronger evidence before they are called spam.

pub mod signals;

use ethers::types::Address;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::SpamConfig;
use crate::types::{Asset, ClassifiedAsset, NftHolding, SpamLevel, SpamSignal, SpamVerdict, TokenHolding};

impl SpamSignal {
    /// Contribution of this signal to the spam score.
    pub fn weight(&self) -> u32 {
        match self {
            SpamSignal::EmbeddedUrl => 4,
            SpamSignal::BaitKeyword => 3,
            SpamSignal::NonAsciiName => 2,
            SpamSignal::OverlongName => 1,
            SpamSignal::MissingName => 2,
            SpamSignal::ImpersonatesBlueChip => 4,
            SpamSignal::NoPrice => 2,
            SpamSignal::DustValue => 1,
            SpamSignal::ZeroDecimalsHugeBalance => 2,
            SpamSignal::RoundBalance => 1,
            SpamSignal::ImplausibleBalance => 2,
            SpamSignal::UnsolicitedQuantity => 1,
            SpamSignal::ProviderFlagged => 5,
            SpamSignal::UnverifiedMetadata => 2,
            SpamSignal::MissingImage => 1,
            SpamSignal::Blocklisted => 10,
        }
    }
}

/// Heuristic spam classifier for one chain.
pub struct SpamClassifier {
    config: SpamConfig,
    chain_id: u64,
    allowlist: HashSet<Address>,
    blocklist: HashSet<Address>,
}

impl SpamClassifier {
    pub fn new(config: SpamConfig, chain_id: u64) -> Self {
        let parse_list = |list: &[String], which: &str| -> HashSet<Address> {
            list.iter()
                .filter_map(|s| match s.parse::<Address>() {
                    Ok(a) => Some(a),
                    Err(e) => {
                        warn!(entry = %s, list = which, error = %e, "Ignoring invalid address in spam list");
                        None
                    }
                })
                .collect()
        };
        let allowlist = parse_list(&config.allowlist, "allowlist");
        let blocklist = parse_list(&config.blocklist, "blocklist");

        Self {
            config,
            chain_id,
            allowlist,
            blocklist,
        }
    }

    pub fn config(&self) -> &SpamConfig {
        &self.config
    }

    pub fn classify_token(&self, token: &TokenHolding) -> SpamVerdict {
        if self.allowlist.contains(&token.contract) {
            return SpamVerdict::clean();
        }

        let mut fired = signals::token_naming_signals(token, self.chain_id, &self.config);
        fired.extend(signals::token_value_signals(token, &self.config));
        fired.extend(signals::token_airdrop_signals(token, &self.config));
        fired.extend(signals::token_risk_signals(token));
        if self.blocklist.contains(&token.contract) {
            fired.push(SpamSignal::Blocklisted);
        }

        let verdict = self.verdict(fired, token.value_usd);
        debug!(
            symbol = %token.symbol,
            contract = ?token.contract,
            score = verdict.score,
            level = %verdict.level,
            "Token classified"
        );
        verdict
    }

    pub fn classify_nft(&self, nft: &NftHolding) -> SpamVerdict {
        if self.allowlist.contains(&nft.contract) {
            return SpamVerdict::clean();
        }

        let mut fired = signals::nft_naming_signals(nft, &self.config);
        fired.extend(signals::nft_value_signals(nft, &self.config));
        fired.extend(signals::nft_airdrop_signals(nft));
        fired.extend(signals::nft_risk_signals(nft));
        if self.blocklist.contains(&nft.contract) {
            fired.push(SpamSignal::Blocklisted);
        }

        let verdict = self.verdict(fired, nft.value_usd());
        debug!(
            collection = %nft.collection_name,
            token_id = %nft.token_id,
            score = verdict.score,
            level = %verdict.level,
            "NFT classified"
        );
        verdict
    }

    pub fn classify(&self, asset: &Asset) -> SpamVerdict {
        match asset {
            Asset::Token(t) => self.classify_token(t),
            Asset::Nft(n) => self.classify_nft(n),
        }
    }

    /// Classify a batch. Spam first, then by descending score; ties keep
    /// their input order.
    pub fn classify_all(&self, assets: Vec<Asset>) -> Vec<ClassifiedAsset> {
        let mut classified: Vec<ClassifiedAsset> = assets
            .into_iter()
            .map(|asset| {
                let verdict = self.classify(&asset);
                ClassifiedAsset { asset, verdict }
            })
            .collect();

        classified.sort_by(|a, b| {
            b.verdict
                .level
                .cmp(&a.verdict.level)
                .then(b.verdict.score.cmp(&a.verdict.score))
        });
        classified
    }

    /// Sum the fired signals and pick a level for the asset's value band.
    fn verdict(&self, fired: Vec<SpamSignal>, value_usd: Option<Decimal>) -> SpamVerdict {
        let score: u32 = fired.iter().map(|s| s.weight()).sum();
        let value = value_usd.unwrap_or(Decimal::ZERO);
        let cfg = &self.config;

        let level = if fired.contains(&SpamSignal::Blocklisted) {
            SpamLevel::Spam
        } else if value >= cfg.high_value_usd {
            // Never auto-flag something worth real money.
            if score >= cfg.suspicious_threshold {
                SpamLevel::Suspicious
            } else {
                SpamLevel::Clean
            }
        } else if value >= cfg.medium_value_usd {
            if score >= cfg.medium_value_threshold {
                SpamLevel::Spam
            } else if score >= cfg.suspicious_threshold {
                SpamLevel::Suspicious
            } else {
                SpamLevel::Clean
            }
        } else if score >= cfg.spam_threshold {
            SpamLevel::Spam
        } else if score >= cfg.suspicious_threshold {
            SpamLevel::Suspicious
        } else {
            SpamLevel::Clean
        };

        SpamVerdict {
            score,
            signals: fired,
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
