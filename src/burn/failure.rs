//! Burn failure categories.
//!
//! Providers, signers and nodes all report failures as free text. The
//! orchestrator folds that text into a small set of categories so the
//! summary can say *why* items failed without leaking RPC noise.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum BurnFailure {
    #[error("rejected by user")]
    UserRejected,
    #[error("insufficient funds for gas")]
    InsufficientFunds,
    #[error("transaction reverted")]
    Reverted,
    #[error("gas estimation failed")]
    GasEstimation,
    #[error("nonce conflict")]
    Nonce,
    #[error("network error")]
    Network,
    #[error("timed out waiting for the network")]
    Timeout,
    #[error("unknown error")]
    Unknown,
}

const USER_REJECTED: &[&str] = &[
    "user rejected",
    "user denied",
    "rejected by user",
    "action_rejected",
    "code: 4001",
];
const INSUFFICIENT_FUNDS: &[&str] = &["insufficient funds", "insufficient balance for transfer"];
const NONCE: &[&str] = &[
    "nonce too low",
    "nonce too high",
    "invalid nonce",
    "replacement transaction underpriced",
    "already known",
];
const GAS_ESTIMATION: &[&str] = &[
    "cannot estimate gas",
    "gas required exceeds",
    "intrinsic gas too low",
    "out of gas",
    "unpredictable_gas_limit",
];
const REVERTED: &[&str] = &["execution reverted", "reverted", "revert"];
const TIMEOUT: &[&str] = &["timed out", "timeout", "deadline has elapsed"];
const NETWORK: &[&str] = &[
    "error sending request",
    "connection refused",
    "connection reset",
    "dns error",
    "rate limit",
    "too many requests",
    "bad gateway",
    "service unavailable",
];

/// Retryable HTTP statuses, only where the text names them as a status.
static HTTP_STATUS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\b(status|http)( code)?[\s:=]*|\()(429|502|503)\b")
        .expect("static regex")
});

/// Map an error message to a failure category. First match wins, in the
/// order user rejection, funds, nonce, gas, revert, timeout, network.
pub fn categorize(message: &str) -> BurnFailure {
    let msg = message.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| msg.contains(n));

    if any(USER_REJECTED) {
        BurnFailure::UserRejected
    } else if any(INSUFFICIENT_FUNDS) {
        BurnFailure::InsufficientFunds
    } else if any(NONCE) {
        BurnFailure::Nonce
    } else if any(GAS_ESTIMATION) {
        BurnFailure::GasEstimation
    } else if any(REVERTED) {
        BurnFailure::Reverted
    } else if any(TIMEOUT) {
        BurnFailure::Timeout
    } else if any(NETWORK) || HTTP_STATUS_RE.is_match(message) {
        BurnFailure::Network
    } else {
        BurnFailure::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_common_messages() {
        assert_eq!(categorize("MetaMask Tx Signature: User denied transaction signature."), BurnFailure::UserRejected);
        assert_eq!(
            categorize("(code: -32000, message: insufficient funds for gas * price + value, data: None)"),
            BurnFailure::InsufficientFunds
        );
        assert_eq!(categorize("nonce too low: next nonce 12, tx nonce 11"), BurnFailure::Nonce);
        assert_eq!(
            categorize("cannot estimate gas; transaction may fail or may require manual gas limit"),
            BurnFailure::GasEstimation
        );
        assert_eq!(
            categorize("(code: 3, message: execution reverted: ERC20: transfer amount exceeds balance)"),
            BurnFailure::Reverted
        );
        assert_eq!(categorize("Receipt wait timed out after 120s"), BurnFailure::Timeout);
        assert_eq!(
            categorize("error sending request for url (https://mainnet.base.org/)"),
            BurnFailure::Network
        );
        assert_eq!(categorize("something odd"), BurnFailure::Unknown);
    }

    #[test]
    fn test_rejection_wins_over_other_matches() {
        // Wallets sometimes wrap rejections in generic revert text.
        assert_eq!(
            categorize("execution reverted: user rejected the request"),
            BurnFailure::UserRejected
        );
    }

    #[test]
    fn test_http_status_needs_status_context() {
        assert_eq!(categorize("HTTP status server error (503) for url"), BurnFailure::Network);
        assert_eq!(categorize("unexpected http 502 from upstream"), BurnFailure::Network);
        assert_eq!(categorize("rpc answered with status code 429"), BurnFailure::Network);
        // Status digits inside hashes and addresses are not HTTP errors.
        assert_eq!(
            categorize("tx 0x4295030000000000000000000000000000000000000000000000000000502503 dropped"),
            BurnFailure::Unknown
        );
        assert_eq!(
            categorize("unknown account 0x0000000000000000000000000000000000000429"),
            BurnFailure::Unknown
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(BurnFailure::Reverted.to_string(), "transaction reverted");
    }
}
