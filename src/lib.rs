//! BASECLEAN: spam token and NFT cleanup for EVM wallets
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod cache;
pub mod data;
pub mod spam;
pub mod burn;
pub mod engine;
pub mod storage;
pub mod dashboard;
