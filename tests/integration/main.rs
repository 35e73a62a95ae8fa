//! Integration tests: full scan → select → burn pipeline against a mock
//! chain and fake data providers.

mod burn_flow;
mod mock_chain;
mod scan_pipeline;
