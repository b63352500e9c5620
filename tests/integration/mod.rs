//! Integration tests for the pub/sub client core

mod auto_heartbeat;
mod config_integration;
mod test_utils;
mod transaction_lifecycle;

pub use test_utils::{context_with, wait_until, with_xdg_env};
