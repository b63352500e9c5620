//! Property-based tests for timeout clamping

use proptest::prelude::*;
use pubsub_client::transport::ScriptedTransportFactory;
use pubsub_client::types::{MIN_TRANSACTION_TIMER_MS, MIN_WAIT_CONNECT_TIMER_MS};
use pubsub_client::{Context, ContextOptions, ContextSettings};
use std::sync::Arc;

fn context() -> Context {
    Context::with_options(
        ContextSettings::new("pub", "sub"),
        ContextOptions::default().with_transport(Arc::new(ScriptedTransportFactory::new())),
    )
}

proptest! {
    /// The value in effect is never below the floor, and setting it again changes nothing
    #[test]
    fn test_transaction_timeout_clamp_is_idempotent(requested in 0u64..1_000_000) {
        let ctx = context();
        let applied = ctx.set_transaction_timeout(requested);
        prop_assert_eq!(applied, requested.max(MIN_TRANSACTION_TIMER_MS));
        prop_assert_eq!(ctx.set_transaction_timeout(applied), applied);
        prop_assert_eq!(ctx.transaction_timeout(), applied);
    }

    #[test]
    fn test_connect_timeout_clamp_is_idempotent(requested in 0u64..100_000) {
        let ctx = context();
        let applied = ctx.set_connect_timeout(requested);
        prop_assert_eq!(applied, requested.max(MIN_WAIT_CONNECT_TIMER_MS));
        prop_assert_eq!(ctx.set_connect_timeout(applied), applied);
    }
}
