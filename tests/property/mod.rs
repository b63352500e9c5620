//! Property-based tests for registry bookkeeping and timeout clamping

mod registry;
mod timeouts;
