//! Property-based tests for channel registry bookkeeping

use proptest::prelude::*;
use pubsub_client::ChannelRegistry;
use std::collections::BTreeSet;

fn channel_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z][a-z0-9_-]{0,7}", 0..8)
}

fn as_list(names: &[String]) -> String {
    names.join(",")
}

fn as_set(list: Option<String>) -> BTreeSet<String> {
    list.map(|l| l.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

proptest! {
    /// Merging a list twice registers each name once
    #[test]
    fn test_merge_is_idempotent(names in channel_names()) {
        let mut registry = ChannelRegistry::new();
        registry.merge(Some(&as_list(&names)), None);
        let once = registry.channel();
        registry.merge(Some(&as_list(&names)), None);
        prop_assert_eq!(registry.channel(), once.clone());

        let expected: BTreeSet<String> = names.iter().cloned().collect();
        prop_assert_eq!(as_set(once), expected);
    }

    /// Leaving what was just merged restores the previous registry
    #[test]
    fn test_merge_then_leave_restores(base in channel_names(), extra in channel_names()) {
        let extra: Vec<String> = extra
            .into_iter()
            .filter(|name| !base.contains(name))
            .collect();
        prop_assume!(!extra.is_empty());

        let mut registry = ChannelRegistry::new();
        registry.merge(Some(&as_list(&base)), None);
        let before = registry.clone();

        registry.merge(Some(&as_list(&extra)), None);
        registry.leave(Some(&as_list(&extra)), None);
        prop_assert_eq!(registry, before);
    }

    /// Channels and groups are tracked independently
    #[test]
    fn test_groups_do_not_touch_channels(channels in channel_names(), groups in channel_names()) {
        let mut registry = ChannelRegistry::new();
        registry.merge(Some(&as_list(&channels)), Some(&as_list(&groups)));
        let channel_list = registry.channel();
        registry.leave(None, Some(&as_list(&groups)));
        prop_assert_eq!(registry.channel(), channel_list);
        prop_assert_eq!(registry.channel_group(), None);
    }
}
