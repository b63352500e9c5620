//! Channel / channel-group registry.
//!
//! Remembers what a context is subscribed to. A subscribe or leave without explicit
//! channels uses the registered lists, and the heartbeat scheduler thumps with them.

use std::collections::BTreeSet;

/// Split a comma-joined list, skipping empty names
fn names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|name| !name.is_empty())
}

/// Add every name of `list` not yet in `set`
pub fn merge_into(set: &mut BTreeSet<String>, list: &str) {
    for name in names(list) {
        if !set.contains(name) {
            set.insert(name.to_string());
        }
    }
}

/// Remove every name of `leave_list` from `set`
pub fn remove(set: &mut BTreeSet<String>, leave_list: &str) {
    for name in names(leave_list) {
        set.remove(name);
    }
}

/// Comma-joined representation, `None` when empty
pub fn joined(set: &BTreeSet<String>) -> Option<String> {
    if set.is_empty() {
        None
    } else {
        Some(set.iter().cloned().collect::<Vec<_>>().join(","))
    }
}

/// Channels and channel groups registered on a context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    channels: BTreeSet<String>,
    channel_groups: BTreeSet<String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a subscription. Both `None` is a no-op.
    pub fn merge(&mut self, channel: Option<&str>, channel_group: Option<&str>) {
        if let Some(channel) = channel {
            merge_into(&mut self.channels, channel);
        }
        if let Some(group) = channel_group {
            merge_into(&mut self.channel_groups, group);
        }
    }

    /// Record a leave. Both `None` means leaving everything.
    pub fn leave(&mut self, channel: Option<&str>, channel_group: Option<&str>) {
        if channel.is_none() && channel_group.is_none() {
            self.clear();
            return;
        }
        if let Some(channel) = channel {
            remove(&mut self.channels, channel);
        }
        if let Some(group) = channel_group {
            remove(&mut self.channel_groups, group);
        }
    }

    /// Registered lists when the caller gave neither, otherwise the caller's values
    pub fn resolve_defaults(
        &self,
        channel: Option<&str>,
        channel_group: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        if channel.is_none() && channel_group.is_none() {
            (self.channel(), self.channel_group())
        } else {
            (channel.map(str::to_string), channel_group.map(str::to_string))
        }
    }

    pub fn channel(&self) -> Option<String> {
        joined(&self.channels)
    }

    pub fn channel_group(&self) -> Option<String> {
        joined(&self.channel_groups)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.channel_groups.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.channel_groups.clear();
    }
}
