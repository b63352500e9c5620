//! Per-kind convenience wrappers over [`Context::start_transaction`].

use super::Context;
use crate::request::{PublishOptions, SubscribeV2Options, TransactionParams};
use crate::types::{ActionType, TransactionResult};

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

impl Context {
    pub fn publish(&self, channel: &str, message: &str) -> TransactionResult {
        self.publish_with(channel, message, PublishOptions::default())
    }

    pub fn publish_with(
        &self,
        channel: &str,
        message: &str,
        options: PublishOptions,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::Publish {
            channel: channel.to_string(),
            message: message.to_string(),
            options,
        })
    }

    pub fn signal(&self, channel: &str, message: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::Signal {
            channel: channel.to_string(),
            message: message.to_string(),
        })
    }

    /// Subscribe; with neither channel nor group the registered lists are used
    pub fn subscribe(&self, channel: Option<&str>, channel_group: Option<&str>) -> TransactionResult {
        self.start_transaction(TransactionParams::Subscribe {
            channel: owned(channel),
            channel_group: owned(channel_group),
        })
    }

    pub fn subscribe_v2(
        &self,
        channel: Option<&str>,
        channel_group: Option<&str>,
        options: SubscribeV2Options,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::SubscribeV2 {
            channel: owned(channel),
            channel_group: owned(channel_group),
            options,
        })
    }

    /// Leave; with neither channel nor group everything registered is left
    pub fn leave(&self, channel: Option<&str>, channel_group: Option<&str>) -> TransactionResult {
        self.start_transaction(TransactionParams::Leave {
            channel: owned(channel),
            channel_group: owned(channel_group),
        })
    }

    pub fn time(&self) -> TransactionResult {
        self.start_transaction(TransactionParams::Time)
    }

    pub fn history(&self, channel: &str, count: u32, include_token: bool) -> TransactionResult {
        self.start_transaction(TransactionParams::History {
            channel: channel.to_string(),
            count,
            include_token,
        })
    }

    pub fn heartbeat(&self, channel: Option<&str>, channel_group: Option<&str>) -> TransactionResult {
        self.start_transaction(TransactionParams::Heartbeat {
            channel: owned(channel),
            channel_group: owned(channel_group),
        })
    }

    pub fn here_now(&self, channel: Option<&str>, channel_group: Option<&str>) -> TransactionResult {
        self.start_transaction(TransactionParams::HereNow {
            channel: owned(channel),
            channel_group: owned(channel_group),
        })
    }

    pub fn global_here_now(&self) -> TransactionResult {
        self.start_transaction(TransactionParams::GlobalHereNow)
    }

    /// Channels `uuid` (default: this context's UUID) is present on
    pub fn where_now(&self, uuid: Option<&str>) -> TransactionResult {
        self.start_transaction(TransactionParams::WhereNow { uuid: owned(uuid) })
    }

    pub fn set_state(
        &self,
        channel: Option<&str>,
        channel_group: Option<&str>,
        uuid: Option<&str>,
        state: &str,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::SetState {
            channel: owned(channel),
            channel_group: owned(channel_group),
            uuid: owned(uuid),
            state: state.to_string(),
        })
    }

    pub fn state_get(
        &self,
        channel: Option<&str>,
        channel_group: Option<&str>,
        uuid: Option<&str>,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::StateGet {
            channel: owned(channel),
            channel_group: owned(channel_group),
            uuid: owned(uuid),
        })
    }

    pub fn remove_channel_group(&self, channel_group: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::RemoveChannelGroup {
            channel_group: channel_group.to_string(),
        })
    }

    pub fn remove_channel_from_group(&self, channel: &str, channel_group: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::RemoveChannelFromGroup {
            channel: channel.to_string(),
            channel_group: channel_group.to_string(),
        })
    }

    pub fn add_channel_to_group(&self, channel: &str, channel_group: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::AddChannelToGroup {
            channel: channel.to_string(),
            channel_group: channel_group.to_string(),
        })
    }

    pub fn list_channel_group(&self, channel_group: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::ListChannelGroup {
            channel_group: channel_group.to_string(),
        })
    }

    /// Add a message action; `value` must be JSON
    pub fn add_action(
        &self,
        channel: &str,
        message_timetoken: &str,
        action_type: ActionType,
        value: &str,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::AddAction {
            channel: channel.to_string(),
            message_timetoken: message_timetoken.to_string(),
            action_type,
            value: value.to_string(),
        })
    }

    pub fn remove_action(
        &self,
        channel: &str,
        message_timetoken: &str,
        action_timetoken: &str,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::RemoveAction {
            channel: channel.to_string(),
            message_timetoken: message_timetoken.to_string(),
            action_timetoken: action_timetoken.to_string(),
        })
    }

    pub fn get_actions(
        &self,
        channel: &str,
        start: Option<&str>,
        end: Option<&str>,
        limit: usize,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::GetActions {
            channel: channel.to_string(),
            start: owned(start),
            end: owned(end),
            limit,
        })
    }

    /// Next page of the last `get_actions`; `ActionsApiError` when there is none
    pub fn get_actions_more(&self) -> TransactionResult {
        self.start_transaction(TransactionParams::GetActionsMore)
    }

    pub fn history_with_actions(
        &self,
        channel: &str,
        start: Option<&str>,
        end: Option<&str>,
        limit: usize,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::HistoryWithActions {
            channel: channel.to_string(),
            start: owned(start),
            end: owned(end),
            limit,
        })
    }

    pub fn history_with_actions_more(&self) -> TransactionResult {
        self.start_transaction(TransactionParams::HistoryWithActionsMore)
    }

    pub fn fetch_all_users(
        &self,
        include: &[&str],
        limit: usize,
        start: Option<&str>,
        end: Option<&str>,
        count: Option<bool>,
    ) -> TransactionResult {
        self.start_transaction(TransactionParams::FetchAllUsers {
            include: include.iter().map(|s| s.to_string()).collect(),
            limit,
            start: owned(start),
            end: owned(end),
            count,
        })
    }

    pub fn create_user(&self, include: &[&str], user_obj: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::CreateUser {
            include: include.iter().map(|s| s.to_string()).collect(),
            user_obj: user_obj.to_string(),
        })
    }

    pub fn fetch_user(&self, include: &[&str], user_id: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::FetchUser {
            include: include.iter().map(|s| s.to_string()).collect(),
            user_id: user_id.to_string(),
        })
    }

    /// Update a user; the id is taken from `user_obj`
    pub fn update_user(&self, include: &[&str], user_obj: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::UpdateUser {
            include: include.iter().map(|s| s.to_string()).collect(),
            user_obj: user_obj.to_string(),
        })
    }

    pub fn delete_user(&self, user_id: &str) -> TransactionResult {
        self.start_transaction(TransactionParams::DeleteUser {
            user_id: user_id.to_string(),
        })
    }
}
