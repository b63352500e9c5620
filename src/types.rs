//! Core types shared across the client: transaction kinds, outcome codes and limits.

use serde::{Deserialize, Serialize};

/// Maximum number of concurrently provisioned heartbeat thumpers per scheduler
pub const MAX_HEARTBEAT_THUMPERS: usize = 16;

/// Floor for the transaction timeout; also the floor for heartbeat periods (in seconds)
pub const MIN_TRANSACTION_TIMER_MS: u64 = 10_000;

/// Floor for the DNS/connect timeout
pub const MIN_WAIT_CONNECT_TIMER_MS: u64 = 5_000;

pub const DEFAULT_TRANSACTION_TIMER_MS: u64 = 310_000;

pub const DEFAULT_WAIT_CONNECT_TIMER_MS: u64 = 10_000;

/// Default origin host
pub const DEFAULT_ORIGIN: &str = "ps.pndsn.com";

/// SDK identification sent with every request
pub const SDK_NAME: &str = concat!("pubsub-client-rust/", env!("CARGO_PKG_VERSION"));

/// Minimum heartbeat period, derived from the transaction timer floor
pub const fn min_heartbeat_period_sec() -> u64 {
    MIN_TRANSACTION_TIMER_MS / 1000
}

/// Kind of transaction a context is (or was last) running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    None,
    Publish,
    Signal,
    Subscribe,
    SubscribeV2,
    Leave,
    Time,
    History,
    Heartbeat,
    HereNow,
    GlobalHereNow,
    WhereNow,
    SetState,
    StateGet,
    RemoveChannelGroup,
    RemoveChannelFromGroup,
    AddChannelToGroup,
    ListChannelGroup,
    AddAction,
    RemoveAction,
    GetActions,
    GetActionsMore,
    HistoryWithActions,
    HistoryWithActionsMore,
    FetchAllUsers,
    CreateUser,
    FetchUser,
    UpdateUser,
    DeleteUser,
}

impl TransactionKind {
    /// Long-poll subscribe transactions; these refresh presence on their own
    pub fn is_subscribe_family(self) -> bool {
        matches!(self, TransactionKind::Subscribe | TransactionKind::SubscribeV2)
    }

    /// Transactions that parse the message-actions response envelope
    pub fn is_actions_api(self) -> bool {
        matches!(
            self,
            TransactionKind::AddAction
                | TransactionKind::RemoveAction
                | TransactionKind::GetActions
                | TransactionKind::GetActionsMore
                | TransactionKind::HistoryWithActions
                | TransactionKind::HistoryWithActionsMore
        )
    }

    pub fn is_objects_api(self) -> bool {
        matches!(
            self,
            TransactionKind::FetchAllUsers
                | TransactionKind::CreateUser
                | TransactionKind::FetchUser
                | TransactionKind::UpdateUser
                | TransactionKind::DeleteUser
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::None => "none",
            TransactionKind::Publish => "publish",
            TransactionKind::Signal => "signal",
            TransactionKind::Subscribe => "subscribe",
            TransactionKind::SubscribeV2 => "subscribe_v2",
            TransactionKind::Leave => "leave",
            TransactionKind::Time => "time",
            TransactionKind::History => "history",
            TransactionKind::Heartbeat => "heartbeat",
            TransactionKind::HereNow => "here_now",
            TransactionKind::GlobalHereNow => "global_here_now",
            TransactionKind::WhereNow => "where_now",
            TransactionKind::SetState => "set_state",
            TransactionKind::StateGet => "state_get",
            TransactionKind::RemoveChannelGroup => "remove_channel_group",
            TransactionKind::RemoveChannelFromGroup => "remove_channel_from_group",
            TransactionKind::AddChannelToGroup => "add_channel_to_group",
            TransactionKind::ListChannelGroup => "list_channel_group",
            TransactionKind::AddAction => "add_action",
            TransactionKind::RemoveAction => "remove_action",
            TransactionKind::GetActions => "get_actions",
            TransactionKind::GetActionsMore => "get_actions_more",
            TransactionKind::HistoryWithActions => "history_with_actions",
            TransactionKind::HistoryWithActionsMore => "history_with_actions_more",
            TransactionKind::FetchAllUsers => "fetch_all_users",
            TransactionKind::CreateUser => "create_user",
            TransactionKind::FetchUser => "fetch_user",
            TransactionKind::UpdateUser => "update_user",
            TransactionKind::DeleteUser => "delete_user",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome code of a transaction attempt
///
/// `Started` and `InProgress` are returned by `start_transaction`; every other variant is a
/// terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionResult {
    Ok,
    Started,
    InProgress,
    Timeout,
    ConnectionTimeout,
    AddrResolutionFailed,
    ConnectFailed,
    IoError,
    HttpError,
    FormatError,
    Cancelled,
    PublishFailed,
    ChannelRegistryError,
    InvalidChannel,
    InvalidParameters,
    InvalidUse,
    OutOfMemory,
    ActionsApiError,
    ObjectsApiError,
    InternalError,
}

impl TransactionResult {
    /// True for anything other than `Started`/`InProgress`
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionResult::Started | TransactionResult::InProgress)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionResult::Ok => "OK",
            TransactionResult::Started => "Started",
            TransactionResult::InProgress => "Transaction in progress",
            TransactionResult::Timeout => "Transaction timed out",
            TransactionResult::ConnectionTimeout => "Wait for connect timed out",
            TransactionResult::AddrResolutionFailed => "Address resolution failed",
            TransactionResult::ConnectFailed => "Connect failed",
            TransactionResult::IoError => "Communication error",
            TransactionResult::HttpError => "HTTP error",
            TransactionResult::FormatError => "Response format error",
            TransactionResult::Cancelled => "Cancelled",
            TransactionResult::PublishFailed => "Publish failed",
            TransactionResult::ChannelRegistryError => "Channel registry error",
            TransactionResult::InvalidChannel => "Invalid channel",
            TransactionResult::InvalidParameters => "Invalid parameters",
            TransactionResult::InvalidUse => "Invalid use of context",
            TransactionResult::OutOfMemory => "Out of memory",
            TransactionResult::ActionsApiError => "Actions API error",
            TransactionResult::ObjectsApiError => "Objects API error",
            TransactionResult::InternalError => "Internal error",
        }
    }
}

impl std::fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method used by a prepared request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// Message action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Reaction,
    Receipt,
    Custom,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Reaction => "reaction",
            ActionType::Receipt => "receipt",
            ActionType::Custom => "custom",
        }
    }
}
