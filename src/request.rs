//! Request Builders
//!
//! One "prep" per transaction kind: validates parameters and formats the request a context
//! will send. Prep never touches context state; a failed prep leaves the context idle.

use crate::context::ContextSettings;
use crate::transport::HttpRequest;
use crate::types::{ActionType, Method, TransactionKind, TransactionResult, SDK_NAME};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Publish options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOptions {
    /// Store the message in history
    pub store: bool,
    /// Send the message in a POST body instead of the URL
    pub via_post: bool,
    /// Message metadata (JSON)
    pub meta: Option<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            store: true,
            via_post: false,
            meta: None,
        }
    }
}

/// Options of the v2 subscribe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeV2Options {
    pub filter_expr: Option<String>,
    /// Presence timeout to announce, in seconds
    pub heartbeat: Option<u32>,
}

/// Parameters of one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionParams {
    Publish {
        channel: String,
        message: String,
        options: PublishOptions,
    },
    Signal {
        channel: String,
        message: String,
    },
    Subscribe {
        channel: Option<String>,
        channel_group: Option<String>,
    },
    SubscribeV2 {
        channel: Option<String>,
        channel_group: Option<String>,
        options: SubscribeV2Options,
    },
    Leave {
        channel: Option<String>,
        channel_group: Option<String>,
    },
    Time,
    History {
        channel: String,
        count: u32,
        include_token: bool,
    },
    Heartbeat {
        channel: Option<String>,
        channel_group: Option<String>,
    },
    HereNow {
        channel: Option<String>,
        channel_group: Option<String>,
    },
    GlobalHereNow,
    WhereNow {
        uuid: Option<String>,
    },
    SetState {
        channel: Option<String>,
        channel_group: Option<String>,
        uuid: Option<String>,
        state: String,
    },
    StateGet {
        channel: Option<String>,
        channel_group: Option<String>,
        uuid: Option<String>,
    },
    RemoveChannelGroup {
        channel_group: String,
    },
    RemoveChannelFromGroup {
        channel: String,
        channel_group: String,
    },
    AddChannelToGroup {
        channel: String,
        channel_group: String,
    },
    ListChannelGroup {
        channel_group: String,
    },
    AddAction {
        channel: String,
        message_timetoken: String,
        action_type: ActionType,
        value: String,
    },
    RemoveAction {
        channel: String,
        message_timetoken: String,
        action_timetoken: String,
    },
    GetActions {
        channel: String,
        start: Option<String>,
        end: Option<String>,
        limit: usize,
    },
    GetActionsMore,
    HistoryWithActions {
        channel: String,
        start: Option<String>,
        end: Option<String>,
        limit: usize,
    },
    HistoryWithActionsMore,
    FetchAllUsers {
        include: Vec<String>,
        limit: usize,
        start: Option<String>,
        end: Option<String>,
        count: Option<bool>,
    },
    CreateUser {
        include: Vec<String>,
        user_obj: String,
    },
    FetchUser {
        include: Vec<String>,
        user_id: String,
    },
    UpdateUser {
        include: Vec<String>,
        user_obj: String,
    },
    DeleteUser {
        user_id: String,
    },
}

impl TransactionParams {
    pub fn kind(&self) -> TransactionKind {
        match self {
            TransactionParams::Publish { .. } => TransactionKind::Publish,
            TransactionParams::Signal { .. } => TransactionKind::Signal,
            TransactionParams::Subscribe { .. } => TransactionKind::Subscribe,
            TransactionParams::SubscribeV2 { .. } => TransactionKind::SubscribeV2,
            TransactionParams::Leave { .. } => TransactionKind::Leave,
            TransactionParams::Time => TransactionKind::Time,
            TransactionParams::History { .. } => TransactionKind::History,
            TransactionParams::Heartbeat { .. } => TransactionKind::Heartbeat,
            TransactionParams::HereNow { .. } => TransactionKind::HereNow,
            TransactionParams::GlobalHereNow => TransactionKind::GlobalHereNow,
            TransactionParams::WhereNow { .. } => TransactionKind::WhereNow,
            TransactionParams::SetState { .. } => TransactionKind::SetState,
            TransactionParams::StateGet { .. } => TransactionKind::StateGet,
            TransactionParams::RemoveChannelGroup { .. } => TransactionKind::RemoveChannelGroup,
            TransactionParams::RemoveChannelFromGroup { .. } => {
                TransactionKind::RemoveChannelFromGroup
            }
            TransactionParams::AddChannelToGroup { .. } => TransactionKind::AddChannelToGroup,
            TransactionParams::ListChannelGroup { .. } => TransactionKind::ListChannelGroup,
            TransactionParams::AddAction { .. } => TransactionKind::AddAction,
            TransactionParams::RemoveAction { .. } => TransactionKind::RemoveAction,
            TransactionParams::GetActions { .. } => TransactionKind::GetActions,
            TransactionParams::GetActionsMore => TransactionKind::GetActionsMore,
            TransactionParams::HistoryWithActions { .. } => TransactionKind::HistoryWithActions,
            TransactionParams::HistoryWithActionsMore => TransactionKind::HistoryWithActionsMore,
            TransactionParams::FetchAllUsers { .. } => TransactionKind::FetchAllUsers,
            TransactionParams::CreateUser { .. } => TransactionKind::CreateUser,
            TransactionParams::FetchUser { .. } => TransactionKind::FetchUser,
            TransactionParams::UpdateUser { .. } => TransactionKind::UpdateUser,
            TransactionParams::DeleteUser { .. } => TransactionKind::DeleteUser,
        }
    }

    /// Channel and group of the transactions that fall back to the registry
    pub fn registry_target(&self) -> Option<(Option<&str>, Option<&str>)> {
        match self {
            TransactionParams::Subscribe {
                channel,
                channel_group,
            }
            | TransactionParams::SubscribeV2 {
                channel,
                channel_group,
                ..
            }
            | TransactionParams::Leave {
                channel,
                channel_group,
            } => Some((channel.as_deref(), channel_group.as_deref())),
            _ => None,
        }
    }

    /// Copy with the registry-resolved channel and group substituted
    pub fn with_registry_target(
        &self,
        channel: Option<String>,
        channel_group: Option<String>,
    ) -> TransactionParams {
        match self {
            TransactionParams::Subscribe { .. } => TransactionParams::Subscribe {
                channel,
                channel_group,
            },
            TransactionParams::SubscribeV2 { options, .. } => TransactionParams::SubscribeV2 {
                channel,
                channel_group,
                options: options.clone(),
            },
            TransactionParams::Leave { .. } => TransactionParams::Leave {
                channel,
                channel_group,
            },
            other => other.clone(),
        }
    }
}

/// What prep needs to know about the context
#[derive(Debug, Clone, Copy)]
pub struct PrepInputs<'a> {
    pub settings: &'a ContextSettings,
    /// Current continuation cursor; empty means "from now"
    pub timetoken: &'a str,
    pub region: Option<i64>,
    /// `more` link of the previous actions response, if any
    pub more_link: Option<&'a str>,
}

/// A formatted request and the per-request flags it implies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub kind: TransactionKind,
    pub request: HttpRequest,
    pub via_post: bool,
    pub patch_or_delete: bool,
}

/// Format the request for `params`
pub fn prep(
    inputs: &PrepInputs<'_>,
    params: &TransactionParams,
) -> Result<PreparedRequest, TransactionResult> {
    let settings = inputs.settings;
    let sub_key = settings.subscribe_key.as_str();
    if sub_key.is_empty() {
        return Err(TransactionResult::InvalidParameters);
    }

    let mut request = match params {
        TransactionParams::Publish {
            channel,
            message,
            options,
        } => {
            require_channel(channel)?;
            require_key(&settings.publish_key)?;
            let mut segments = vec![
                "publish".to_string(),
                settings.publish_key.clone(),
                sub_key.to_string(),
                "0".to_string(),
                channel.clone(),
                "0".to_string(),
            ];
            let mut request = if options.via_post {
                HttpRequest::get(segments)
                    .with_method(Method::Post)
                    .with_body(message.clone())
            } else {
                segments.push(message.clone());
                HttpRequest::get(segments)
            };
            if !options.store {
                request.push_query("store", "0");
            }
            request.push_query_opt("meta", options.meta.as_deref());
            request
        }
        TransactionParams::Signal { channel, message } => {
            require_channel(channel)?;
            require_key(&settings.publish_key)?;
            HttpRequest::get([
                "signal",
                settings.publish_key.as_str(),
                sub_key,
                "0",
                channel.as_str(),
                "0",
                message.as_str(),
            ])
        }
        TransactionParams::Subscribe {
            channel,
            channel_group,
        } => {
            let channels = channel_segment(channel, channel_group)?;
            let mut request = HttpRequest::get([
                "subscribe",
                sub_key,
                channels.as_str(),
                "0",
                cursor(inputs.timetoken),
            ]);
            request.push_query_opt("channel-group", channel_group.as_deref());
            request
        }
        TransactionParams::SubscribeV2 {
            channel,
            channel_group,
            options,
        } => {
            let channels = channel_segment(channel, channel_group)?;
            let mut request =
                HttpRequest::get(["v2", "subscribe", sub_key, channels.as_str(), "0"]);
            let tt = cursor(inputs.timetoken);
            request.push_query("tt", tt);
            if tt != "0" {
                if let Some(region) = inputs.region {
                    request.push_query("tr", region.to_string());
                }
            }
            request.push_query_opt("channel-group", channel_group.as_deref());
            request.push_query_opt("filter-expr", options.filter_expr.as_deref());
            if let Some(heartbeat) = options.heartbeat {
                request.push_query("heartbeat", heartbeat.to_string());
            }
            request
        }
        TransactionParams::Leave {
            channel,
            channel_group,
        } => presence_request(sub_key, channel, channel_group, Some("leave"))?,
        TransactionParams::Time => HttpRequest::get(["time", "0"]),
        TransactionParams::History {
            channel,
            count,
            include_token,
        } => {
            require_channel(channel)?;
            let mut request =
                HttpRequest::get(["v2", "history", "sub-key", sub_key, "channel", channel]);
            request.push_query("count", count.to_string());
            if *include_token {
                request.push_query("include_token", "true");
            }
            request
        }
        TransactionParams::Heartbeat {
            channel,
            channel_group,
        } => presence_request(sub_key, channel, channel_group, Some("heartbeat"))?,
        TransactionParams::HereNow {
            channel,
            channel_group,
        } => presence_request(sub_key, channel, channel_group, None)?,
        TransactionParams::GlobalHereNow => {
            HttpRequest::get(["v2", "presence", "sub-key", sub_key])
        }
        TransactionParams::WhereNow { uuid } => {
            let uuid = uuid.as_deref().unwrap_or(settings.uuid.as_str());
            require_key(uuid)?;
            HttpRequest::get(["v2", "presence", "sub-key", sub_key, "uuid", uuid])
        }
        TransactionParams::SetState {
            channel,
            channel_group,
            uuid,
            state,
        } => {
            let channels = channel_segment(channel, channel_group)?;
            let uuid = uuid.as_deref().unwrap_or(settings.uuid.as_str());
            let mut request = HttpRequest::get([
                "v2",
                "presence",
                "sub-key",
                sub_key,
                "channel",
                channels.as_str(),
                "uuid",
                uuid,
                "data",
            ]);
            request.push_query_opt("channel-group", channel_group.as_deref());
            request.push_query("state", state.clone());
            request
        }
        TransactionParams::StateGet {
            channel,
            channel_group,
            uuid,
        } => {
            let channels = channel_segment(channel, channel_group)?;
            let uuid = uuid.as_deref().unwrap_or(settings.uuid.as_str());
            let mut request = HttpRequest::get([
                "v2",
                "presence",
                "sub-key",
                sub_key,
                "channel",
                channels.as_str(),
                "uuid",
                uuid,
            ]);
            request.push_query_opt("channel-group", channel_group.as_deref());
            request
        }
        TransactionParams::RemoveChannelGroup { channel_group } => {
            require_channel(channel_group)?;
            channel_registry_request(sub_key, channel_group, Some("remove"))
        }
        TransactionParams::RemoveChannelFromGroup {
            channel,
            channel_group,
        } => {
            require_channel(channel)?;
            require_channel(channel_group)?;
            let mut request = channel_registry_request(sub_key, channel_group, None);
            request.push_query("remove", channel.clone());
            request
        }
        TransactionParams::AddChannelToGroup {
            channel,
            channel_group,
        } => {
            require_channel(channel)?;
            require_channel(channel_group)?;
            let mut request = channel_registry_request(sub_key, channel_group, None);
            request.push_query("add", channel.clone());
            request
        }
        TransactionParams::ListChannelGroup { channel_group } => {
            require_channel(channel_group)?;
            channel_registry_request(sub_key, channel_group, None)
        }
        TransactionParams::AddAction {
            channel,
            message_timetoken,
            action_type,
            value,
        } => {
            require_channel(channel)?;
            require_key(message_timetoken)?;
            require_key(&settings.uuid)?;
            let value: serde_json::Value = serde_json::from_str(value)
                .map_err(|_| TransactionResult::InvalidParameters)?;
            let body = json!({
                "type": action_type.as_str(),
                "value": value,
                "uuid": settings.uuid,
            });
            HttpRequest::get([
                "v1",
                "message-actions",
                sub_key,
                "channel",
                channel.as_str(),
                "message",
                message_timetoken.as_str(),
            ])
            .with_method(Method::Post)
            .with_body(body.to_string())
        }
        TransactionParams::RemoveAction {
            channel,
            message_timetoken,
            action_timetoken,
        } => {
            require_channel(channel)?;
            require_key(message_timetoken)?;
            require_key(action_timetoken)?;
            require_key(&settings.uuid)?;
            HttpRequest::get([
                "v1",
                "message-actions",
                sub_key,
                "channel",
                channel.as_str(),
                "message",
                message_timetoken.as_str(),
                "action",
                action_timetoken.as_str(),
            ])
            .with_method(Method::Delete)
        }
        TransactionParams::GetActions {
            channel,
            start,
            end,
            limit,
        } => {
            require_channel(channel)?;
            require_key(&settings.uuid)?;
            let mut request =
                HttpRequest::get(["v1", "message-actions", sub_key, "channel", channel]);
            push_range(&mut request, start, end, "limit", *limit);
            request
        }
        TransactionParams::HistoryWithActions {
            channel,
            start,
            end,
            limit,
        } => {
            require_channel(channel)?;
            require_key(&settings.uuid)?;
            let mut request = HttpRequest::get([
                "v3",
                "history-with-actions",
                "sub-key",
                sub_key,
                "channel",
                channel,
            ]);
            push_range(&mut request, start, end, "max", *limit);
            request
        }
        TransactionParams::GetActionsMore | TransactionParams::HistoryWithActionsMore => {
            let link = inputs.more_link.ok_or(TransactionResult::ActionsApiError)?;
            request_from_link(link).ok_or(TransactionResult::ActionsApiError)?
        }
        TransactionParams::FetchAllUsers {
            include,
            limit,
            start,
            end,
            count,
        } => {
            let mut request = HttpRequest::get(["v1", "objects", sub_key, "users"]);
            push_include(&mut request, include);
            if *limit > 0 {
                request.push_query("limit", limit.to_string());
            }
            request.push_query_opt("start", start.as_deref());
            if start.is_none() {
                request.push_query_opt("end", end.as_deref());
            }
            if let Some(count) = count {
                request.push_query("count", if *count { "true" } else { "false" });
            }
            request
        }
        TransactionParams::CreateUser { include, user_obj } => {
            user_id_of(user_obj)?;
            let mut request = HttpRequest::get(["v1", "objects", sub_key, "users"])
                .with_method(Method::Post)
                .with_body(user_obj.clone());
            push_include(&mut request, include);
            request
        }
        TransactionParams::FetchUser { include, user_id } => {
            require_key(user_id)?;
            let mut request = HttpRequest::get(["v1", "objects", sub_key, "users", user_id]);
            push_include(&mut request, include);
            request
        }
        TransactionParams::UpdateUser { include, user_obj } => {
            let user_id = user_id_of(user_obj)?;
            let mut request =
                HttpRequest::get(["v1", "objects", sub_key, "users", user_id.as_str()])
                    .with_method(Method::Patch)
                    .with_body(user_obj.clone());
            push_include(&mut request, include);
            request
        }
        TransactionParams::DeleteUser { user_id } => {
            require_key(user_id)?;
            HttpRequest::get(["v1", "objects", sub_key, "users", user_id])
                .with_method(Method::Delete)
        }
    };

    push_common_query(&mut request, settings);
    let via_post = matches!(request.method, Method::Post | Method::Patch);
    let patch_or_delete = matches!(request.method, Method::Patch | Method::Delete);
    Ok(PreparedRequest {
        kind: params.kind(),
        request,
        via_post,
        patch_or_delete,
    })
}

fn require_channel(name: &str) -> Result<(), TransactionResult> {
    if name.is_empty() {
        Err(TransactionResult::InvalidChannel)
    } else {
        Ok(())
    }
}

fn require_key(value: &str) -> Result<(), TransactionResult> {
    if value.is_empty() {
        Err(TransactionResult::InvalidParameters)
    } else {
        Ok(())
    }
}

fn cursor(timetoken: &str) -> &str {
    if timetoken.is_empty() {
        "0"
    } else {
        timetoken
    }
}

/// Channel path segment; `,` stands for "no channels" when only groups are given
fn channel_segment(
    channel: &Option<String>,
    channel_group: &Option<String>,
) -> Result<String, TransactionResult> {
    match (channel.as_deref(), channel_group.as_deref()) {
        (Some(channel), _) if !channel.is_empty() => Ok(channel.to_string()),
        (_, Some(group)) if !group.is_empty() => Ok(",".to_string()),
        _ => Err(TransactionResult::InvalidChannel),
    }
}

fn presence_request(
    sub_key: &str,
    channel: &Option<String>,
    channel_group: &Option<String>,
    action: Option<&str>,
) -> Result<HttpRequest, TransactionResult> {
    let channels = channel_segment(channel, channel_group)?;
    let mut segments = vec![
        "v2".to_string(),
        "presence".to_string(),
        "sub-key".to_string(),
        sub_key.to_string(),
        "channel".to_string(),
        channels,
    ];
    if let Some(action) = action {
        segments.push(action.to_string());
    }
    let mut request = HttpRequest::get(segments);
    request.push_query_opt("channel-group", channel_group.as_deref());
    Ok(request)
}

fn channel_registry_request(sub_key: &str, channel_group: &str, action: Option<&str>) -> HttpRequest {
    let mut segments = vec![
        "v1".to_string(),
        "channel-registration".to_string(),
        "sub-key".to_string(),
        sub_key.to_string(),
        "channel-group".to_string(),
        channel_group.to_string(),
    ];
    if let Some(action) = action {
        segments.push(action.to_string());
    }
    HttpRequest::get(segments)
}

fn push_range(
    request: &mut HttpRequest,
    start: &Option<String>,
    end: &Option<String>,
    limit_key: &str,
    limit: usize,
) {
    request.push_query_opt("start", start.as_deref());
    request.push_query_opt("end", end.as_deref());
    if limit > 0 {
        request.push_query(limit_key, limit.to_string());
    }
}

fn push_include(request: &mut HttpRequest, include: &[String]) {
    if !include.is_empty() {
        request.push_query("include", include.join(","));
    }
}

fn push_common_query(request: &mut HttpRequest, settings: &ContextSettings) {
    request.push_query("pnsdk", SDK_NAME);
    if !settings.uuid.is_empty() {
        request.push_query("uuid", settings.uuid.clone());
    }
    request.push_query_opt("auth", settings.auth.as_deref());
}

/// `id` of a user object
fn user_id_of(user_obj: &str) -> Result<String, TransactionResult> {
    let value: serde_json::Value =
        serde_json::from_str(user_obj).map_err(|_| TransactionResult::InvalidParameters)?;
    value
        .get("id")
        .and_then(|id| id.as_str())
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(TransactionResult::InvalidParameters)
}

/// Request for a server-provided `more` link such as `/v1/message-actions/k/channel/c?start=1`
///
/// Query pairs the link carries are kept; the common query is appended afterwards.
pub fn request_from_link(link: &str) -> Option<HttpRequest> {
    let (path, query) = match link.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (link, None),
    };
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }
    let mut request = HttpRequest::get(segments);
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if !matches!(key, "pnsdk" | "uuid" | "auth") {
                request.push_query(key, value);
            }
        }
    }
    Some(request)
}
