//! Response Parsing
//!
//! Turns the HTTP reply of a finished transaction into a result code and the per-context
//! response state readers pull from (`get`, `get_channel`, action timetokens, `more` links).
//! Subscribe replies also move the continuation cursor.

use crate::transport::HttpResponse;
use crate::types::{TransactionKind, TransactionResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// Continuation cursor of a subscribe stream
///
/// An empty timetoken means "subscribe from now".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub timetoken: String,
    pub region: Option<i64>,
}

impl Cursor {
    pub fn reset(&mut self) {
        self.timetoken.clear();
        self.region = None;
    }
}

/// One message of a v2 subscribe reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2Message {
    pub channel: String,
    pub payload: String,
    pub subscription_match: Option<String>,
    pub publish_timetoken: String,
    pub region: Option<i64>,
    pub publisher: Option<String>,
    pub metadata: Option<String>,
    /// True for signals, false for regular published messages
    pub is_signal: bool,
}

/// Data extracted from the last parsed response
#[derive(Debug, Clone, Default)]
pub struct ResponseState {
    http_code: u16,
    messages: VecDeque<String>,
    channels: VecDeque<String>,
    v2_messages: VecDeque<V2Message>,
    reply: Option<Value>,
    message_timetoken: Option<String>,
    action_timetoken: Option<String>,
    more_link: Option<String>,
    error_message: Option<String>,
}

impl ResponseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn http_code(&self) -> u16 {
        self.http_code
    }

    pub fn next_message(&mut self) -> Option<String> {
        self.messages.pop_front()
    }

    pub fn next_channel(&mut self) -> Option<String> {
        self.channels.pop_front()
    }

    pub fn next_v2_message(&mut self) -> Option<V2Message> {
        self.v2_messages.pop_front()
    }

    /// Decoded JSON body of the last reply
    pub fn reply(&self) -> Option<&Value> {
        self.reply.as_ref()
    }

    pub fn message_timetoken(&self) -> Option<&str> {
        self.message_timetoken.as_deref()
    }

    pub fn action_timetoken(&self) -> Option<&str> {
        self.action_timetoken.as_deref()
    }

    pub fn more_link(&self) -> Option<&str> {
        self.more_link.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Parse `response` for a transaction of `kind`
pub fn parse(
    kind: TransactionKind,
    response: &HttpResponse,
    cursor: &mut Cursor,
    state: &mut ResponseState,
) -> TransactionResult {
    state.clear();
    state.http_code = response.status;

    let value: Value = match serde_json::from_str(&response.body) {
        Ok(value) => value,
        Err(e) => {
            debug!(
                transaction = kind.as_str(),
                status = response.status,
                error = %e,
                "Response is not JSON"
            );
            return if response.is_success() {
                TransactionResult::FormatError
            } else {
                TransactionResult::HttpError
            };
        }
    };

    let result = match kind {
        TransactionKind::Subscribe => parse_subscribe_v1(&value, cursor, state),
        TransactionKind::SubscribeV2 => parse_subscribe_v2(&value, cursor, state),
        TransactionKind::Publish | TransactionKind::Signal => parse_publish(&value, state),
        TransactionKind::Time => parse_time(&value, state),
        TransactionKind::History => parse_history(&value, state),
        TransactionKind::Leave
        | TransactionKind::Heartbeat
        | TransactionKind::HereNow
        | TransactionKind::GlobalHereNow
        | TransactionKind::WhereNow
        | TransactionKind::SetState
        | TransactionKind::StateGet => parse_presence(&value, state),
        TransactionKind::RemoveChannelGroup
        | TransactionKind::RemoveChannelFromGroup
        | TransactionKind::AddChannelToGroup
        | TransactionKind::ListChannelGroup => parse_channel_registry(&value, state),
        kind if kind.is_actions_api() => parse_actions(kind, &value, state),
        kind if kind.is_objects_api() => parse_objects(&value, state),
        _ => TransactionResult::InternalError,
    };
    state.reply = Some(value);

    if result == TransactionResult::Ok && !response.is_success() {
        return TransactionResult::HttpError;
    }
    result
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `[[msg, ...], "timetoken"]` or `[[msg, ...], "timetoken", "ch1,ch2"]`
fn parse_subscribe_v1(value: &Value, cursor: &mut Cursor, state: &mut ResponseState) -> TransactionResult {
    let Some(items) = value.as_array() else {
        return TransactionResult::FormatError;
    };
    let (Some(Value::Array(messages)), Some(Value::String(timetoken))) = (items.first(), items.get(1))
    else {
        return TransactionResult::FormatError;
    };
    if timetoken.is_empty() {
        return TransactionResult::FormatError;
    }

    state.messages = messages.iter().map(|m| m.to_string()).collect();
    if let Some(Value::String(channels)) = items.get(2) {
        state.channels = channels
            .split(',')
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
    }
    cursor.timetoken = timetoken.clone();
    TransactionResult::Ok
}

/// `{"t": {"t": "timetoken", "r": region}, "m": [ ... ]}`
fn parse_subscribe_v2(value: &Value, cursor: &mut Cursor, state: &mut ResponseState) -> TransactionResult {
    let Some(timetoken) = value
        .pointer("/t/t")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
    else {
        return TransactionResult::FormatError;
    };
    let region = value.pointer("/t/r").and_then(Value::as_i64);
    let Some(messages) = value.get("m").and_then(Value::as_array) else {
        return TransactionResult::FormatError;
    };

    let mut parsed = VecDeque::with_capacity(messages.len());
    for message in messages {
        let (Some(channel), Some(payload)) = (
            message.get("c").and_then(Value::as_str),
            message.get("d"),
        ) else {
            return TransactionResult::FormatError;
        };
        parsed.push_back(V2Message {
            channel: channel.to_string(),
            payload: payload.to_string(),
            subscription_match: message
                .get("b")
                .and_then(Value::as_str)
                .map(str::to_string),
            publish_timetoken: message
                .pointer("/p/t")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            region: message.pointer("/p/r").and_then(Value::as_i64),
            publisher: message.get("i").and_then(Value::as_str).map(str::to_string),
            metadata: message.get("u").map(Value::to_string),
            is_signal: message.get("e").and_then(Value::as_i64) == Some(1),
        });
    }

    state.messages = parsed.iter().map(|m| m.payload.clone()).collect();
    state.channels = parsed.iter().map(|m| m.channel.clone()).collect();
    state.v2_messages = parsed;
    cursor.timetoken = timetoken.to_string();
    cursor.region = region;
    TransactionResult::Ok
}

/// `[1, "Sent", "timetoken"]`; a leading `0` carries the failure reason
fn parse_publish(value: &Value, state: &mut ResponseState) -> TransactionResult {
    let Some(items) = value.as_array() else {
        return match value.get("message").or_else(|| value.get("error")) {
            Some(reason) => {
                state.error_message = Some(value_text(reason));
                TransactionResult::PublishFailed
            }
            None => TransactionResult::FormatError,
        };
    };
    let (Some(flag), Some(description)) = (items.first().and_then(Value::as_i64), items.get(1))
    else {
        return TransactionResult::FormatError;
    };
    state.messages.push_back(value.to_string());
    if flag == 1 {
        state.message_timetoken = items.get(2).map(value_text);
        TransactionResult::Ok
    } else {
        state.error_message = Some(value_text(description));
        TransactionResult::PublishFailed
    }
}

/// `[timetoken]`
fn parse_time(value: &Value, state: &mut ResponseState) -> TransactionResult {
    match value.as_array().and_then(|items| items.first()) {
        Some(timetoken @ Value::Number(_)) => {
            state.messages.push_back(timetoken.to_string());
            TransactionResult::Ok
        }
        _ => TransactionResult::FormatError,
    }
}

/// `[[msg, ...], start, end]`
fn parse_history(value: &Value, state: &mut ResponseState) -> TransactionResult {
    match value.as_array().and_then(|items| items.first()) {
        Some(Value::Array(messages)) => {
            state.messages = messages.iter().map(Value::to_string).collect();
            TransactionResult::Ok
        }
        _ => TransactionResult::FormatError,
    }
}

fn api_error_message(value: &Value) -> Option<String> {
    if let Some(message) = value.pointer("/error/message") {
        return Some(value_text(message));
    }
    match value.get("error") {
        Some(Value::Bool(true)) => Some(
            value
                .get("message")
                .map(value_text)
                .unwrap_or_else(|| "error".to_string()),
        ),
        Some(Value::String(message)) => Some(message.clone()),
        _ => None,
    }
}

fn parse_presence(value: &Value, state: &mut ResponseState) -> TransactionResult {
    if !value.is_object() {
        return TransactionResult::FormatError;
    }
    if let Some(message) = api_error_message(value) {
        state.error_message = Some(message);
        return TransactionResult::HttpError;
    }
    state.messages.push_back(value.to_string());
    TransactionResult::Ok
}

fn parse_channel_registry(value: &Value, state: &mut ResponseState) -> TransactionResult {
    if !value.is_object() {
        return TransactionResult::FormatError;
    }
    if let Some(message) = api_error_message(value) {
        state.error_message = Some(message);
        return TransactionResult::ChannelRegistryError;
    }
    if let Some(channels) = value.pointer("/payload/channels").and_then(Value::as_array) {
        state.channels = channels.iter().map(value_text).collect();
    }
    state.messages.push_back(value.to_string());
    TransactionResult::Ok
}

fn parse_actions(kind: TransactionKind, value: &Value, state: &mut ResponseState) -> TransactionResult {
    if !value.is_object() {
        return TransactionResult::FormatError;
    }
    if let Some(message) = api_error_message(value) {
        state.error_message = Some(message);
        return TransactionResult::ActionsApiError;
    }

    let data = match kind {
        TransactionKind::HistoryWithActions | TransactionKind::HistoryWithActionsMore => {
            value.get("channels")
        }
        _ => value.get("data"),
    };
    let Some(data) = data else {
        return TransactionResult::FormatError;
    };

    if kind == TransactionKind::AddAction {
        state.message_timetoken = data.get("messageTimetoken").map(value_text);
        state.action_timetoken = data.get("actionTimetoken").map(value_text);
    }
    match data {
        Value::Array(items) => state.messages = items.iter().map(Value::to_string).collect(),
        other => state.messages.push_back(other.to_string()),
    }
    state.more_link = value
        .pointer("/more/url")
        .and_then(Value::as_str)
        .map(str::to_string);
    TransactionResult::Ok
}

fn parse_objects(value: &Value, state: &mut ResponseState) -> TransactionResult {
    if !value.is_object() {
        return TransactionResult::FormatError;
    }
    if let Some(message) = api_error_message(value) {
        state.error_message = Some(message);
        return TransactionResult::ObjectsApiError;
    }
    match value.get("data") {
        Some(Value::Array(items)) => {
            state.messages = items.iter().map(Value::to_string).collect();
            TransactionResult::Ok
        }
        Some(data) => {
            state.messages.push_back(data.to_string());
            TransactionResult::Ok
        }
        None => TransactionResult::FormatError,
    }
}
