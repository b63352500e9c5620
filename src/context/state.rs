//! Mutable state of a context, guarded by the context lock.

use super::settings::ContextSettings;
use super::registry::ChannelRegistry;
use super::Context;
use crate::heartbeat::HeartbeatScheduler;
use crate::reactor::Reactor;
use crate::response::{Cursor, ResponseState};
use crate::transport::{HttpRequest, HttpResponse, Transport};
use crate::types::{
    TransactionKind, TransactionResult, DEFAULT_TRANSACTION_TIMER_MS,
    DEFAULT_WAIT_CONNECT_TIMER_MS,
};
use std::sync::Arc;
use std::time::Instant;

/// Completion callback: `(context, kind, result)`
pub type TransactionCallback =
    Arc<dyn Fn(&Context, TransactionKind, TransactionResult) + Send + Sync>;

/// How transactions of a context are driven
#[derive(Clone, Default)]
pub enum DriveMode {
    /// The calling thread drives the transaction to completion
    #[default]
    Blocking,
    /// A reactor worker drives it; completion goes to the registered callback
    Callback(Reactor),
}

impl std::fmt::Debug for DriveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveMode::Blocking => f.write_str("Blocking"),
            DriveMode::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Transaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Resolving,
    Connecting,
    Sending,
    Receiving,
    Parsing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Resolving => "resolving",
            Phase::Connecting => "connecting",
            Phase::Sending => "sending",
            Phase::Receiving => "receiving",
            Phase::Parsing => "parsing",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Flags {
    pub via_post: bool,
    pub patch_or_delete: bool,
    pub auto_heartbeat_enabled: bool,
    pub cancel_requested: bool,
    pub released: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Timeouts {
    pub transaction_ms: u64,
    pub connect_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            transaction_ms: DEFAULT_TRANSACTION_TIMER_MS,
            connect_ms: DEFAULT_WAIT_CONNECT_TIMER_MS,
        }
    }
}

/// Link from an auto-heartbeat context to its scheduler
///
/// `slot` is `None` after the scheduler freed its thumpers; the next subscribe provisions a
/// fresh one.
#[derive(Clone)]
pub(crate) struct HeartbeatLink {
    pub scheduler: HeartbeatScheduler,
    pub slot: Option<usize>,
    pub period_sec: u64,
}

#[derive(Default)]
pub(crate) struct AutoRegister {
    pub registry: ChannelRegistry,
    pub heartbeat: Option<HeartbeatLink>,
}

impl AutoRegister {
    pub fn slot(&self) -> Option<usize> {
        self.heartbeat.as_ref().and_then(|link| link.slot)
    }
}

pub(crate) struct CoreState {
    pub settings: ContextSettings,
    pub trans: TransactionKind,
    pub last_result: TransactionResult,
    pub phase: Phase,
    pub cursor: Cursor,
    pub flags: Flags,
    pub auto_register: AutoRegister,
    pub timeouts: Timeouts,
    pub started_at: Instant,
    pub connect_started_at: Instant,
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub responses: ResponseState,
    pub transport: Box<dyn Transport>,
    pub callback: Option<TransactionCallback>,
    pub mode: DriveMode,
}

impl CoreState {
    pub fn new(
        settings: ContextSettings,
        transport: Box<dyn Transport>,
        mode: DriveMode,
        now: Instant,
    ) -> Self {
        Self {
            settings,
            trans: TransactionKind::None,
            last_result: TransactionResult::Ok,
            phase: Phase::Idle,
            cursor: Cursor::default(),
            flags: Flags::default(),
            auto_register: AutoRegister::default(),
            timeouts: Timeouts::default(),
            started_at: now,
            connect_started_at: now,
            request: None,
            response: None,
            responses: ResponseState::new(),
            transport,
            callback: None,
            mode,
        }
    }

    pub fn can_start(&self) -> bool {
        self.phase == Phase::Idle && !self.flags.released
    }
}
