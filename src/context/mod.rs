//! Context domain: the transaction state machine, its settings and channel registry.
//!
//! A [`Context`] runs one transaction at a time. It is a cloneable handle; the state behind it
//! lives behind one lock with a condition variable signalled on every return to idle.

mod fsm;
mod outcome;
pub mod registry;
pub mod settings;
mod state;
mod transactions;

pub use registry::ChannelRegistry;
pub use settings::{generate_uuid, ContextSettings, KeepAlive, ProxyConfig};
pub use state::{DriveMode, Phase, TransactionCallback};

pub(crate) use fsm::{advance, Progress};
pub(crate) use state::{CoreState, HeartbeatLink};

use crate::clock::{Clock, MonotonicClock};
use crate::error::{ContextError, HeartbeatError};
use crate::heartbeat::HeartbeatScheduler;
use crate::request::{self, PrepInputs, TransactionParams};
use crate::response::V2Message;
use crate::transport::{HttpTransportFactory, TransportFactory};
use crate::types::{
    TransactionKind, TransactionResult, MIN_TRANSACTION_TIMER_MS, MIN_WAIT_CONNECT_TIMER_MS,
};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ContextShared {
    id: u64,
    pub(crate) core: Mutex<CoreState>,
    pub(crate) idle: Condvar,
    pub(crate) factory: Arc<dyn TransportFactory>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Drop for ContextShared {
    fn drop(&mut self) {
        let owner: *const ContextShared = self;
        if let Some(link) = self.core.get_mut().auto_register.heartbeat.take() {
            if let Some(slot) = link.slot {
                link.scheduler.release_slot(slot, owner);
            }
        }
    }
}

/// Collaborators a context is built with
#[derive(Clone)]
pub struct ContextOptions {
    pub transport: Arc<dyn TransportFactory>,
    pub clock: Arc<dyn Clock>,
    pub mode: DriveMode,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            transport: Arc::new(HttpTransportFactory::new()),
            clock: Arc::new(MonotonicClock),
            mode: DriveMode::Blocking,
        }
    }
}

impl ContextOptions {
    pub fn with_transport(mut self, transport: Arc<dyn TransportFactory>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_mode(mut self, mode: DriveMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Handle to a publish/subscribe context
#[derive(Clone)]
pub struct Context {
    pub(crate) shared: Arc<ContextShared>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("id", &self.shared.id).finish()
    }
}

impl Context {
    /// Blocking-mode context over HTTP with a generated UUID
    pub fn new(publish_key: &str, subscribe_key: &str) -> Self {
        Self::with_options(
            ContextSettings::new(publish_key, subscribe_key),
            ContextOptions::default(),
        )
    }

    pub fn with_options(settings: ContextSettings, options: ContextOptions) -> Self {
        let transport = options.transport.create(&settings);
        let core = CoreState::new(settings, transport, options.mode, options.clock.now());
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(context = id, "Context created");
        Self {
            shared: Arc::new(ContextShared {
                id,
                core: Mutex::new(core),
                idle: Condvar::new(),
                factory: options.transport,
                clock: options.clock,
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<ContextShared>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn can_start_transaction(&self) -> bool {
        self.shared.core.lock().can_start()
    }

    /// Start a transaction
    ///
    /// Blocking mode returns the final outcome. Callback mode returns `Started` and delivers
    /// the outcome to the registered callback. A busy context answers `InProgress` and a
    /// released one `InvalidUse`; prep failures come back immediately and leave it idle.
    pub fn start_transaction(&self, params: TransactionParams) -> TransactionResult {
        let mut guard = self.shared.core.lock();
        let core = &mut *guard;
        if core.flags.released {
            return TransactionResult::InvalidUse;
        }
        if !core.can_start() {
            return TransactionResult::InProgress;
        }

        let kind = params.kind();
        let resolved = params.registry_target().map(|(channel, channel_group)| {
            core.auto_register
                .registry
                .resolve_defaults(channel, channel_group)
        });
        let params = match resolved {
            Some((channel, channel_group)) => params.with_registry_target(channel, channel_group),
            None => params,
        };

        let inputs = PrepInputs {
            settings: &core.settings,
            timetoken: &core.cursor.timetoken,
            region: core.cursor.region,
            more_link: core.responses.more_link(),
        };
        let prepared = match request::prep(&inputs, &params) {
            Ok(prepared) => prepared,
            Err(result) => {
                debug!(
                    context = self.id(),
                    transaction = kind.as_str(),
                    result = result.as_str(),
                    "Transaction rejected"
                );
                return result;
            }
        };

        if let Some((channel, channel_group)) = params.registry_target() {
            let registry = &mut core.auto_register.registry;
            if kind == TransactionKind::Leave {
                registry.leave(channel, channel_group);
            } else {
                registry.merge(channel, channel_group);
            }
        }

        let now = self.shared.clock.now();
        core.trans = kind;
        core.flags.via_post = prepared.via_post;
        core.flags.patch_or_delete = prepared.patch_or_delete;
        core.flags.cancel_requested = false;
        core.request = Some(prepared.request);
        core.response = None;
        core.started_at = now;
        core.connect_started_at = now;
        core.last_result = TransactionResult::Started;
        core.phase = Phase::Resolving;
        debug!(context = self.id(), transaction = kind.as_str(), "Transaction started");

        let scheduler = if kind.is_subscribe_family() && core.flags.auto_heartbeat_enabled {
            core.auto_register
                .heartbeat
                .as_ref()
                .map(|link| link.scheduler.clone())
        } else {
            None
        };
        let mode = core.mode.clone();
        drop(guard);

        if let Some(scheduler) = scheduler {
            scheduler.notify_transaction_start(self);
        }

        match mode {
            DriveMode::Blocking => fsm::run_blocking(self),
            DriveMode::Callback(reactor) => match reactor.submit(self.clone()) {
                Ok(()) => TransactionResult::Started,
                Err(e) => {
                    warn!(context = self.id(), error = %e, "Failed to hand transaction to reactor");
                    fsm::abort(self, TransactionResult::InternalError);
                    TransactionResult::InternalError
                }
            },
        }
    }

    /// Wait until the context is idle and return its last outcome
    pub fn await_result(&self) -> TransactionResult {
        let mut guard = self.shared.core.lock();
        while guard.phase != Phase::Idle {
            self.shared.idle.wait(&mut guard);
        }
        guard.last_result
    }

    pub fn await_result_timeout(&self, timeout: Duration) -> Result<TransactionResult, ContextError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.core.lock();
        while guard.phase != Phase::Idle {
            if self.shared.idle.wait_until(&mut guard, deadline).timed_out()
                && guard.phase != Phase::Idle
            {
                return Err(ContextError::AwaitTimeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
        Ok(guard.last_result)
    }

    /// Request cancellation of the running transaction
    ///
    /// Returns false when there is nothing to cancel. The transaction finishes with
    /// `Cancelled` and the callback still fires.
    pub fn cancel(&self) -> bool {
        let mut guard = self.shared.core.lock();
        if guard.phase == Phase::Idle {
            return false;
        }
        guard.flags.cancel_requested = true;
        debug!(context = self.id(), transaction = guard.trans.as_str(), "Cancel requested");
        true
    }

    /// Release the context, cancelling an outstanding transaction and waiting for it
    ///
    /// The context answers `InvalidUse` to new transactions afterwards. Its heartbeat slot, if
    /// any, is given back to the scheduler.
    pub fn free_with_timeout(&self, timeout: Duration) -> Result<(), ContextError> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.core.lock();
        guard.flags.released = true;
        if guard.phase != Phase::Idle {
            guard.flags.cancel_requested = true;
        }
        while guard.phase != Phase::Idle {
            if self.shared.idle.wait_until(&mut guard, deadline).timed_out()
                && guard.phase != Phase::Idle
            {
                warn!(context = self.id(), "Transaction still running at release");
                return Err(ContextError::FreeTimeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
        }
        guard.flags.auto_heartbeat_enabled = false;
        let link = guard.auto_register.heartbeat.take();
        drop(guard);

        if let Some(HeartbeatLink {
            scheduler,
            slot: Some(slot),
            ..
        }) = link
        {
            scheduler.release_slot(slot, Arc::as_ptr(&self.shared));
        }
        debug!(context = self.id(), "Context released");
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.shared.core.lock().flags.released
    }

    pub fn last_result(&self) -> TransactionResult {
        self.shared.core.lock().last_result
    }

    /// Kind of the running (or last) transaction
    pub fn transaction_kind(&self) -> TransactionKind {
        self.shared.core.lock().trans
    }

    pub fn phase(&self) -> Phase {
        self.shared.core.lock().phase
    }

    /// Current subscribe cursor; empty before the first successful subscribe
    pub fn timetoken(&self) -> String {
        self.shared.core.lock().cursor.timetoken.clone()
    }

    pub fn region(&self) -> Option<i64> {
        self.shared.core.lock().cursor.region
    }

    /// Next message of the last response
    pub fn get(&self) -> Option<String> {
        self.shared.core.lock().responses.next_message()
    }

    /// Next channel of the last response
    pub fn get_channel(&self) -> Option<String> {
        self.shared.core.lock().responses.next_channel()
    }

    pub fn get_v2(&self) -> Option<V2Message> {
        self.shared.core.lock().responses.next_v2_message()
    }

    pub fn last_http_code(&self) -> u16 {
        self.shared.core.lock().responses.http_code()
    }

    pub fn last_reply(&self) -> Option<serde_json::Value> {
        self.shared.core.lock().responses.reply().cloned()
    }

    pub fn last_error_message(&self) -> Option<String> {
        self.shared
            .core
            .lock()
            .responses
            .error_message()
            .map(str::to_string)
    }

    pub fn last_message_timetoken(&self) -> Option<String> {
        self.shared
            .core
            .lock()
            .responses
            .message_timetoken()
            .map(str::to_string)
    }

    pub fn last_action_timetoken(&self) -> Option<String> {
        self.shared
            .core
            .lock()
            .responses
            .action_timetoken()
            .map(str::to_string)
    }

    /// Channels currently registered by subscribe (comma-joined)
    pub fn registered_channels(&self) -> Option<String> {
        self.shared.core.lock().auto_register.registry.channel()
    }

    pub fn registered_channel_groups(&self) -> Option<String> {
        self.shared.core.lock().auto_register.registry.channel_group()
    }

    /// Whether the running transaction sends a body
    pub fn is_via_post(&self) -> bool {
        self.shared.core.lock().flags.via_post
    }

    pub fn is_patch_or_delete(&self) -> bool {
        self.shared.core.lock().flags.patch_or_delete
    }

    /// Set the transaction timeout, raised to the floor if below it
    ///
    /// Returns the value in effect.
    pub fn set_transaction_timeout(&self, timeout_ms: u64) -> u64 {
        let effective = if timeout_ms < MIN_TRANSACTION_TIMER_MS {
            warn!(
                context = self.id(),
                requested_ms = timeout_ms,
                minimum_ms = MIN_TRANSACTION_TIMER_MS,
                "Transaction timeout below minimum, clamping"
            );
            MIN_TRANSACTION_TIMER_MS
        } else {
            timeout_ms
        };
        self.shared.core.lock().timeouts.transaction_ms = effective;
        effective
    }

    pub fn transaction_timeout(&self) -> u64 {
        self.shared.core.lock().timeouts.transaction_ms
    }

    /// Set the DNS/connect timeout, raised to the floor if below it
    pub fn set_connect_timeout(&self, timeout_ms: u64) -> u64 {
        let effective = if timeout_ms < MIN_WAIT_CONNECT_TIMER_MS {
            warn!(
                context = self.id(),
                requested_ms = timeout_ms,
                minimum_ms = MIN_WAIT_CONNECT_TIMER_MS,
                "Connect timeout below minimum, clamping"
            );
            MIN_WAIT_CONNECT_TIMER_MS
        } else {
            timeout_ms
        };
        self.shared.core.lock().timeouts.connect_ms = effective;
        effective
    }

    pub fn connect_timeout(&self) -> u64 {
        self.shared.core.lock().timeouts.connect_ms
    }

    /// Register the completion callback, replacing any previous one
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&Context, TransactionKind, TransactionResult) + Send + Sync + 'static,
    {
        self.shared.core.lock().callback = Some(Arc::new(callback));
    }

    pub fn clear_callback(&self) {
        self.shared.core.lock().callback = None;
    }

    pub fn settings(&self) -> ContextSettings {
        self.shared.core.lock().settings.clone()
    }

    /// Replace the settings; a running transaction keeps the ones it started with
    pub fn set_settings(&self, settings: ContextSettings) {
        self.shared.core.lock().settings = settings;
    }

    /// Copy `settings` in if the context is idle
    pub(crate) fn apply_settings_if_idle(&self, settings: ContextSettings) -> bool {
        let mut guard = self.shared.core.lock();
        if guard.phase != Phase::Idle {
            return false;
        }
        guard.settings = settings;
        true
    }

    pub fn uuid(&self) -> String {
        self.shared.core.lock().settings.uuid.clone()
    }

    pub fn set_uuid(&self, uuid: impl Into<String>) {
        self.shared.core.lock().settings.uuid = uuid.into();
    }

    pub fn auth(&self) -> Option<String> {
        self.shared.core.lock().settings.auth.clone()
    }

    pub fn set_auth(&self, auth: Option<String>) {
        self.shared.core.lock().settings.auth = auth;
    }

    pub fn origin(&self) -> String {
        self.shared.core.lock().settings.origin.clone()
    }

    pub fn set_origin(&self, origin: impl Into<String>) {
        self.shared.core.lock().settings.origin = origin.into();
    }

    pub fn set_use_tls(&self, use_tls: bool) {
        self.shared.core.lock().settings.use_tls = use_tls;
    }

    pub fn set_keep_alive(&self, keep_alive: KeepAlive) {
        self.shared.core.lock().settings.keep_alive = keep_alive;
    }

    pub fn set_proxy(&self, proxy: Option<ProxyConfig>) {
        self.shared.core.lock().settings.proxy = proxy;
    }

    /// Turn on automatic presence heartbeats driven by `scheduler`
    pub fn enable_auto_heartbeat(
        &self,
        scheduler: &HeartbeatScheduler,
        period_sec: u64,
    ) -> Result<(), HeartbeatError> {
        scheduler.enable(self, period_sec)
    }

    pub fn disable_auto_heartbeat(&self) {
        let scheduler = self
            .shared
            .core
            .lock()
            .auto_register
            .heartbeat
            .as_ref()
            .map(|link| link.scheduler.clone());
        match scheduler {
            Some(scheduler) => scheduler.disable(self),
            None => self.shared.core.lock().flags.auto_heartbeat_enabled = false,
        }
    }

    pub fn is_auto_heartbeat_enabled(&self) -> bool {
        self.shared.core.lock().flags.auto_heartbeat_enabled
    }

    /// Change the heartbeat period; returns the period in effect after clamping
    pub fn set_heartbeat_period(
        &self,
        scheduler: &HeartbeatScheduler,
        period_sec: u64,
    ) -> Result<u64, HeartbeatError> {
        scheduler.set_period(self, period_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransportFactory;

    fn context(factory: &ScriptedTransportFactory) -> Context {
        Context::with_options(
            ContextSettings::new("pub-key", "sub-key").with_uuid("tester"),
            ContextOptions::default().with_transport(Arc::new(factory.clone())),
        )
    }

    #[test]
    fn test_blocking_time_transaction() {
        let factory = ScriptedTransportFactory::new();
        factory.reply("/time/0", 200, "[15000]");
        let ctx = context(&factory);
        assert_eq!(ctx.time(), TransactionResult::Ok);
        assert_eq!(ctx.get().as_deref(), Some("15000"));
        assert_eq!(ctx.last_result(), TransactionResult::Ok);
        assert!(ctx.can_start_transaction());
    }

    #[test]
    fn test_prep_failure_leaves_context_idle() {
        let factory = ScriptedTransportFactory::new();
        let ctx = context(&factory);
        assert_eq!(ctx.subscribe(None, None), TransactionResult::InvalidChannel);
        assert!(ctx.can_start_transaction());
        assert!(factory.requests().is_empty());
    }

    #[test]
    fn test_timeouts_clamp_to_floor() {
        let ctx = context(&ScriptedTransportFactory::new());
        assert_eq!(ctx.set_transaction_timeout(1_000), MIN_TRANSACTION_TIMER_MS);
        assert_eq!(ctx.transaction_timeout(), MIN_TRANSACTION_TIMER_MS);
        assert_eq!(ctx.set_connect_timeout(100), MIN_WAIT_CONNECT_TIMER_MS);
        assert_eq!(ctx.set_connect_timeout(20_000), 20_000);
        assert_eq!(ctx.connect_timeout(), 20_000);
    }

    #[test]
    fn test_released_context_rejects_transactions() {
        let factory = ScriptedTransportFactory::new();
        factory.always("/time/0", 200, "[1]");
        let ctx = context(&factory);
        ctx.free_with_timeout(Duration::from_millis(10)).unwrap();
        assert!(ctx.is_released());
        assert_eq!(ctx.time(), TransactionResult::InvalidUse);
        assert!(!ctx.can_start_transaction());
    }

    #[test]
    fn test_leave_updates_registry() {
        let factory = ScriptedTransportFactory::new();
        factory
            .always("/subscribe/", 200, r#"[[],"100"]"#)
            .always("/leave", 200, r#"{"status":200,"message":"OK"}"#);
        let ctx = context(&factory);
        assert_eq!(ctx.subscribe(Some("a,b"), None), TransactionResult::Ok);
        assert_eq!(ctx.registered_channels().as_deref(), Some("a,b"));
        assert_eq!(ctx.leave(Some("a"), None), TransactionResult::Ok);
        assert_eq!(ctx.registered_channels().as_deref(), Some("b"));
        assert_eq!(ctx.leave(None, None), TransactionResult::Ok);
        assert_eq!(ctx.registered_channels(), None);
        let leaves = factory.requests_matching("/leave");
        assert_eq!(leaves[1].path(), "/v2/presence/sub-key/sub-key/channel/b/leave");
    }

    #[test]
    fn test_keep_alive_off_closes_after_each_transaction() {
        let factory = ScriptedTransportFactory::new();
        factory.always("/time/0", 200, "[1]");
        let ctx = context(&factory);
        ctx.set_keep_alive(KeepAlive {
            enabled: false,
            ..KeepAlive::default()
        });
        ctx.time();
        ctx.time();
        assert_eq!(factory.close_count(), 2);
    }
}
