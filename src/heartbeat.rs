//! Auto Heartbeat
//!
//! Keeps presence alive for contexts that subscribe. Each enabled context gets a slot
//! (a "thumper") holding a clone context that sends the heartbeats. The slot's timer is
//! armed when a subscribe finishes and paused while one runs; when it expires the scheduler
//! thumps, sending a heartbeat for the owner's registered channels and groups.
//!
//! Locks are taken in the order context, slot table, timer table. The watcher thread only
//! ever holds the timer table, and copies expired slots out before touching anything else.

mod slots;
mod timers;

use crate::clock::{Clock, MonotonicClock};
use crate::context::{
    Context, ContextOptions, ContextShared, CoreState, DriveMode, HeartbeatLink,
};
use crate::error::HeartbeatError;
use crate::reactor::Reactor;
use crate::request::TransactionParams;
use crate::types::{min_heartbeat_period_sec, TransactionResult, MAX_HEARTBEAT_THUMPERS};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use slots::{SlotTable, Thumper};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use timers::TimerTable;
use tracing::{debug, info, trace, warn};

/// Scheduler tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Maximum number of thumpers
    #[serde(default = "default_max_thumpers")]
    pub max_thumpers: usize,
    /// Watcher tick in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Run the watcher thread; without it time only moves through `process_elapsed`
    #[serde(default = "default_spawn_watcher")]
    pub spawn_watcher: bool,
    /// Failed heartbeats retried at once before falling back to the full period
    #[serde(default = "default_max_immediate_retries")]
    pub max_immediate_retries: u32,
    /// Bound on waiting for each clone when freeing thumpers, in milliseconds
    #[serde(default = "default_free_timeout_ms")]
    pub free_timeout_ms: u64,
}

fn default_max_thumpers() -> usize {
    MAX_HEARTBEAT_THUMPERS
}

fn default_tick_ms() -> u64 {
    1
}

fn default_spawn_watcher() -> bool {
    true
}

fn default_max_immediate_retries() -> u32 {
    3
}

fn default_free_timeout_ms() -> u64 {
    1_000
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            max_thumpers: default_max_thumpers(),
            tick_ms: default_tick_ms(),
            spawn_watcher: default_spawn_watcher(),
            max_immediate_retries: default_max_immediate_retries(),
            free_timeout_ms: default_free_timeout_ms(),
        }
    }
}

struct SchedulerShared {
    config: HeartbeatConfig,
    slots: Mutex<SlotTable>,
    timers: Mutex<TimerTable>,
    stop: Mutex<bool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    clock: Arc<dyn Clock>,
    reactor: Reactor,
}

/// Cloneable handle to a heartbeat scheduler
#[derive(Clone)]
pub struct HeartbeatScheduler {
    shared: Arc<SchedulerShared>,
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("config", &self.shared.config)
            .finish()
    }
}

impl HeartbeatScheduler {
    /// Scheduler whose clones are driven by `reactor`
    pub fn new(config: HeartbeatConfig, reactor: Reactor) -> Self {
        Self::with_clock(config, reactor, Arc::new(MonotonicClock))
    }

    pub fn with_clock(config: HeartbeatConfig, reactor: Reactor, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.max_thumpers;
        Self {
            shared: Arc::new(SchedulerShared {
                slots: Mutex::new(SlotTable::new(capacity)),
                timers: Mutex::new(TimerTable::new(capacity)),
                stop: Mutex::new(false),
                watcher: Mutex::new(None),
                config,
                clock,
                reactor,
            }),
        }
    }

    pub fn config(&self) -> &HeartbeatConfig {
        &self.shared.config
    }

    fn ptr_eq(&self, other: &HeartbeatScheduler) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Enable auto heartbeat on `ctx` with `period_sec` between heartbeats
    ///
    /// Provisions a slot if the context has none. The timer is not armed until a subscribe
    /// finishes.
    pub fn enable(&self, ctx: &Context, period_sec: u64) -> Result<(), HeartbeatError> {
        let period_sec = self.clamp_period(period_sec)?;
        let mut guard = ctx.shared.core.lock();
        let core = &mut *guard;
        self.attach(ctx, core);
        let slot = match core.auto_register.slot() {
            Some(slot) => slot,
            None => self.provision(ctx, core, period_sec)?,
        };
        if let Some(thumper) = self.shared.slots.lock().get_mut(slot) {
            thumper.period_sec = period_sec;
        }
        if let Some(link) = core.auto_register.heartbeat.as_mut() {
            link.period_sec = period_sec;
        }
        core.flags.auto_heartbeat_enabled = true;
        info!(context = ctx.id(), slot, period_sec, "Auto heartbeat enabled");
        Ok(())
    }

    /// Disable auto heartbeat, releasing the slot and dropping its clone
    pub fn disable(&self, ctx: &Context) {
        let link = {
            let mut guard = ctx.shared.core.lock();
            guard.flags.auto_heartbeat_enabled = false;
            guard.auto_register.heartbeat.take()
        };
        if let Some(HeartbeatLink {
            scheduler,
            slot: Some(slot),
            ..
        }) = link
        {
            scheduler.release_slot(slot, Arc::as_ptr(&ctx.shared));
        }
        debug!(context = ctx.id(), "Auto heartbeat disabled");
    }

    pub fn is_enabled(&self, ctx: &Context) -> bool {
        ctx.is_auto_heartbeat_enabled()
    }

    /// Set the period, forming a slot if needed; returns the period in effect
    pub fn set_period(&self, ctx: &Context, period_sec: u64) -> Result<u64, HeartbeatError> {
        let period_sec = self.clamp_period(period_sec)?;
        let mut guard = ctx.shared.core.lock();
        let core = &mut *guard;
        self.attach(ctx, core);
        let slot = match core.auto_register.slot() {
            Some(slot) => slot,
            None => self.provision(ctx, core, period_sec)?,
        };
        if let Some(thumper) = self.shared.slots.lock().get_mut(slot) {
            thumper.period_sec = period_sec;
        }
        if let Some(link) = core.auto_register.heartbeat.as_mut() {
            link.period_sec = period_sec;
        }
        Ok(period_sec)
    }

    /// A subscribe is about to run on `ctx`: pause its heartbeat, or provision a slot
    pub fn notify_transaction_start(&self, ctx: &Context) {
        let slot = {
            let mut guard = ctx.shared.core.lock();
            let core = &mut *guard;
            if !core.flags.auto_heartbeat_enabled {
                return;
            }
            match core.auto_register.slot() {
                Some(slot) => slot,
                None => {
                    let period_sec = core
                        .auto_register
                        .heartbeat
                        .as_ref()
                        .map_or(min_heartbeat_period_sec(), |link| link.period_sec);
                    if let Err(e) = self.provision(ctx, core, period_sec) {
                        warn!(context = ctx.id(), error = %e, "Could not provision heartbeat slot");
                    }
                    return;
                }
            }
        };
        self.pause(slot);
    }

    /// A subscribe on `ctx` finished: restart its countdown at the full period
    pub fn notify_transaction_timer_arm(&self, ctx: &Context) {
        let slot = ctx.shared.core.lock().auto_register.slot();
        if let Some(slot) = slot {
            self.arm_slot(slot);
        }
    }

    /// Count active timers down by `elapsed_ms`, thumping those that expire
    pub fn process_elapsed(&self, elapsed_ms: u64) {
        let expired = self.shared.timers.lock().elapse(elapsed_ms);
        for slot in expired {
            trace!(slot, "Heartbeat timer expired");
            self.thump(slot);
        }
    }

    /// Free every clone, waiting a bounded time for each
    ///
    /// Owners keep auto heartbeat enabled and get a new slot on their next subscribe.
    pub fn free_all_thumpers(&self) -> Result<(), HeartbeatError> {
        let drained = self.shared.slots.lock().drain();
        self.shared.timers.lock().clear();
        let wait = Duration::from_millis(self.shared.config.free_timeout_ms);

        let mut failed = 0;
        for (slot, thumper) in drained {
            if let Some(owner) = thumper.owner.upgrade() {
                let mut core = owner.core.lock();
                if let Some(link) = core.auto_register.heartbeat.as_mut() {
                    if link.scheduler.ptr_eq(self) && link.slot == Some(slot) {
                        link.slot = None;
                    }
                }
            }
            if let Err(e) = thumper.heartbeat.free_with_timeout(wait) {
                warn!(slot, error = %e, "Heartbeat context did not finish in time");
                failed += 1;
            }
        }
        if failed > 0 {
            return Err(HeartbeatError::FreeFailed { failed });
        }
        Ok(())
    }

    /// Ask the watcher thread to stop; it exits at its next tick
    pub fn stop(&self) {
        *self.shared.stop.lock() = true;
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.stop.lock()
    }

    /// Stop and join the watcher, then free every thumper
    pub fn shutdown(&self) -> Result<(), HeartbeatError> {
        self.stop();
        let handle = self.shared.watcher.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Heartbeat watcher panicked");
            }
        }
        self.free_all_thumpers()
    }

    pub fn thumpers_in_use(&self) -> usize {
        self.shared.slots.lock().in_use()
    }

    pub fn active_timer_count(&self) -> usize {
        self.shared.timers.lock().active_count()
    }

    pub fn is_timer_active(&self, ctx: &Context) -> bool {
        self.slot_of(ctx)
            .is_some_and(|slot| self.shared.timers.lock().is_active(slot))
    }

    /// Time left on the context's countdown; `None` when it is not running
    pub fn remaining_ms(&self, ctx: &Context) -> Option<u64> {
        self.slot_of(ctx)
            .and_then(|slot| self.shared.timers.lock().remaining_ms(slot))
    }

    /// Clone context sending the heartbeats of `ctx`
    pub fn heartbeat_context(&self, ctx: &Context) -> Option<Context> {
        let slot = self.slot_of(ctx)?;
        self.shared
            .slots
            .lock()
            .get(slot)
            .map(|thumper| thumper.heartbeat.clone())
    }

    pub fn period(&self, ctx: &Context) -> Option<u64> {
        let slot = self.slot_of(ctx)?;
        self.shared
            .slots
            .lock()
            .get(slot)
            .map(|thumper| thumper.period_sec)
    }

    fn slot_of(&self, ctx: &Context) -> Option<usize> {
        let core = ctx.shared.core.lock();
        core.auto_register
            .heartbeat
            .as_ref()
            .filter(|link| link.scheduler.ptr_eq(self))
            .and_then(|link| link.slot)
    }

    fn clamp_period(&self, period_sec: u64) -> Result<u64, HeartbeatError> {
        if period_sec == 0 {
            return Err(HeartbeatError::ZeroPeriod);
        }
        let min = min_heartbeat_period_sec();
        if period_sec < min {
            warn!(
                requested_sec = period_sec,
                minimum_sec = min,
                "Heartbeat period below minimum, clamping"
            );
            return Ok(min);
        }
        Ok(period_sec)
    }

    /// Point the context at this scheduler, releasing a slot held with another one
    fn attach(&self, ctx: &Context, core: &mut CoreState) {
        if let Some(link) = &core.auto_register.heartbeat {
            if link.scheduler.ptr_eq(self) {
                return;
            }
        }
        let previous = core.auto_register.heartbeat.replace(HeartbeatLink {
            scheduler: self.clone(),
            slot: None,
            period_sec: min_heartbeat_period_sec(),
        });
        if let Some(HeartbeatLink {
            scheduler,
            slot: Some(slot),
            ..
        }) = previous
        {
            scheduler.release_slot(slot, Arc::as_ptr(&ctx.shared));
        }
    }

    /// Form a thumper for `ctx`; runs under the owner's lock
    fn provision(
        &self,
        ctx: &Context,
        core: &mut CoreState,
        period_sec: u64,
    ) -> Result<usize, HeartbeatError> {
        let heartbeat = Context::with_options(
            core.settings.clone(),
            ContextOptions {
                transport: Arc::clone(&ctx.shared.factory),
                clock: Arc::clone(&ctx.shared.clock),
                mode: DriveMode::Callback(self.shared.reactor.clone()),
            },
        );
        let weak = Arc::downgrade(&self.shared);
        heartbeat.register_callback(move |clone, _kind, result| {
            if let Some(shared) = weak.upgrade() {
                HeartbeatScheduler { shared }.on_heartbeat_done(clone, result);
            }
        });

        let thumper = Thumper {
            owner: Arc::downgrade(&ctx.shared),
            heartbeat,
            period_sec,
            failures: 0,
            paused: false,
        };
        let slot = self.shared.slots.lock().allocate(thumper).map_err(|_| {
            HeartbeatError::NoThumperSlots {
                max: self.shared.config.max_thumpers,
            }
        })?;

        core.auto_register.heartbeat = Some(HeartbeatLink {
            scheduler: self.clone(),
            slot: Some(slot),
            period_sec,
        });
        debug!(context = ctx.id(), slot, "Heartbeat thumper provisioned");
        self.ensure_watcher()?;
        Ok(slot)
    }

    /// Resume `slot` and re-arm it at its full period; runs under the owner's lock
    pub(crate) fn arm_slot(&self, slot: usize) {
        let mut slots = self.shared.slots.lock();
        let Some(thumper) = slots.get_mut(slot) else {
            return;
        };
        thumper.paused = false;
        self.arm_locked(slot, thumper.period_sec);
    }

    /// Start the countdown of `slot`; the caller holds the slot table
    fn arm_locked(&self, slot: usize, period_sec: u64) {
        self.shared
            .timers
            .lock()
            .arm(slot, period_sec.saturating_mul(1000));
        trace!(slot, period_sec, "Heartbeat timer armed");
    }

    /// Give back `slot` if `owner` still holds it
    pub(crate) fn release_slot(&self, slot: usize, owner: *const ContextShared) {
        let thumper = {
            let mut slots = self.shared.slots.lock();
            match slots.get(slot) {
                Some(thumper) if thumper.is_owned_by(owner) => slots.release(slot),
                _ => None,
            }
        };
        let Some(thumper) = thumper else {
            return;
        };
        self.shared.timers.lock().remove(slot);
        thumper.heartbeat.cancel();
        debug!(slot, "Heartbeat thumper released");
    }

    fn pause(&self, slot: usize) {
        let heartbeat = {
            let mut slots = self.shared.slots.lock();
            let heartbeat = slots.get_mut(slot).map(|thumper| {
                thumper.paused = true;
                thumper.heartbeat.clone()
            });
            self.shared.timers.lock().remove(slot);
            heartbeat
        };
        if let Some(heartbeat) = heartbeat {
            if heartbeat.cancel() {
                debug!(slot, "Cancelled heartbeat in flight");
            }
        }
        trace!(slot, "Heartbeat paused");
    }

    fn thump(&self, slot: usize) {
        let (owner, heartbeat) = match self.shared.slots.lock().get(slot) {
            Some(thumper) if thumper.paused => {
                trace!(slot, "Heartbeat paused, not sending");
                return;
            }
            Some(thumper) => (thumper.owner.clone(), thumper.heartbeat.clone()),
            None => return,
        };

        let Some(owner) = owner.upgrade() else {
            debug!(slot, "Heartbeat owner is gone, skipping");
            return;
        };
        let owner = Context::from_shared(owner);
        let (settings, channel, channel_group) = {
            let core = owner.shared.core.lock();
            if core.flags.released || core.auto_register.registry.is_empty() {
                trace!(context = owner.id(), slot, "Nothing to heartbeat");
                return;
            }
            (
                core.settings.clone(),
                core.auto_register.registry.channel(),
                core.auto_register.registry.channel_group(),
            )
        };

        if !heartbeat.apply_settings_if_idle(settings) {
            debug!(context = owner.id(), slot, "Heartbeat already in flight");
            return;
        }
        let result = heartbeat.start_transaction(TransactionParams::Heartbeat {
            channel,
            channel_group,
        });
        match result {
            TransactionResult::Started => {
                trace!(context = owner.id(), slot, "Heartbeat sent");
            }
            TransactionResult::InProgress => {
                debug!(context = owner.id(), slot, "Heartbeat already in flight");
            }
            other => self.on_heartbeat_done(&heartbeat, other),
        }
    }

    fn on_heartbeat_done(&self, heartbeat: &Context, result: TransactionResult) {
        let retries = self.shared.config.max_immediate_retries;
        let slot = {
            let mut slots = self.shared.slots.lock();
            let Some(slot) = slots.find_by_heartbeat(heartbeat) else {
                return;
            };
            let Some(thumper) = slots.get_mut(slot) else {
                return;
            };
            if thumper.paused {
                trace!(slot, result = result.as_str(), "Heartbeat finished while paused");
                return;
            }
            let retry = match result {
                TransactionResult::Ok => {
                    thumper.failures = 0;
                    false
                }
                TransactionResult::Cancelled => return,
                failure => {
                    thumper.failures += 1;
                    warn!(
                        slot,
                        result = failure.as_str(),
                        failures = thumper.failures,
                        "Heartbeat failed"
                    );
                    thumper.failures <= retries
                }
            };
            if !retry {
                self.arm_locked(slot, thumper.period_sec);
                return;
            }
            slot
        };
        self.thump(slot);
    }

    fn ensure_watcher(&self) -> Result<(), HeartbeatError> {
        if !self.shared.config.spawn_watcher || self.is_stopped() {
            return Ok(());
        }
        let mut watcher = self.shared.watcher.lock();
        if watcher.is_some() {
            return Ok(());
        }
        let weak = Arc::downgrade(&self.shared);
        let tick = Duration::from_millis(self.shared.config.tick_ms.max(1));
        let start = self.shared.clock.now();
        let handle = std::thread::Builder::new()
            .name("pubsub-heartbeat".to_string())
            .spawn(move || run_watcher(weak, tick, start))
            .map_err(HeartbeatError::WatcherSpawn)?;
        *watcher = Some(handle);
        debug!("Heartbeat watcher started");
        Ok(())
    }
}

fn run_watcher(weak: Weak<SchedulerShared>, tick: Duration, start: Instant) {
    let mut last = start;
    loop {
        std::thread::sleep(tick);
        let Some(shared) = weak.upgrade() else {
            break;
        };
        if *shared.stop.lock() {
            break;
        }
        let now = shared.clock.now();
        let elapsed = shared.clock.elapsed_ms(last, now);
        if elapsed > 0 {
            last += Duration::from_millis(elapsed);
            HeartbeatScheduler { shared }.process_elapsed(elapsed);
        }
    }
    debug!("Heartbeat watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSettings;
    use crate::transport::ScriptedTransportFactory;

    fn manual_scheduler(max_thumpers: usize) -> HeartbeatScheduler {
        HeartbeatScheduler::new(
            HeartbeatConfig {
                max_thumpers,
                spawn_watcher: false,
                ..HeartbeatConfig::default()
            },
            Reactor::new(),
        )
    }

    fn context(factory: &ScriptedTransportFactory) -> Context {
        Context::with_options(
            ContextSettings::new("pub", "sub").with_uuid("owner"),
            ContextOptions::default().with_transport(Arc::new(factory.clone())),
        )
    }

    #[test]
    fn test_enable_provisions_without_arming() {
        let factory = ScriptedTransportFactory::new();
        let scheduler = manual_scheduler(4);
        let ctx = context(&factory);
        ctx.enable_auto_heartbeat(&scheduler, 30).unwrap();
        assert!(ctx.is_auto_heartbeat_enabled());
        assert_eq!(scheduler.thumpers_in_use(), 1);
        assert_eq!(scheduler.active_timer_count(), 0);
        assert_eq!(scheduler.period(&ctx), Some(30));
        let clone = scheduler.heartbeat_context(&ctx).unwrap();
        assert_eq!(clone.uuid(), "owner");
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let scheduler = manual_scheduler(1);
        let ctx = context(&ScriptedTransportFactory::new());
        assert!(matches!(
            scheduler.enable(&ctx, 0),
            Err(HeartbeatError::ZeroPeriod)
        ));
        assert!(!ctx.is_auto_heartbeat_enabled());
    }

    #[test]
    fn test_disable_releases_slot() {
        let scheduler = manual_scheduler(1);
        let a = context(&ScriptedTransportFactory::new());
        let b = context(&ScriptedTransportFactory::new());
        a.enable_auto_heartbeat(&scheduler, 20).unwrap();
        assert!(matches!(
            b.enable_auto_heartbeat(&scheduler, 20),
            Err(HeartbeatError::NoThumperSlots { max: 1 })
        ));
        a.disable_auto_heartbeat();
        assert_eq!(scheduler.thumpers_in_use(), 0);
        b.enable_auto_heartbeat(&scheduler, 20).unwrap();
        assert_eq!(scheduler.thumpers_in_use(), 1);
    }

    #[test]
    fn test_dropped_owner_gives_slot_back() {
        let scheduler = manual_scheduler(2);
        {
            let ctx = context(&ScriptedTransportFactory::new());
            ctx.enable_auto_heartbeat(&scheduler, 20).unwrap();
            assert_eq!(scheduler.thumpers_in_use(), 1);
        }
        assert_eq!(scheduler.thumpers_in_use(), 0);
    }

    #[test]
    fn test_thump_skipped_for_empty_registry() {
        let factory = ScriptedTransportFactory::new();
        let scheduler = manual_scheduler(2);
        let ctx = context(&factory);
        ctx.enable_auto_heartbeat(&scheduler, 10).unwrap();
        scheduler.notify_transaction_timer_arm(&ctx);
        assert_eq!(scheduler.remaining_ms(&ctx), Some(10_000));
        scheduler.process_elapsed(10_000);
        assert_eq!(scheduler.active_timer_count(), 0);
        assert!(factory.requests_matching("/heartbeat").is_empty());
    }

    #[test]
    fn test_free_all_thumpers_keeps_owner_enabled() {
        let scheduler = manual_scheduler(2);
        let ctx = context(&ScriptedTransportFactory::new());
        ctx.enable_auto_heartbeat(&scheduler, 20).unwrap();
        scheduler.free_all_thumpers().unwrap();
        assert_eq!(scheduler.thumpers_in_use(), 0);
        assert!(ctx.is_auto_heartbeat_enabled());
        assert_eq!(scheduler.heartbeat_context(&ctx).map(|c| c.id()), None);
    }

    #[test]
    fn test_heartbeat_finishing_during_subscribe_stays_paused() {
        let factory = ScriptedTransportFactory::new();
        factory.hold("/subscribe/");
        let reactor = Reactor::new();
        let scheduler = HeartbeatScheduler::new(
            HeartbeatConfig {
                spawn_watcher: false,
                ..HeartbeatConfig::default()
            },
            reactor.clone(),
        );
        let ctx = Context::with_options(
            ContextSettings::new("pub", "sub").with_uuid("owner"),
            ContextOptions::default()
                .with_transport(Arc::new(factory.clone()))
                .with_mode(DriveMode::Callback(reactor.clone())),
        );
        ctx.enable_auto_heartbeat(&scheduler, 60).unwrap();
        assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Started);
        assert_eq!(scheduler.active_timer_count(), 0);

        let clone = scheduler.heartbeat_context(&ctx).unwrap();
        scheduler.on_heartbeat_done(&clone, TransactionResult::Ok);
        assert_eq!(scheduler.active_timer_count(), 0);
        scheduler.on_heartbeat_done(&clone, TransactionResult::HttpError);
        assert_eq!(scheduler.active_timer_count(), 0);
        assert!(factory.requests_matching("/heartbeat").is_empty());

        factory.reply("/subscribe/", 200, r#"[[],"100"]"#).release("/subscribe/");
        assert_eq!(
            ctx.await_result_timeout(Duration::from_secs(5)).unwrap(),
            TransactionResult::Ok
        );
        assert_eq!(scheduler.remaining_ms(&ctx), Some(60_000));
        reactor.shutdown();
    }

    #[test]
    fn test_huge_period_saturates_countdown() {
        let scheduler = manual_scheduler(1);
        let ctx = context(&ScriptedTransportFactory::new());
        assert_eq!(
            ctx.set_heartbeat_period(&scheduler, u64::MAX).unwrap(),
            u64::MAX
        );
        scheduler.notify_transaction_timer_arm(&ctx);
        assert_eq!(scheduler.remaining_ms(&ctx), Some(u64::MAX));
        scheduler.process_elapsed(60_000);
        assert_eq!(scheduler.remaining_ms(&ctx), Some(u64::MAX - 60_000));
    }
}
