//! Integration tests for the auto-heartbeat scheduler

use pubsub_client::transport::ScriptedTransportFactory;
use pubsub_client::{
    Context, DriveMode, HeartbeatConfig, HeartbeatError, HeartbeatScheduler, Reactor,
    TransactionResult,
};
use std::time::Duration;

use crate::integration::{context_with, wait_until};

const PRESENCE_OK: &str = r#"{"status":200,"message":"OK","service":"Presence"}"#;

fn manual_scheduler(reactor: &Reactor) -> HeartbeatScheduler {
    HeartbeatScheduler::new(
        HeartbeatConfig {
            spawn_watcher: false,
            ..HeartbeatConfig::default()
        },
        reactor.clone(),
    )
}

fn await_clone(scheduler: &HeartbeatScheduler, ctx: &Context) -> TransactionResult {
    scheduler
        .heartbeat_context(ctx)
        .unwrap()
        .await_result_timeout(Duration::from_secs(5))
        .unwrap()
}

#[test]
fn test_heartbeat_sent_one_period_after_subscribe() {
    let factory = ScriptedTransportFactory::new();
    factory
        .hold("/subscribe/")
        .always("/heartbeat", 200, PRESENCE_OK);
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Callback(reactor.clone()));
    ctx.enable_auto_heartbeat(&scheduler, 60).unwrap();

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Started);
    assert_eq!(scheduler.active_timer_count(), 0);

    factory.reply("/subscribe/", 200, r#"[[],"15000"]"#).release("/subscribe/");
    assert_eq!(
        ctx.await_result_timeout(Duration::from_secs(5)).unwrap(),
        TransactionResult::Ok
    );
    assert_eq!(scheduler.remaining_ms(&ctx), Some(60_000));

    scheduler.process_elapsed(59_999);
    assert!(factory.requests_matching("/heartbeat").is_empty());
    scheduler.process_elapsed(1);
    assert_eq!(await_clone(&scheduler, &ctx), TransactionResult::Ok);

    let heartbeats = factory.requests_matching("/heartbeat");
    assert_eq!(heartbeats.len(), 1);
    assert_eq!(
        heartbeats[0].path(),
        "/v2/presence/sub-key/sub-key/channel/demo/heartbeat"
    );
    assert_eq!(heartbeats[0].request.query_value("uuid"), Some("tester"));

    // a successful heartbeat restarts the countdown
    assert!(wait_until(|| scheduler.remaining_ms(&ctx) == Some(60_000)));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_subscribe_pauses_and_rearms_timer() {
    let factory = ScriptedTransportFactory::new();
    factory
        .always("/subscribe/", 200, r#"[[],"100"]"#)
        .always("/heartbeat", 200, PRESENCE_OK);
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 30).unwrap();

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(30_000));

    scheduler.process_elapsed(10_000);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(20_000));

    assert_eq!(ctx.subscribe(None, None), TransactionResult::Ok);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(30_000));
    assert!(factory.requests_matching("/heartbeat").is_empty());
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_direct_notifications_pause_and_rearm() {
    let factory = ScriptedTransportFactory::new();
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 25).unwrap();

    scheduler.notify_transaction_timer_arm(&ctx);
    scheduler.process_elapsed(5_000);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(20_000));

    scheduler.notify_transaction_start(&ctx);
    assert_eq!(scheduler.active_timer_count(), 0);
    assert_eq!(scheduler.remaining_ms(&ctx), None);

    scheduler.notify_transaction_timer_arm(&ctx);
    assert_eq!(scheduler.active_timer_count(), 1);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(25_000));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_failed_subscribe_still_arms_timer() {
    let factory = ScriptedTransportFactory::new();
    factory.reply("/subscribe/", 500, r#"{"error":true}"#);
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 20).unwrap();

    assert_ne!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert!(scheduler.is_timer_active(&ctx));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_subscribe_cancels_heartbeat_in_flight_without_retry() {
    let factory = ScriptedTransportFactory::new();
    factory
        .always("/subscribe/", 200, r#"[[],"100"]"#)
        .always("/heartbeat", 200, PRESENCE_OK)
        .hold("/heartbeat");
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 10).unwrap();

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    scheduler.process_elapsed(10_000);
    let clone = scheduler.heartbeat_context(&ctx).unwrap();
    assert!(wait_until(|| factory.requests_matching("/heartbeat").len() == 1));
    assert!(!clone.can_start_transaction());

    assert_eq!(ctx.subscribe(None, None), TransactionResult::Ok);
    assert_eq!(
        clone.await_result_timeout(Duration::from_secs(5)).unwrap(),
        TransactionResult::Cancelled
    );
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(factory.requests_matching("/heartbeat").len(), 1);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(10_000));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_failed_heartbeats_retry_then_wait_a_period() {
    let factory = ScriptedTransportFactory::new();
    factory
        .always("/subscribe/", 200, r#"[[],"100"]"#)
        .always("/heartbeat", 500, r#"{"status":500,"message":"Internal Error"}"#);
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 10).unwrap();

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    scheduler.process_elapsed(10_000);

    let retries = HeartbeatConfig::default().max_immediate_retries as usize;
    assert!(wait_until(|| scheduler.is_timer_active(&ctx)));
    assert_eq!(factory.requests_matching("/heartbeat").len(), retries + 1);
    assert_eq!(scheduler.remaining_ms(&ctx), Some(10_000));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_seventeenth_context_cannot_enable() {
    let factory = ScriptedTransportFactory::new();
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let contexts: Vec<Context> = (0..16)
        .map(|_| context_with(&factory, DriveMode::Blocking))
        .collect();
    for ctx in &contexts {
        ctx.enable_auto_heartbeat(&scheduler, 30).unwrap();
    }
    assert_eq!(scheduler.thumpers_in_use(), 16);

    let extra = context_with(&factory, DriveMode::Blocking);
    assert!(matches!(
        extra.enable_auto_heartbeat(&scheduler, 30),
        Err(HeartbeatError::NoThumperSlots { max: 16 })
    ));
    assert!(!extra.is_auto_heartbeat_enabled());

    contexts[3].disable_auto_heartbeat();
    extra.enable_auto_heartbeat(&scheduler, 30).unwrap();
    assert_eq!(scheduler.thumpers_in_use(), 16);
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_period_below_minimum_is_clamped() {
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&ScriptedTransportFactory::new(), DriveMode::Blocking);

    assert_eq!(ctx.set_heartbeat_period(&scheduler, 3).unwrap(), 10);
    assert_eq!(scheduler.period(&ctx), Some(10));
    assert_eq!(ctx.set_heartbeat_period(&scheduler, 45).unwrap(), 45);
    assert!(matches!(
        ctx.set_heartbeat_period(&scheduler, 0),
        Err(HeartbeatError::ZeroPeriod)
    ));
    assert_eq!(scheduler.period(&ctx), Some(45));
    reactor.shutdown();
}

#[test]
fn test_free_all_thumpers_then_subscribe_provisions_again() {
    let factory = ScriptedTransportFactory::new();
    factory.always("/subscribe/", 200, r#"[[],"100"]"#);
    let reactor = Reactor::new();
    let scheduler = manual_scheduler(&reactor);
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 40).unwrap();

    scheduler.free_all_thumpers().unwrap();
    assert_eq!(scheduler.thumpers_in_use(), 0);
    assert!(ctx.is_auto_heartbeat_enabled());

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert_eq!(scheduler.thumpers_in_use(), 1);
    assert_eq!(scheduler.period(&ctx), Some(40));
    assert_eq!(scheduler.remaining_ms(&ctx), Some(40_000));
    scheduler.shutdown().unwrap();
    reactor.shutdown();
}

#[test]
fn test_watcher_thread_sends_heartbeats() {
    let factory = ScriptedTransportFactory::new();
    factory
        .always("/subscribe/", 200, r#"[[],"100"]"#)
        .always("/heartbeat", 200, PRESENCE_OK);
    let reactor = Reactor::new();
    let scheduler = HeartbeatScheduler::new(HeartbeatConfig::default(), reactor.clone());
    let ctx = context_with(&factory, DriveMode::Blocking);
    ctx.enable_auto_heartbeat(&scheduler, 10).unwrap();

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert!(scheduler.is_timer_active(&ctx));
    let remaining = scheduler.remaining_ms(&ctx).unwrap();
    assert!(remaining <= 10_000);
    assert!(wait_until(|| scheduler.remaining_ms(&ctx).is_some_and(|ms| ms < remaining)));

    scheduler.shutdown().unwrap();
    assert!(scheduler.is_stopped());
    reactor.shutdown();
}
