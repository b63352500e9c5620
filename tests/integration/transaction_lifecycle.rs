//! Integration tests for the transaction lifecycle of a single context

use pubsub_client::clock::ManualClock;
use pubsub_client::transport::ScriptedTransportFactory;
use pubsub_client::{
    Context, ContextOptions, ContextSettings, DriveMode, Phase, Reactor, TransactionKind,
    TransactionResult,
};
use std::sync::{mpsc, Arc, Barrier};
use std::time::Duration;

use crate::integration::{context_with, wait_until};

#[test]
fn test_second_transaction_is_rejected_while_one_is_in_flight() {
    let factory = ScriptedTransportFactory::new();
    factory.reply("/time/0", 200, "[15000]").hold("/time/0");
    let reactor = Reactor::new();
    let ctx = context_with(&factory, DriveMode::Callback(reactor.clone()));

    assert_eq!(ctx.time(), TransactionResult::Started);
    assert!(!ctx.can_start_transaction());
    assert_eq!(ctx.time(), TransactionResult::InProgress);
    assert_eq!(ctx.publish("demo", "\"hi\""), TransactionResult::InProgress);
    assert_eq!(ctx.transaction_kind(), TransactionKind::Time);

    factory.release("/time/0");
    assert_eq!(
        ctx.await_result_timeout(Duration::from_secs(5)).unwrap(),
        TransactionResult::Ok
    );
    assert!(ctx.can_start_transaction());
    assert_eq!(factory.requests_matching("/time/0").len(), 1);
    reactor.shutdown();
}

#[test]
fn test_concurrent_starts_admit_exactly_one() {
    const THREADS: usize = 8;
    let factory = ScriptedTransportFactory::new();
    factory.reply("/time/0", 200, "[15000]").hold("/time/0");
    let reactor = Reactor::new();
    let ctx = context_with(&factory, DriveMode::Callback(reactor.clone()));
    let barrier = Barrier::new(THREADS);

    let results: Vec<TransactionResult> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    ctx.time()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let started = results
        .iter()
        .filter(|&&r| r == TransactionResult::Started)
        .count();
    let in_progress = results
        .iter()
        .filter(|&&r| r == TransactionResult::InProgress)
        .count();
    assert_eq!(started, 1);
    assert_eq!(in_progress, THREADS - 1);

    factory.release("/time/0");
    assert_eq!(
        ctx.await_result_timeout(Duration::from_secs(5)).unwrap(),
        TransactionResult::Ok
    );
    assert_eq!(factory.requests_matching("/time/0").len(), 1);
    reactor.shutdown();
}

#[test]
fn test_subscribe_cursor_advances_and_resets_on_format_error() {
    let factory = ScriptedTransportFactory::new();
    factory
        .reply("/subscribe/", 200, r#"[[],"100"]"#)
        .reply("/subscribe/", 200, "not json")
        .reply("/subscribe/", 200, r#"[["one","two"],"200"]"#);
    let ctx = context_with(&factory, DriveMode::Blocking);

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert_eq!(ctx.timetoken(), "100");
    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::FormatError);
    assert_eq!(ctx.timetoken(), "");
    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Ok);
    assert_eq!(ctx.get().as_deref(), Some("\"one\""));
    assert_eq!(ctx.get().as_deref(), Some("\"two\""));
    assert_eq!(ctx.get(), None);

    let paths: Vec<String> = factory
        .requests_matching("/subscribe/")
        .iter()
        .map(|r| r.path())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/subscribe/sub-key/demo/0/0",
            "/subscribe/sub-key/demo/0/100",
            "/subscribe/sub-key/demo/0/0",
        ]
    );
}

#[test]
fn test_cancel_finishes_with_cancelled_and_fires_callback() {
    let factory = ScriptedTransportFactory::new();
    factory.hold("/subscribe/");
    let reactor = Reactor::new();
    let ctx = context_with(&factory, DriveMode::Callback(reactor.clone()));
    let (tx, rx) = mpsc::channel();
    ctx.register_callback(move |_, kind, result| {
        let _ = tx.send((kind, result));
    });

    assert!(!ctx.cancel());
    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Started);
    assert!(wait_until(|| ctx.phase() == Phase::Receiving));
    assert!(ctx.cancel());

    let (kind, result) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(kind, TransactionKind::Subscribe);
    assert_eq!(result, TransactionResult::Cancelled);
    assert_eq!(ctx.last_result(), TransactionResult::Cancelled);
    assert!(factory.cancel_count() >= 1);
    reactor.shutdown();
}

#[test]
fn test_transaction_timeout_with_manual_clock() {
    let factory = ScriptedTransportFactory::new();
    factory.hold("/time/0");
    let clock = Arc::new(ManualClock::new());
    let reactor = Reactor::new();
    let ctx = Context::with_options(
        ContextSettings::new("pub-key", "sub-key"),
        ContextOptions::default()
            .with_transport(Arc::new(factory.clone()))
            .with_clock(clock.clone())
            .with_mode(DriveMode::Callback(reactor.clone())),
    );
    ctx.set_transaction_timeout(20_000);

    assert_eq!(ctx.time(), TransactionResult::Started);
    assert!(wait_until(|| ctx.phase() == Phase::Receiving));
    clock.advance_ms(19_999);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(ctx.phase(), Phase::Receiving);

    clock.advance_ms(1);
    assert_eq!(
        ctx.await_result_timeout(Duration::from_secs(5)).unwrap(),
        TransactionResult::Timeout
    );
    reactor.shutdown();
}

#[test]
fn test_connect_failure_maps_to_outcome() {
    use pubsub_client::TransportError;

    let factory = ScriptedTransportFactory::new();
    factory
        .fail("/time/0", TransportError::Io("reset by peer".to_string()))
        .reply("/time/0", 200, "[7]");
    let ctx = context_with(&factory, DriveMode::Blocking);

    assert_eq!(ctx.time(), TransactionResult::IoError);
    assert_eq!(ctx.time(), TransactionResult::Ok);
    assert_eq!(ctx.get().as_deref(), Some("7"));
}

#[test]
fn test_http_error_keeps_reply_and_status() {
    let factory = ScriptedTransportFactory::new();
    factory.reply(
        "/publish/",
        403,
        r#"{"status":403,"message":"Forbidden","error":true}"#,
    );
    let ctx = context_with(&factory, DriveMode::Blocking);

    let result = ctx.publish("demo", "\"hi\"");
    assert_ne!(result, TransactionResult::Ok);
    assert_eq!(ctx.last_http_code(), 403);
    assert!(ctx.last_reply().is_some());
}

#[test]
fn test_free_cancels_outstanding_transaction() {
    let factory = ScriptedTransportFactory::new();
    factory.hold("/subscribe/");
    let reactor = Reactor::new();
    let ctx = context_with(&factory, DriveMode::Callback(reactor.clone()));

    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::Started);
    ctx.free_with_timeout(Duration::from_secs(5)).unwrap();
    assert!(ctx.is_released());
    assert_eq!(ctx.last_result(), TransactionResult::Cancelled);
    assert_eq!(ctx.subscribe(Some("demo"), None), TransactionResult::InvalidUse);
    reactor.shutdown();
}
