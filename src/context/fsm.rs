//! Transaction state machine.
//!
//! `advance` runs steps under the context lock until the transport would block or the
//! transaction reaches an outcome. Both drive modes go through it: the blocking driver calls it
//! in a loop on the caller's thread, the reactor calls it from its worker.

use super::outcome;
use super::state::{CoreState, Phase};
use super::Context;
use crate::clock::Clock;
use crate::response;
use crate::transport::IoStatus;
use crate::types::TransactionResult;
use std::time::Duration;
use tracing::{debug, trace};

/// Pause between polls of a blocked transport when driving on the caller's thread
pub(crate) const BLOCKING_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Whether a transaction is still running after an `advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Progress {
    Pending,
    Done(TransactionResult),
}

enum Step {
    Next,
    Blocked,
    Finished(TransactionResult),
}

pub(crate) fn advance(ctx: &Context) -> Progress {
    let mut guard = ctx.shared.core.lock();
    if guard.phase == Phase::Idle {
        return Progress::Done(guard.last_result);
    }

    let result = loop {
        match step(&mut guard, ctx.shared.clock.as_ref(), ctx.id()) {
            Step::Next => continue,
            Step::Blocked => return Progress::Pending,
            Step::Finished(result) => break result,
        }
    };

    let callback = outcome::finalize(ctx.id(), &mut guard, result);
    let kind = guard.trans;
    drop(guard);
    ctx.shared.idle.notify_all();

    if let Some(callback) = callback {
        callback(ctx, kind, result);
    }
    Progress::Done(result)
}

/// Finish an in-progress transaction with `result` without stepping it
pub(crate) fn abort(ctx: &Context, result: TransactionResult) {
    let mut guard = ctx.shared.core.lock();
    if guard.phase == Phase::Idle {
        return;
    }
    guard.transport.cancel();
    let callback = outcome::finalize(ctx.id(), &mut guard, result);
    let kind = guard.trans;
    drop(guard);
    ctx.shared.idle.notify_all();

    if let Some(callback) = callback {
        callback(ctx, kind, result);
    }
}

/// Drive on the calling thread until the transaction finishes
pub(crate) fn run_blocking(ctx: &Context) -> TransactionResult {
    loop {
        match advance(ctx) {
            Progress::Done(result) => return result,
            Progress::Pending => std::thread::sleep(BLOCKING_POLL_INTERVAL),
        }
    }
}

fn step(core: &mut CoreState, clock: &dyn Clock, id: u64) -> Step {
    if core.flags.cancel_requested {
        core.transport.cancel();
        return Step::Finished(TransactionResult::Cancelled);
    }

    let now = clock.now();
    if matches!(core.phase, Phase::Resolving | Phase::Connecting)
        && clock.elapsed_ms(core.connect_started_at, now) >= core.timeouts.connect_ms
    {
        core.transport.cancel();
        return Step::Finished(TransactionResult::ConnectionTimeout);
    }
    if clock.elapsed_ms(core.started_at, now) >= core.timeouts.transaction_ms {
        core.transport.cancel();
        return Step::Finished(TransactionResult::Timeout);
    }

    let from = core.phase;
    let step = match core.phase {
        Phase::Idle => Step::Finished(core.last_result),
        Phase::Resolving => match core.transport.resolve(&core.settings) {
            IoStatus::Ready(()) => {
                core.phase = Phase::Connecting;
                Step::Next
            }
            IoStatus::WouldBlock => Step::Blocked,
            IoStatus::Failed(e) => {
                debug!(context = id, error = %e, "Resolution failed");
                Step::Finished(TransactionResult::AddrResolutionFailed)
            }
        },
        Phase::Connecting => match core.transport.connect(&core.settings) {
            IoStatus::Ready(()) => {
                core.phase = Phase::Sending;
                Step::Next
            }
            IoStatus::WouldBlock => Step::Blocked,
            IoStatus::Failed(e) => {
                debug!(context = id, error = %e, "Connect failed");
                Step::Finished(TransactionResult::ConnectFailed)
            }
        },
        Phase::Sending => {
            let Some(request) = core.request.as_ref() else {
                return Step::Finished(TransactionResult::InternalError);
            };
            match core.transport.send(request) {
                IoStatus::Ready(()) => {
                    core.phase = Phase::Receiving;
                    Step::Next
                }
                IoStatus::WouldBlock => Step::Blocked,
                IoStatus::Failed(e) => {
                    debug!(context = id, error = %e, "Send failed");
                    Step::Finished(TransactionResult::IoError)
                }
            }
        }
        Phase::Receiving => match core.transport.receive() {
            IoStatus::Ready(reply) => {
                core.response = Some(reply);
                core.phase = Phase::Parsing;
                Step::Next
            }
            IoStatus::WouldBlock => Step::Blocked,
            IoStatus::Failed(e) => {
                debug!(context = id, error = %e, "Receive failed");
                Step::Finished(TransactionResult::IoError)
            }
        },
        Phase::Parsing => match core.response.take() {
            Some(reply) => Step::Finished(response::parse(
                core.trans,
                &reply,
                &mut core.cursor,
                &mut core.responses,
            )),
            None => Step::Finished(TransactionResult::InternalError),
        },
    };

    if core.phase != from {
        trace!(
            context = id,
            from = from.as_str(),
            to = core.phase.as_str(),
            "Transaction phase changed"
        );
    }
    step
}
