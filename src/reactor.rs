//! Reactor for callback-mode contexts.
//!
//! One worker thread per reactor advances every submitted context whenever it can make
//! progress and drops it from its list once the transaction has an outcome. The worker only
//! holds a weak reference between rounds and exits once every handle is gone.

use crate::context::{advance, Context, Progress};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

/// Pause between rounds while some transaction is blocked on its transport
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wait on an empty queue before re-checking whether the reactor is still referenced
const IDLE_WAIT: Duration = Duration::from_millis(50);

struct ReactorShared {
    pending: Mutex<Vec<Context>>,
    wake: Condvar,
    stop: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Cloneable handle to a reactor worker
#[derive(Clone)]
pub struct Reactor {
    shared: Arc<ReactorShared>,
}

impl Reactor {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(ReactorShared {
                pending: Mutex::new(Vec::new()),
                wake: Condvar::new(),
                stop: AtomicBool::new(false),
                worker: Mutex::new(None),
            }),
        }
    }

    /// Hand a started context to the worker, spawning it on first use
    pub fn submit(&self, ctx: Context) -> std::io::Result<()> {
        self.ensure_worker()?;
        trace!(context = ctx.id(), "Context submitted to reactor");
        self.shared.pending.lock().push(ctx);
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Number of contexts the worker is currently driving
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().len()
    }

    /// Stop the worker and wait for it; contexts still pending are left as they are
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.wake.notify_all();
        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                debug!("Reactor worker panicked");
            }
        }
    }

    fn ensure_worker(&self) -> std::io::Result<()> {
        let mut worker = self.shared.worker.lock();
        if worker.is_some() {
            return Ok(());
        }
        if self.shared.stop.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "reactor has been shut down",
            ));
        }
        let weak = Arc::downgrade(&self.shared);
        let handle = std::thread::Builder::new()
            .name("pubsub-reactor".to_string())
            .spawn(move || run_worker(weak))?;
        *worker = Some(handle);
        Ok(())
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

fn run_worker(weak: Weak<ReactorShared>) {
    debug!("Reactor worker started");
    loop {
        let Some(shared) = weak.upgrade() else {
            break;
        };
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }

        let batch = {
            let mut pending = shared.pending.lock();
            if pending.is_empty() {
                shared.wake.wait_for(&mut pending, IDLE_WAIT);
            }
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            continue;
        }

        let mut blocked = Vec::with_capacity(batch.len());
        for ctx in batch {
            match advance(&ctx) {
                Progress::Pending => blocked.push(ctx),
                Progress::Done(result) => {
                    trace!(context = ctx.id(), result = result.as_str(), "Reactor finished context");
                }
            }
        }
        let any_blocked = !blocked.is_empty();
        if any_blocked {
            shared.pending.lock().extend(blocked);
        }
        drop(shared);

        if any_blocked {
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    debug!("Reactor worker stopped");
}
