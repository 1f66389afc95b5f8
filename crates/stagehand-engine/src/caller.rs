//! Deferred user-callback execution off the RT thread.
//!
//! The RT thread pushes (callback, event) pairs onto a bounded SPSC queue;
//! a worker drains it, invokes the callbacks, and afterwards fires the
//! engine's wake hook so a scene switch requested while the RT thread was
//! idle still gets applied. On overflow the call is dropped and counted;
//! the RT thread never blocks here.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::warn;

use stagehand_midi::MidiEvent;

use crate::config::{ASYNC_CALLBACK_INTERVAL, ASYNC_JOIN_TIMEOUT, MAX_ASYNC_CALLS};
use crate::units::Callback;

struct AsyncCall {
    callback: Callback,
    ev: MidiEvent,
}

struct Shared {
    work_lock: Mutex<()>,
    work_cond: Condvar,
    quit: AtomicBool,
    stop_lock: Mutex<bool>,
    stop_cond: Condvar,
    dropped: AtomicU64,
}

/// Owns the worker thread; dropping it shuts the worker down with a bounded
/// join.
pub struct DeferredCaller {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

/// The RT-side handle for enqueueing calls. Single producer by ownership:
/// it lives inside the engine state guarded by the process mutex.
pub(crate) struct CallProducer {
    queue: HeapProd<AsyncCall>,
    shared: Arc<Shared>,
}

impl DeferredCaller {
    /// Start the worker. `wake` runs on the worker thread after each drain
    /// and after each idle timeout tick.
    pub(crate) fn spawn(wake: impl Fn() + Send + 'static) -> (DeferredCaller, CallProducer) {
        let (queue, consumer) = HeapRb::new(MAX_ASYNC_CALLS).split();

        let shared = Arc::new(Shared {
            work_lock: Mutex::new(()),
            work_cond: Condvar::new(),
            quit: AtomicBool::new(false),
            stop_lock: Mutex::new(false),
            stop_cond: Condvar::new(),
            dropped: AtomicU64::new(0),
        });

        let worker = thread::Builder::new()
            .name("stagehand-calls".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || worker_loop(consumer, shared, wake)
            })
            .expect("failed to spawn deferred-call worker");

        (
            DeferredCaller {
                shared: Arc::clone(&shared),
                worker: Some(worker),
            },
            CallProducer { queue, shared },
        )
    }

    /// Number of calls lost to queue overflow.
    pub fn dropped_calls(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for DeferredCaller {
    fn drop(&mut self) {
        self.shared.quit.store(true, Ordering::Release);
        self.shared.work_cond.notify_one();

        let mut stopped = self.shared.stop_lock.lock();
        if !*stopped {
            self.shared
                .stop_cond
                .wait_for(&mut stopped, ASYNC_JOIN_TIMEOUT);
        }
        let clean = *stopped;
        drop(stopped);

        match self.worker.take() {
            Some(handle) if clean => {
                let _ = handle.join();
            }
            Some(_) => {
                // a stuck user callback; leave the thread behind rather
                // than hang shutdown
                warn!("deferred-call worker did not stop in time, detaching");
            }
            None => {}
        }
    }
}

impl CallProducer {
    /// Queue a callback invocation. Returns false (and counts the drop)
    /// when the queue is full.
    pub(crate) fn enqueue(&mut self, callback: Callback, ev: MidiEvent) -> bool {
        if self.queue.try_push(AsyncCall { callback, ev }).is_err() {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("deferred-call queue full, callback dropped");
            false
        } else {
            self.shared.work_cond.notify_one();
            true
        }
    }

    pub(crate) fn dropped_calls(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

fn worker_loop(mut queue: HeapCons<AsyncCall>, shared: Arc<Shared>, wake: impl Fn()) {
    loop {
        if shared.quit.load(Ordering::Acquire) {
            break;
        }

        if queue.is_empty() {
            let mut guard = shared.work_lock.lock();
            shared
                .work_cond
                .wait_for(&mut guard, ASYNC_CALLBACK_INTERVAL);
        }

        while let Some(call) = queue.try_pop() {
            if let Err(err) = (call.callback)(&call.ev) {
                warn!(%err, "asynchronous callback failed");
            }
        }

        wake();
    }

    let mut stopped = shared.stop_lock.lock();
    *stopped = true;
    shared.stop_cond.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::CallResult;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn counting_callback(counter: Arc<AtomicUsize>) -> Callback {
        Arc::new(move |_: &MidiEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(CallResult::Keep)
        })
    }

    fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        done()
    }

    #[test]
    fn test_worker_invokes_queued_callbacks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (_caller, mut producer) = DeferredCaller::spawn(|| {});

        let callback = counting_callback(Arc::clone(&counter));
        for _ in 0..10 {
            assert!(producer.enqueue(Arc::clone(&callback), MidiEvent::noteon(0, 0, 60, 100)));
        }

        assert!(wait_until(Duration::from_secs(2), || counter
            .load(Ordering::SeqCst)
            == 10));
    }

    #[test]
    fn test_overflow_drops_and_counts() {
        let invoked = Arc::new(AtomicUsize::new(0));
        // block the worker so the queue can actually fill up
        let gate = Arc::new(AtomicBool::new(false));
        let callback: Callback = {
            let invoked = Arc::clone(&invoked);
            let gate = Arc::clone(&gate);
            Arc::new(move |_: &MidiEvent| {
                while !gate.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(CallResult::Keep)
            })
        };

        let (caller, mut producer) = DeferredCaller::spawn(|| {});

        let mut accepted = 0;
        for _ in 0..MAX_ASYNC_CALLS + 10 {
            if producer.enqueue(Arc::clone(&callback), MidiEvent::noteon(0, 0, 60, 100)) {
                accepted += 1;
            }
        }
        assert!(accepted >= MAX_ASYNC_CALLS - 1);
        assert!(producer.dropped_calls() > 0);

        gate.store(true, Ordering::SeqCst);
        assert!(wait_until(Duration::from_secs(3), || invoked
            .load(Ordering::SeqCst)
            == accepted));
        drop(caller);
    }

    #[test]
    fn test_wake_fires_on_idle_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let (_caller, _producer) = DeferredCaller::spawn({
            let ticks = Arc::clone(&ticks);
            move || {
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(wait_until(Duration::from_secs(2), || ticks
            .load(Ordering::SeqCst)
            >= 2));
    }

    #[test]
    fn test_shutdown_is_prompt() {
        let (caller, _producer) = DeferredCaller::spawn(|| {});
        let start = Instant::now();
        drop(caller);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
