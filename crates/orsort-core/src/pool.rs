use std::collections::VecDeque;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::SortError;

/// Type-erased iteration kernel.
///
/// Holds a raw trait-object pointer so items can sit in the shared queue
/// without a lifetime. `ThreadPool::run_iter` does not return until every
/// iteration has completed, which keeps the pointee alive for all
/// dereferences.
struct RawKernel(*const (dyn Fn(usize) + Sync));

// SAFETY: the pointee is Sync, and RawKernel is only dereferenced while
// the run_iter call that created it is still blocked (see above).
unsafe impl Send for RawKernel {}
unsafe impl Sync for RawKernel {}

/// One queued iteration item.
struct IterItem {
    kernel: RawKernel,
    count: usize,
    completed: AtomicUsize,
    done: Mutex<bool>,
    done_cv: Condvar,
}

/// Queue entry: the item plus the next unclaimed iteration index.
struct QueueEntry {
    item: Arc<IterItem>,
    next: usize,
}

struct QueueState {
    entries: VecDeque<QueueEntry>,
    shutdown: bool,
}

struct PoolShared {
    queue: Mutex<QueueState>,
    queue_cv: Condvar,
    rendezvous: Barrier,
    num_threads: usize,
}

/// Fixed worker set draining a FIFO queue of iteration items.
///
/// Iteration items are popped by slicing: each claimant takes a shard of
/// the remaining index range under the queue lock, and the entry leaves
/// the queue once the claimed end reaches `count`. The caller of
/// `run_iter` joins the drain as a temporary worker, so progress does not
/// depend on a free worker thread.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads >= 1);
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(QueueState {
                entries: VecDeque::new(),
                shutdown: false,
            }),
            queue_cv: Condvar::new(),
            rendezvous: Barrier::new(num_threads),
            num_threads,
        });

        let mut workers = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let shared_ref = Arc::clone(&shared);
            workers.push(thread::spawn(move || {
                Self::worker_loop(&shared_ref);
            }));
        }

        Self { shared, workers }
    }

    pub fn num_threads(&self) -> usize {
        self.shared.num_threads
    }

    fn worker_loop(shared: &PoolShared) {
        loop {
            let claim = {
                let mut state = shared.queue.lock().unwrap();
                loop {
                    if state.shutdown {
                        return;
                    }
                    if let Some(claim) = Self::claim(&mut state, shared.num_threads) {
                        break claim;
                    }
                    state = shared.queue_cv.wait(state).unwrap();
                }
            };
            Self::execute(claim);
        }
    }

    /// Slice a shard off the front entry. Must be called under the queue
    /// lock.
    fn claim(
        state: &mut QueueState,
        num_threads: usize,
    ) -> Option<(Arc<IterItem>, Range<usize>)> {
        let entry = state.entries.front_mut()?;
        let remaining = entry.item.count - entry.next;
        let chunk = remaining.div_ceil(num_threads).max(1);
        let lo = entry.next;
        let hi = (lo + chunk).min(entry.item.count);
        entry.next = hi;
        let item = Arc::clone(&entry.item);
        if hi == entry.item.count {
            state.entries.pop_front();
        }
        Some((item, lo..hi))
    }

    fn execute((item, range): (Arc<IterItem>, Range<usize>)) {
        // SAFETY: see RawKernel; the pushing run_iter call is still
        // blocked, so the kernel borrow is live.
        let kernel = unsafe { &*item.kernel.0 };
        let n = range.len();
        for i in range {
            kernel(i);
        }
        if item.completed.fetch_add(n, Ordering::AcqRel) + n == item.count {
            let mut done = item.done.lock().unwrap();
            *done = true;
            item.done_cv.notify_all();
        }
    }

    /// Run `kernel(i)` exactly once for every `i` in `[0, count)` across
    /// the worker set, returning once all iterations have completed.
    pub fn run_iter(&self, count: usize, kernel: &(dyn Fn(usize) + Sync)) {
        if count == 0 {
            return;
        }
        // SAFETY: the borrow is erased to 'static only for queue storage;
        // this function does not return before the done latch is set, so
        // no dereference outlives the caller's frame.
        let kernel: &'static (dyn Fn(usize) + Sync) = unsafe { std::mem::transmute(kernel) };
        let item = Arc::new(IterItem {
            kernel: RawKernel(kernel as *const _),
            count,
            completed: AtomicUsize::new(0),
            done: Mutex::new(false),
            done_cv: Condvar::new(),
        });

        {
            let mut state = self.shared.queue.lock().unwrap();
            state.entries.push_back(QueueEntry {
                item: Arc::clone(&item),
                next: 0,
            });
        }
        self.shared.queue_cv.notify_all();

        // Join the drain until the queue is observed empty, then wait for
        // shards still running on other workers.
        loop {
            let claim = {
                let mut state = self.shared.queue.lock().unwrap();
                Self::claim(&mut state, self.shared.num_threads)
            };
            match claim {
                Some(c) => Self::execute(c),
                None => break,
            }
        }

        let mut done = item.done.lock().unwrap();
        while !*done {
            done = item.done_cv.wait(done).unwrap();
        }
    }

    /// Run a single-shot task on the pool.
    pub fn run_task(&self, task: &(dyn Fn() + Sync)) {
        self.run_iter(1, &|_| task());
    }

    /// Meet the other workers at the pool barrier. Returns true on the
    /// arrival that released the barrier.
    pub fn rendezvous(&self) -> bool {
        self.shared.rendezvous.wait().is_leader()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.queue.lock().unwrap().shutdown = true;
        self.shared.queue_cv.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// First-error slot shared by the iterations of one kernel.
///
/// The first recorded error wins; later iterations keep running and
/// their errors are dropped. The waiter checks after the item drains.
pub struct ErrorCell {
    slot: Mutex<Option<SortError>>,
}

impl ErrorCell {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn record(&self, err: SortError) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn check(&self) -> Result<(), SortError> {
        match self.slot.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for ErrorCell {
    fn default() -> Self {
        Self::new()
    }
}
