use std::cell::Cell;
use std::time::Instant;

/// Number of timed pipeline phases.
pub const NB_PHASES: usize = 4;

pub const PHASE_SHUFFLE: usize = 0;
pub const PHASE_SELECT: usize = 1;
pub const PHASE_PARTITION: usize = 2;
pub const PHASE_MERGE: usize = 3;

/// Per-phase elapsed seconds for one sort job.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimers {
    pub elapsed: [f64; NB_PHASES],
}

impl PhaseTimers {
    pub fn shuffle(&self) -> f64 {
        self.elapsed[PHASE_SHUFFLE]
    }
    pub fn select(&self) -> f64 {
        self.elapsed[PHASE_SELECT]
    }
    pub fn partition(&self) -> f64 {
        self.elapsed[PHASE_PARTITION]
    }
    pub fn merge(&self) -> f64 {
        self.elapsed[PHASE_MERGE]
    }

    /// Sum over all phases.
    pub fn total(&self) -> f64 {
        self.elapsed.iter().sum()
    }
}

thread_local! {
    /// Per-thread monotonic epoch, lazily initialized on first call to `now()`.
    static EPOCH: Cell<Option<Instant>> = const { Cell::new(None) };
}

/// Current timestamp in seconds (monotonic, relative to first call on this thread).
pub fn now() -> f64 {
    EPOCH.with(|cell| {
        let epoch = match cell.get() {
            Some(e) => e,
            None => {
                let e = Instant::now();
                cell.set(Some(e));
                e
            }
        };
        epoch.elapsed().as_secs_f64()
    })
}
