//! In-flight operation counter with a hard ceiling.
//!
//! A dispatcher calls [`InFlightGate::start`] before handing work to a
//! worker and the worker calls [`InFlightGate::finish`] when done. The
//! dispatcher checks [`InFlightGate::is_saturated`] after each start and,
//! when saturated, pauses its input and blocks in
//! [`InFlightGate::wait_below_ceiling`]. [`InFlightGate::wait_idle`] drains
//! everything still running once the input is exhausted.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct GateState {
    in_flight: usize,
    high_water: usize,
    started: u64,
    finished: u64,
}

/// Counter of dispatched-but-unfinished operations.
#[derive(Debug)]
pub struct InFlightGate {
    ceiling: usize,
    state: Mutex<GateState>,
    changed: Condvar,
}

impl InFlightGate {
    /// Create a gate admitting at most `ceiling` operations (minimum 1).
    #[must_use]
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            state: Mutex::new(GateState::default()),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        // Counters stay consistent even if a worker panicked while holding the lock.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configured ceiling.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Record the start of an operation, blocking while the gate is full.
    pub fn start(&self) {
        let mut state = self.lock();
        while state.in_flight >= self.ceiling {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.in_flight += 1;
        state.started += 1;
        state.high_water = state.high_water.max(state.in_flight);
    }

    /// Record the completion of an operation.
    pub fn finish(&self) {
        let mut state = self.lock();
        debug_assert!(state.in_flight > 0, "finish without matching start");
        state.in_flight = state.in_flight.saturating_sub(1);
        state.finished += 1;
        drop(state);
        self.changed.notify_all();
    }

    /// Whether the next [`start`](Self::start) would block.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.lock().in_flight >= self.ceiling
    }

    /// Block until at least one slot is free.
    pub fn wait_below_ceiling(&self) {
        let mut state = self.lock();
        while state.in_flight >= self.ceiling {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block until every started operation has finished.
    pub fn wait_idle(&self) {
        let mut state = self.lock();
        while state.in_flight > 0 {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Operations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Largest number of simultaneous operations observed.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.lock().high_water
    }

    /// Total operations started.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.lock().started
    }

    /// Total operations finished.
    #[must_use]
    pub fn finished(&self) -> u64 {
        self.lock().finished
    }
}

/// Releases a gate slot when dropped, so a panicking worker cannot leak it.
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a InFlightGate,
}

impl<'a> GatePermit<'a> {
    /// Wrap a slot that has already been started on `gate`.
    #[must_use]
    pub fn adopt(gate: &'a InFlightGate) -> Self {
        Self { gate }
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.finish();
    }
}
