//! Orbit / bunch-crossing cursor and real-time pacing

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::{Clock, LHC_BUNCHES, LHC_ORBIT_RATE};

/// A point on the LHC clock: orbit counter plus bunch crossing within the orbit.
///
/// Ordering is lexicographic (orbit, then bunch crossing). `bc` is always below
/// [`LHC_BUNCHES`]. The orbit wraps like the 32-bit hardware counter it mirrors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LhcTime {
    pub orbit: u32,
    pub bc: u32,
}

impl LhcTime {
    pub const ZERO: LhcTime = LhcTime { orbit: 0, bc: 0 };

    pub fn new(orbit: u32, bc: u32) -> Self {
        debug_assert!(bc < LHC_BUNCHES, "bunch crossing {bc} out of range");
        Self { orbit, bc }
    }

    /// Advance by `step` bunch crossings.
    ///
    /// Returns the new time and whether at least one orbit boundary was crossed.
    pub fn advance(self, step: u32) -> (LhcTime, bool) {
        let next_bc = self.bc as u64 + step as u64;
        if next_bc < LHC_BUNCHES as u64 {
            return (LhcTime { orbit: self.orbit, bc: next_bc as u32 }, false);
        }
        let orbits = (next_bc / LHC_BUNCHES as u64) as u32;
        let bc = (next_bc % LHC_BUNCHES as u64) as u32;
        (LhcTime { orbit: self.orbit.wrapping_add(orbits), bc }, true)
    }

    /// Bunch crossings from `earlier` to `self`, following the orbit counter across a wrap.
    ///
    /// `self` must not be before `earlier`.
    pub fn bunches_since(self, earlier: LhcTime) -> u64 {
        let orbits = self.orbit.wrapping_sub(earlier.orbit) as u64;
        (orbits * LHC_BUNCHES as u64 + self.bc as u64).wrapping_sub(earlier.bc as u64)
    }

    /// Heartbeat frame index for a heartbeat period of `hb_period` orbits.
    pub fn heartbeat_orbit(self, hb_period: u32) -> u32 {
        self.orbit / hb_period
    }

    /// Timeframe id for a timeframe period of `tf_period` orbits. Ids start at 1.
    pub fn timeframe_id(self, tf_period: u32) -> u64 {
        1 + self.orbit as u64 / tf_period as u64
    }
}

impl fmt::Display for LhcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.orbit, self.bc)
    }
}

/// Shared time cursor of the emulator, tied to a real-time budget.
///
/// The budget anchor is taken lazily on the first pacing check, so the time spent
/// between construction and the first production step is not counted.
pub struct TimeBase {
    cursor: LhcTime,
    /// Times the orbit counter of the cursor wrapped
    wraps: u64,
    anchor: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl TimeBase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { cursor: LhcTime::ZERO, wraps: 0, anchor: None, clock }
    }

    pub fn cursor(&self) -> LhcTime {
        self.cursor
    }

    /// Move the cursor forward. A smaller orbit means the counter wrapped.
    pub fn set_cursor(&mut self, to: LhcTime) {
        if to.orbit < self.cursor.orbit {
            self.wraps += 1;
            debug!("Orbit counter wrapped: {} -> {to}", self.cursor);
        }
        self.cursor = to;
    }

    /// Orbits elapsed since orbit 0, counting wraps of the 32-bit counter.
    pub fn total_orbits(&self) -> u64 {
        (self.wraps << 32) | self.cursor.orbit as u64
    }

    /// Number of orbits the elapsed real time allows, anchoring the budget if needed.
    pub fn orbit_budget(&mut self) -> u64 {
        let now = self.clock.now();
        let anchor = *self.anchor.get_or_insert_with(|| {
            trace!("Pacing anchor set");
            now
        });
        let elapsed = now.saturating_sub(anchor);
        (elapsed.as_secs_f64() * LHC_ORBIT_RATE as f64) as u64
    }

    /// Whether the cursor is ahead of what the elapsed real time allows.
    ///
    /// Running slower than the LHC is not detected.
    pub fn is_ahead_of_schedule(&mut self) -> bool {
        let budget = self.orbit_budget();
        self.total_orbits() > budget
    }

    /// Swap the source of real time. The anchor is taken again on the next check.
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
        self.anchor = None;
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Rewind to orbit 0 and drop the pacing anchor.
    pub fn rearm(&mut self) {
        debug!("Time base re-armed at {}", self.cursor);
        self.cursor = LhcTime::ZERO;
        self.wraps = 0;
        self.anchor = None;
    }
}

impl fmt::Debug for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeBase")
            .field("cursor", &self.cursor)
            .field("wraps", &self.wraps)
            .field("anchor", &self.anchor)
            .finish_non_exhaustive()
    }
}
