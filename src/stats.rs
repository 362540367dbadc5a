//! Production counters

use serde::Serialize;

use crate::emulator::DeclineReason;

/// Counters accumulated since construction or the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmulatorStats {
    /// Completed production rounds (one page per link each)
    pub rounds: u64,
    pub pages: u64,
    pub packets: u64,
    /// Heartbeat frames opened
    pub frames: u64,
    pub empty_frames: u64,
    pub payload_bytes: u64,
    /// Pages closed early on a timeframe boundary
    pub timeframe_splits: u64,
    pub declined_ahead_of_schedule: u64,
    pub declined_queue_full: u64,
    pub declined_no_pages: u64,
    /// Page source errors swallowed as "no page"
    pub page_source_errors: u64,
}

impl EmulatorStats {
    pub fn record_decline(&mut self, reason: DeclineReason) {
        match reason {
            DeclineReason::AheadOfSchedule => self.declined_ahead_of_schedule += 1,
            DeclineReason::QueueFull => self.declined_queue_full += 1,
            DeclineReason::NoFreePages => self.declined_no_pages += 1,
        }
    }

    /// Total declined production steps.
    pub fn declines(&self) -> u64 {
        self.declined_ahead_of_schedule + self.declined_queue_full + self.declined_no_pages
    }
}
