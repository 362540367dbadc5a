//! LHC timing reference
//!
//! The emulator stamps every packet with an (orbit, bunch crossing) pair and never
//! lets that pair run ahead of what the real LHC would have produced in the elapsed
//! wall-clock time.
//!
//! - [`LhcTime`]: the two-level cursor and its arithmetic
//! - [`TimeBase`]: the shared cursor plus the real-time pacing budget
//! - [`Clock`]: where "now" comes from ([`MonotonicClock`] or [`ManualClock`])

mod clock;
mod time_base;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use time_base::{LhcTime, TimeBase};

/// Number of bunch crossings in one LHC orbit.
pub const LHC_BUNCHES: u32 = 3564;

/// LHC orbit rate in Hz (299792458 / 26659).
pub const LHC_ORBIT_RATE: u32 = 11246;

/// LHC bunch crossing rate in Hz.
pub const LHC_BC_RATE: u64 = LHC_ORBIT_RATE as u64 * LHC_BUNCHES as u64;
