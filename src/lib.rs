//! Synthetic CRU readout link emulator.
//!
//! Produces data pages shaped like those a Common Readout Unit delivers from its
//! optical links: every page holds fixed-size packets, each starting with a Raw Data
//! Header (RDH), grouped into heartbeat frames and timeframes on the LHC clock. Packet
//! times never run ahead of the real LHC clock, so the emulator can feed a readout chain
//! at a realistic rate.
//!
//! # Architecture
//!
//! - [`CruEmulator`]: one production step fills one page per link, or declines
//! - [`PageSource`] / [`PagePool`]: where empty pages come from
//! - [`HeaderLayout`] / [`RdhV4`]: how packet headers are encoded
//! - [`Driver`]: runs the production step on a tokio task and streams pages
//!
//! ## Example
//!
//! ```rust,no_run
//! use cru_emulator::{CruEmulator, Driver, EmulatorConfig, PagePool};
//! use futures::StreamExt;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmulatorConfig { number_of_links: 4, ..Default::default() };
//!     let emulator = CruEmulator::new(config, PagePool::new(64, 1024 * 1024))?;
//!     let mut pages = Driver::spawn(emulator, Duration::from_millis(1)).into_stream();
//!
//!     while let Some(page) = pages.next().await {
//!         println!("link {} TF {}: {} bytes", page.link_id(), page.timeframe_id(), page.used());
//!     }
//!     Ok(())
//! }
//! ```

mod config;
mod content;
mod error;
mod filler;
mod link;
mod queue;
mod stats;

pub mod driver;
pub mod emulator;
pub mod page;
pub mod pool;
pub mod rdh;
pub mod timing;

#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

pub use config::{EmulatorConfig, MAX_BC_STEP, MAX_PACKETS_PER_FRAME};
pub use content::{ContentSource, FrameContent, RandomContent};
pub use driver::{Driver, DriverChannels, PageStream};
pub use emulator::{CruEmulator, DeclineReason, StepOutcome};
pub use error::*;
pub use link::{FrameProgress, LinkState};
pub use page::{Packet, PacketIter, Page, PageSource};
pub use pool::PagePool;
pub use queue::PageReceiver;
pub use rdh::{HeaderLayout, PacketFields, RdhV4};
pub use stats::EmulatorStats;
pub use timing::{Clock, LhcTime, ManualClock, MonotonicClock};
