//! The CRU emulator equipment
//!
//! [`CruEmulator::produce_step`] is meant to be called repeatedly by a scheduler. Each
//! call either completes one round, producing exactly one page per link, or declines
//! without side effects on the time cursor or the link states:
//!
//! 1. pacing: the time cursor must not be ahead of the LHC clock
//! 2. back-pressure: the output queue must have a free slot for every link
//! 3. pages: the page source must supply a page for every link
//!
//! All links of a round start from the same time cursor. The cursor then moves to the
//! furthest point reached by any link, so each link's packet times never go backwards.
//! Distances are taken from the round start, so the cursor keeps moving when the 32-bit
//! orbit counter wraps.

use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::content::{ContentSource, RandomContent};
use crate::filler::{FillParams, fill_page};
use crate::link::LinkState;
use crate::page::{Page, PageSource};
use crate::queue::{PageReceiver, ReadyQueue};
use crate::rdh::{HeaderLayout, RdhV4};
use crate::stats::EmulatorStats;
use crate::timing::{Clock, LhcTime, MonotonicClock, TimeBase};
use crate::{EmulatorConfig, Result};

/// Why a production step did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclineReason {
    /// The time cursor is ahead of the elapsed real time
    AheadOfSchedule,
    /// Fewer free output slots than links
    QueueFull,
    /// The page source could not supply a page for every link
    NoFreePages,
}

/// Result of one production step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// One page per link was filled and queued
    Completed,
    /// Nothing was produced; try again later
    Declined(DeclineReason),
}

impl StepOutcome {
    pub fn is_completed(self) -> bool {
        self == StepOutcome::Completed
    }
}

/// Synthetic CRU readout equipment.
///
/// Generic over the page source `S` and the header layout `H`.
pub struct CruEmulator<S, H = RdhV4> {
    config: EmulatorConfig,
    params: FillParams,
    source: S,
    content: Box<dyn ContentSource>,
    time_base: TimeBase,
    links: Vec<LinkState>,
    pending: Vec<Option<Page>>,
    queue: ReadyQueue,
    stats: EmulatorStats,
    _layout: PhantomData<fn() -> H>,
}

impl<S: PageSource> CruEmulator<S, RdhV4> {
    /// Build an emulator writing RDH v4 headers.
    pub fn new(config: EmulatorConfig, source: S) -> Result<Self> {
        Self::with_layout(config, source)
    }
}

impl<S: PageSource, H: HeaderLayout> CruEmulator<S, H> {
    /// Build an emulator for header layout `H`.
    ///
    /// Fails if the configuration is invalid for `H`. Frame content is random (entropy
    /// seeded) and pacing follows the monotonic wall clock until replaced with
    /// [`with_content`](Self::with_content) / [`with_clock`](Self::with_clock).
    pub fn with_layout(config: EmulatorConfig, source: S) -> Result<Self> {
        config.validate::<H>()?;

        let links = config.number_of_links as usize;
        let params = FillParams {
            fee_id: config.fee_id,
            hb_period: config.hb_period,
            tf_period: config.tf_period,
            packet_size: config.cru_block_size as usize,
            bc_step: config.bc_step::<H>(),
        };

        info!(
            "CRU emulator: cruBlockSize={} numberOfLinks={} feeId={} linkId={} HBperiod={} TFperiod={} EmptyHbRatio={} PayloadSize={}",
            config.cru_block_size,
            config.number_of_links,
            config.fee_id,
            config.link_id,
            config.hb_period,
            config.tf_period,
            config.empty_hb_ratio,
            config.payload_size
        );
        info!("CRU emulator: using block rate = {} BC", params.bc_step);

        Ok(Self {
            content: Box::new(RandomContent::from_config(&config)),
            time_base: TimeBase::new(Arc::new(MonotonicClock::new())),
            links: vec![LinkState::default(); links],
            pending: (0..links).map(|_| None).collect(),
            queue: ReadyQueue::new(links),
            stats: EmulatorStats::default(),
            config,
            params,
            source,
            _layout: PhantomData,
        })
    }

    /// Replace the frame content source.
    pub fn with_content(mut self, content: impl ContentSource + 'static) -> Self {
        self.content = Box::new(content);
        self
    }

    /// Replace the pacing clock. The pacing anchor is re-armed.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.time_base.set_clock(clock);
        self
    }

    /// Run one production round, or decline.
    pub fn produce_step(&mut self) -> StepOutcome {
        if self.time_base.is_ahead_of_schedule() {
            return self.decline(DeclineReason::AheadOfSchedule);
        }

        let links = self.links.len();
        if self.queue.free_slots() < links {
            return self.decline(DeclineReason::QueueFull);
        }

        for index in 0..links {
            if self.pending[index].is_some() {
                continue;
            }
            match self.source.request_page() {
                Ok(Some(page)) => self.pending[index] = Some(page),
                Ok(None) => return self.decline(DeclineReason::NoFreePages),
                Err(e) => {
                    warn!("Page source error, retrying later: {}", e);
                    self.stats.page_source_errors += 1;
                    return self.decline(DeclineReason::NoFreePages);
                }
            }
        }

        let start = self.time_base.cursor();
        let mut end = start;

        for index in 0..links {
            let Some(mut page) = self.pending[index].take() else {
                continue;
            };
            let link_id = self.config.link_id.wrapping_add(index as u8);

            let report = fill_page::<H>(
                &mut page,
                link_id,
                &mut self.links[index],
                start,
                &self.params,
                self.content.as_mut(),
            );

            if report.packets == 0 && page.capacity() < self.params.packet_size {
                warn!(
                    "Link {}: page of {} bytes cannot hold a {}-byte packet",
                    link_id,
                    page.capacity(),
                    self.params.packet_size
                );
            }

            // furthest end, measured from the round start so an orbit wrap still counts
            if report.end.bunches_since(start) > end.bunches_since(start) {
                end = report.end;
            }
            self.stats.pages += 1;
            self.stats.packets += report.packets;
            self.stats.frames += report.frames;
            self.stats.empty_frames += report.empty_frames;
            self.stats.payload_bytes += report.payload_bytes;
            self.stats.timeframe_splits += report.split as u64;

            if let Err(page) = self.queue.push(page) {
                // free slots were checked above
                warn!("Output queue rejected page for link {}, dropping it", page.link_id());
            }
        }

        self.time_base.set_cursor(end);
        self.stats.rounds += 1;
        trace!("Round {} complete: time {} -> {}", self.stats.rounds, start, end);

        StepOutcome::Completed
    }

    fn decline(&mut self, reason: DeclineReason) -> StepOutcome {
        self.stats.record_decline(reason);
        StepOutcome::Declined(reason)
    }

    /// Pop the oldest filled page, if any.
    pub fn retrieve(&mut self) -> Option<Page> {
        self.queue.pop()
    }

    /// Consumer handle on the output queue, usable from another thread.
    pub fn receiver(&self) -> PageReceiver {
        self.queue.receiver()
    }

    /// Return to the just-constructed state.
    ///
    /// Link states are cleared, pages being filled and queued pages are dropped, the
    /// time cursor goes back to orbit 0 and pacing re-anchors on the next step.
    pub fn reset(&mut self) {
        self.links.iter_mut().for_each(LinkState::reset);
        let pending = self.pending.iter_mut().filter_map(Option::take).count();
        let queued = self.drain();
        self.time_base.rearm();
        self.stats = EmulatorStats::default();
        debug!("CRU emulator reset: dropped {} pending and {} queued pages", pending, queued);
    }

    /// Drop every page waiting in the output queue. Returns how many were dropped.
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.queue.pop().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Drained {} pages from the output queue", dropped);
        }
        dropped
    }

    pub fn stats(&self) -> &EmulatorStats {
        &self.stats
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// Current position of the shared time cursor.
    pub fn cursor(&self) -> LhcTime {
        self.time_base.cursor()
    }

    /// Bunch crossings between two frame starts.
    pub fn bc_step(&self) -> u32 {
        self.params.bc_step
    }

    /// Pages acquired but not yet filled.
    pub fn pending_pages(&self) -> usize {
        self.pending.iter().filter(|p| p.is_some()).count()
    }

    /// Pages waiting in the output queue.
    pub fn queued_pages(&self) -> usize {
        self.queue.len()
    }

    /// Frame state of each link, indexed from the first link id.
    pub fn link_states(&self) -> &[LinkState] {
        &self.links
    }
}
