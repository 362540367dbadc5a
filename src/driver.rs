//! Driver runs an emulator on a tokio task
//!
//! The task owns the [`CruEmulator`], calls its production step, and forwards filled
//! pages into a bounded channel. Declined steps back off for a configurable idle time.
//! Cancelling the token (or dropping the page receiver) stops the task, which then
//! drains and resets the emulator so every page goes back to its source.

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace};

use crate::emulator::{CruEmulator, StepOutcome};
use crate::page::{Page, PageSource};
use crate::rdh::HeaderLayout;
use crate::stats::EmulatorStats;

/// Result of spawning the production task
pub struct DriverChannels {
    /// Filled pages, in production order
    pub pages: mpsc::Receiver<Page>,
    /// Latest production counters
    pub stats: watch::Receiver<EmulatorStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
}

impl DriverChannels {
    /// Turn the page receiver into a [`Stream`]. Dropping the stream stops production.
    pub fn into_stream(self) -> PageStream {
        PageStream { pages: ReceiverStream::new(self.pages), _guard: self.cancel.drop_guard() }
    }

    /// Stream of counter snapshots, starting with the current one.
    pub fn stats_stream(&self) -> WatchStream<EmulatorStats> {
        WatchStream::new(self.stats.clone())
    }
}

pin_project! {
    /// Stream of filled pages that cancels the production task when dropped
    pub struct PageStream {
        #[pin]
        pages: ReceiverStream<Page>,
        _guard: DropGuard,
    }
}

impl Stream for PageStream {
    type Item = Page;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Page>> {
        self.project().pages.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pages.size_hint()
    }
}

/// Spawns and manages the production task
pub struct Driver;

impl Driver {
    /// Spawn the production task for `emulator`.
    ///
    /// `idle` is the back-off after a declined step. The page channel holds one round.
    pub fn spawn<S, H>(emulator: CruEmulator<S, H>, idle: Duration) -> DriverChannels
    where
        S: PageSource + 'static,
        H: HeaderLayout + 'static,
    {
        let capacity = emulator.config().number_of_links as usize;
        let (page_tx, page_rx) = mpsc::channel(capacity);
        let (stats_tx, stats_rx) = watch::channel(*emulator.stats());
        let cancel = CancellationToken::new();

        let cancel_task = cancel.clone();
        tokio::spawn(async move {
            Self::production_task(emulator, page_tx, stats_tx, idle, cancel_task).await;
        });

        DriverChannels { pages: page_rx, stats: stats_rx, cancel }
    }

    async fn production_task<S, H>(
        mut emulator: CruEmulator<S, H>,
        page_tx: mpsc::Sender<Page>,
        stats_tx: watch::Sender<EmulatorStats>,
        idle: Duration,
        cancel: CancellationToken,
    ) where
        S: PageSource,
        H: HeaderLayout,
    {
        info!("Production task started");

        'production: loop {
            if cancel.is_cancelled() {
                info!("Production cancelled");
                break;
            }

            match emulator.produce_step() {
                StepOutcome::Completed => {
                    while let Some(page) = emulator.retrieve() {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Production cancelled while delivering pages");
                                break 'production;
                            }
                            sent = page_tx.send(page) => {
                                if sent.is_err() {
                                    debug!("Page receiver dropped, shutting down");
                                    break 'production;
                                }
                            }
                        }
                    }
                    stats_tx.send_replace(*emulator.stats());
                    tokio::task::yield_now().await;
                }
                StepOutcome::Declined(reason) => {
                    trace!("Step declined: {:?}", reason);
                    stats_tx.send_replace(*emulator.stats());
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Production cancelled while idle");
                            break;
                        }
                        _ = tokio::time::sleep(idle) => {}
                    }
                }
            }
        }

        let stats = *emulator.stats();
        emulator.reset();
        info!(
            "Production task ended ({} rounds, {} pages, {} declined steps)",
            stats.rounds,
            stats.pages,
            stats.declines()
        );
    }
}
