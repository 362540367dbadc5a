//! Output queue of filled pages
//!
//! Bounded FIFO between the production step and the consumer. The capacity is one page
//! per link, and the producer checks for a full round of free slots before filling, so
//! a push never finds the queue full.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::page::Page;

pub(crate) struct ReadyQueue {
    tx: Sender<Page>,
    rx: Receiver<Page>,
    capacity: usize,
}

impl ReadyQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub(crate) fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.rx.len())
    }

    /// Push a page; hands it back if the queue is unexpectedly full.
    pub(crate) fn push(&self, page: Page) -> Result<(), Page> {
        self.tx.try_send(page).map_err(|e| match e {
            TrySendError::Full(page) | TrySendError::Disconnected(page) => page,
        })
    }

    pub(crate) fn pop(&self) -> Option<Page> {
        self.rx.try_recv().ok()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }

    pub(crate) fn receiver(&self) -> PageReceiver {
        PageReceiver { rx: self.rx.clone() }
    }
}

/// Consumer handle on the output queue.
///
/// Can be moved to another thread. Popping never blocks; `None` means no page is ready.
#[derive(Clone, Debug)]
pub struct PageReceiver {
    rx: Receiver<Page>,
}

impl PageReceiver {
    pub fn try_recv(&self) -> Option<Page> {
        self.rx.try_recv().ok()
    }

    /// Pages waiting in the queue.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(link_id: u8) -> Page {
        let mut page = Page::new(16);
        page.set_metadata(0, 1, link_id);
        page
    }

    #[test]
    fn fifo_order_and_capacity() {
        let queue = ReadyQueue::new(2);
        assert_eq!(queue.free_slots(), 2);
        assert!(queue.push(tagged(1)).is_ok());
        assert!(queue.push(tagged(2)).is_ok());
        assert_eq!(queue.free_slots(), 0);

        let rejected = queue.push(tagged(3)).unwrap_err();
        assert_eq!(rejected.link_id(), 3);

        assert_eq!(queue.pop().map(|p| p.link_id()), Some(1));
        assert_eq!(queue.pop().map(|p| p.link_id()), Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn receiver_sees_pushed_pages_across_threads() {
        let queue = ReadyQueue::new(4);
        let receiver = queue.receiver();
        for link in 0..4 {
            queue.push(tagged(link)).unwrap();
        }

        let links = std::thread::spawn(move || {
            let mut links = Vec::new();
            while let Some(page) = receiver.try_recv() {
                links.push(page.link_id());
            }
            links
        })
        .join()
        .unwrap();

        assert_eq!(links, vec![0, 1, 2, 3]);
        assert_eq!(queue.len(), 0);
    }
}
