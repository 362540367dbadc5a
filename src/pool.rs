//! Fixed-size page pool
//!
//! A bounded set of equally sized pages. Free buffers sit in a `crossbeam-channel`
//! free list; a [`Page`] handed out by the pool sends its buffer back when dropped,
//! wherever that happens (consumer thread, drain, reset).

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use tracing::debug;

use crate::page::{Page, PageSource};
use crate::{EmulatorError, Result};

/// Pool of `page_count` pages of `page_size` bytes each.
#[derive(Clone)]
pub struct PagePool {
    free_tx: Sender<Box<[u8]>>,
    free_rx: Receiver<Box<[u8]>>,
    page_size: usize,
    page_count: usize,
}

impl PagePool {
    pub fn new(page_count: usize, page_size: usize) -> Self {
        let (free_tx, free_rx) = bounded(page_count.max(1));
        for _ in 0..page_count {
            // capacity equals page_count, cannot fail
            let _ = free_tx.try_send(vec![0u8; page_size].into_boxed_slice());
        }
        debug!("Page pool created: {} pages of {} bytes", page_count, page_size);
        Self { free_tx, free_rx, page_size, page_count }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Pages currently free.
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }
}

impl PageSource for PagePool {
    fn request_page(&mut self) -> Result<Option<Page>> {
        match self.free_rx.try_recv() {
            Ok(buffer) => Ok(Some(Page::pooled(buffer, self.free_tx.clone()))),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EmulatorError::page_source("free list closed")),
        }
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("page_size", &self.page_size)
            .field("page_count", &self.page_count)
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_fixed_number_of_pages() {
        let mut pool = PagePool::new(2, 4096);
        let a = pool.request_page().unwrap().expect("first page");
        let b = pool.request_page().unwrap().expect("second page");
        assert!(pool.request_page().unwrap().is_none());
        assert_eq!(a.capacity(), 4096);
        assert_eq!(b.capacity(), 4096);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn dropped_pages_return_to_pool() {
        let mut pool = PagePool::new(1, 256);
        let page = pool.request_page().unwrap().unwrap();
        assert_eq!(pool.available(), 0);

        drop(page);
        assert_eq!(pool.available(), 1);
        assert!(pool.request_page().unwrap().is_some());
    }

    #[test]
    fn pages_return_from_other_threads() {
        let mut pool = PagePool::new(4, 128);
        let pages: Vec<_> = (0..4).map(|_| pool.request_page().unwrap().unwrap()).collect();
        std::thread::spawn(move || drop(pages)).join().unwrap();
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn pages_outliving_the_pool_are_simply_freed() {
        let mut pool = PagePool::new(1, 64);
        let page = pool.request_page().unwrap().unwrap();
        drop(pool);
        drop(page);
    }
}
