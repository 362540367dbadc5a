//! Data pages and the page source contract
//!
//! A [`Page`] is a fixed-capacity byte region handed out by a [`PageSource`]. The
//! emulator owns it while filling, then moves it into the output queue; from there it
//! belongs to whoever retrieves it.

use crossbeam_channel::Sender;
use std::fmt;
use std::marker::PhantomData;

use crate::rdh::{HeaderLayout, PacketFields};
use crate::{EmulatorError, Result};

/// A fixed-capacity data page plus the metadata set when it was filled.
pub struct Page {
    data: Box<[u8]>,
    used: usize,
    timeframe_id: u64,
    link_id: u8,
    recycle: Option<Sender<Box<[u8]>>>,
}

impl Page {
    /// A standalone zeroed page of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self::from_buffer(vec![0u8; capacity].into_boxed_slice())
    }

    /// Wrap an existing buffer. Its whole length is the page capacity.
    pub fn from_buffer(data: Box<[u8]>) -> Self {
        Self { data, used: 0, timeframe_id: 0, link_id: 0, recycle: None }
    }

    /// A page whose buffer goes back to `recycle` when dropped.
    pub(crate) fn pooled(data: Box<[u8]>, recycle: Sender<Box<[u8]>>) -> Self {
        Self { data, used: 0, timeframe_id: 0, link_id: 0, recycle: Some(recycle) }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes filled with packets.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn timeframe_id(&self) -> u64 {
        self.timeframe_id
    }

    pub fn link_id(&self) -> u8 {
        self.link_id
    }

    /// The filled part of the page.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.used]
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_metadata(&mut self, used: usize, timeframe_id: u64, link_id: u8) {
        debug_assert!(used <= self.data.len());
        self.used = used;
        self.timeframe_id = timeframe_id;
        self.link_id = link_id;
    }

    /// Walk the packets of the filled part, decoding headers with layout `H`.
    pub fn packets<H: HeaderLayout>(&self) -> PacketIter<'_, H> {
        PacketIter::new(self.data())
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        if let Some(recycle) = self.recycle.take() {
            // the pool may already be gone
            let _ = recycle.try_send(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("capacity", &self.data.len())
            .field("used", &self.used)
            .field("timeframe_id", &self.timeframe_id)
            .field("link_id", &self.link_id)
            .field("pooled", &self.recycle.is_some())
            .finish()
    }
}

/// External pool supplying empty pages, one at a time.
///
/// `Ok(None)` means no page is free right now. The emulator treats an `Err` the same
/// way: the production step declines and retries on the next invocation.
pub trait PageSource: Send {
    fn request_page(&mut self) -> Result<Option<Page>>;
}

impl PageSource for Box<dyn PageSource> {
    fn request_page(&mut self) -> Result<Option<Page>> {
        (**self).request_page()
    }
}

/// One packet read back from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// Byte offset of the packet in the page
    pub offset: usize,
    pub fields: PacketFields,
    /// Payload bytes, as announced by the header's memory size
    pub payload: &'a [u8],
}

/// Iterator over the packets of a filled page.
///
/// Follows each header's offset-to-next-packet field. Yields an error and stops on
/// a header that cannot be decoded or that points outside the page.
pub struct PacketIter<'a, H> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
    _layout: PhantomData<H>,
}

impl<'a, H: HeaderLayout> PacketIter<'a, H> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0, failed: false, _layout: PhantomData }
    }

    fn decode_at(&self, offset: usize) -> Result<Packet<'a>> {
        let fields = H::decode(&self.data[offset..])
            .map_err(|e| EmulatorError::header(offset, e.to_string()))?;

        let next = fields.offset_next_packet as usize;
        let size = fields.memory_size as usize;
        if next < H::SIZE || size < H::SIZE || size > next || offset + next > self.data.len() {
            return Err(EmulatorError::header(
                offset,
                format!("inconsistent sizes: memory {size}, next packet {next}"),
            ));
        }

        Ok(Packet { offset, fields, payload: &self.data[offset + H::SIZE..offset + size] })
    }
}

impl<'a, H: HeaderLayout> Iterator for PacketIter<'a, H> {
    type Item = Result<Packet<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        match self.decode_at(self.offset) {
            Ok(packet) => {
                self.offset += packet.fields.offset_next_packet as usize;
                Some(Ok(packet))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdh::RdhV4;

    fn write_packet(page: &mut Page, offset: usize, payload: &[u8], stop: bool) {
        let fields = PacketFields {
            offset_next_packet: 128,
            memory_size: (RdhV4::SIZE + payload.len()) as u16,
            stop_bit: stop,
            ..Default::default()
        };
        let buf = page.buffer_mut();
        RdhV4::encode(&fields, &mut buf[offset..]);
        buf[offset + RdhV4::SIZE..offset + RdhV4::SIZE + payload.len()].copy_from_slice(payload);
    }

    #[test]
    fn packets_follow_next_packet_offsets() {
        let mut page = Page::new(512);
        write_packet(&mut page, 0, &[1; 64], false);
        write_packet(&mut page, 128, &[2; 10], true);
        page.set_metadata(256, 3, 9);

        let packets: Vec<_> = page.packets::<RdhV4>().collect::<Result<_>>().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload, &[1; 64][..]);
        assert_eq!(packets[1].offset, 128);
        assert_eq!(packets[1].payload, &[2; 10][..]);
        assert!(packets[1].fields.stop_bit);

        assert_eq!(page.used(), 256);
        assert_eq!(page.timeframe_id(), 3);
        assert_eq!(page.link_id(), 9);
    }

    #[test]
    fn truncated_page_yields_one_error() {
        let mut page = Page::new(512);
        write_packet(&mut page, 0, &[1; 8], true);
        page.set_metadata(100, 1, 0);

        let results: Vec<_> = page.packets::<RdhV4>().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(EmulatorError::Header { offset: 0, .. })));
    }

    #[test]
    fn unfilled_page_has_no_packets() {
        let page = Page::new(1024);
        assert_eq!(page.data().len(), 0);
        assert_eq!(page.packets::<RdhV4>().count(), 0);
    }
}
