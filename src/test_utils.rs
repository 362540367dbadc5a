//! Test utilities shared by unit tests and benchmarks
//!
//! Scripted frame content, a compact 32-byte header layout, and page sources that
//! never deliver.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;

use crate::content::{ContentSource, FrameContent};
use crate::page::{Packet, Page, PageSource};
use crate::rdh::{HeaderLayout, PacketFields};
use crate::{EmulatorConfig, EmulatorError, Result};

/// Frame content replayed from a script, then a fixed fallback once exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedContent {
    script: VecDeque<FrameContent>,
    fallback: FrameContent,
}

impl ScriptedContent {
    /// Play `script`, then zero-length payloads.
    pub fn new<I: IntoIterator<Item = FrameContent>>(script: I) -> Self {
        Self { script: script.into_iter().collect(), fallback: FrameContent::Payload(0) }
    }

    /// Always the same content.
    pub fn repeat(content: FrameContent) -> Self {
        Self { script: VecDeque::new(), fallback: content }
    }
}

impl ContentSource for ScriptedContent {
    fn next_frame(&mut self) -> FrameContent {
        self.script.pop_front().unwrap_or(self.fallback)
    }
}

/// 32-byte header layout with the same fields as RDH v4, packed into four words.
///
/// ```text
/// word0  feeId:16 linkId:8 stopBit:8 offsetToNext:16 memorySize:16
/// word1  triggerOrbit:32 heartbeatOrbit:32
/// word2  triggerBC:16 pagesCounter:16 zero:32
/// word3  reserved
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactHeader;

impl HeaderLayout for CompactHeader {
    const SIZE: usize = 32;

    fn encode(fields: &PacketFields, out: &mut [u8]) {
        let word0 = fields.fee_id as u64
            | (fields.link_id as u64) << 16
            | (fields.stop_bit as u64) << 24
            | (fields.offset_next_packet as u64) << 32
            | (fields.memory_size as u64) << 48;
        let word1 = fields.trigger_orbit as u64 | (fields.heartbeat_orbit as u64) << 32;
        let word2 = fields.trigger_bc as u64 | (fields.pages_counter as u64) << 16;
        for (chunk, word) in out[..Self::SIZE].chunks_exact_mut(8).zip([word0, word1, word2, 0]) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<PacketFields> {
        if bytes.len() < Self::SIZE {
            return Err(EmulatorError::header(0, format!("{} bytes, need 32", bytes.len())));
        }
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            u64::from_le_bytes(w)
        };
        let (word0, word1, word2) = (word(0), word(1), word(2));
        Ok(PacketFields {
            trigger_orbit: word1 as u32,
            trigger_bc: word2 as u16,
            heartbeat_orbit: (word1 >> 32) as u32,
            fee_id: word0 as u16,
            link_id: (word0 >> 16) as u8,
            offset_next_packet: (word0 >> 32) as u16,
            memory_size: (word0 >> 48) as u16,
            pages_counter: (word2 >> 16) as u16,
            stop_bit: (word0 >> 24) as u8 != 0,
        })
    }
}

/// Page source that never has a page.
#[derive(Debug, Default)]
pub struct StarvedSource;

impl PageSource for StarvedSource {
    fn request_page(&mut self) -> Result<Option<Page>> {
        Ok(None)
    }
}

/// Page source that always fails.
#[derive(Debug, Default)]
pub struct FailingSource;

impl PageSource for FailingSource {
    fn request_page(&mut self) -> Result<Option<Page>> {
        Err(EmulatorError::page_source("allocator unavailable"))
    }
}

/// Decode every packet of a page, panicking on malformed content.
pub fn decode_all<H: HeaderLayout>(page: &Page) -> Vec<Packet<'_>> {
    page.packets::<H>()
        .collect::<Result<Vec<_>>>()
        .expect("page should contain well-formed packets")
}

/// 64-byte packets with a 32-byte header, one link, no empty frames, payloads up to 96.
pub fn compact_config() -> EmulatorConfig {
    EmulatorConfig {
        number_of_links: 1,
        cru_block_size: 64,
        hb_period: 1,
        empty_hb_ratio: 0.0,
        payload_size: 96,
        ..Default::default()
    }
}
