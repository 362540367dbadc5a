//! Per-frame content decisions
//!
//! Each new heartbeat frame makes exactly one draw: empty, or a payload of some length.
//! The draw is behind [`ContentSource`] so runs can be made reproducible (seeded
//! [`RandomContent`]) or fully scripted.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::EmulatorConfig;

/// Content of one heartbeat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameContent {
    /// No payload: one marker packet, then one closing packet
    Empty,
    /// Payload of this many bytes, split over as many packets as needed
    Payload(u32),
}

/// Decides the content of each new frame.
pub trait ContentSource: Send {
    fn next_frame(&mut self) -> FrameContent;
}

impl<F> ContentSource for F
where
    F: FnMut() -> FrameContent + Send,
{
    fn next_frame(&mut self) -> FrameContent {
        self()
    }
}

/// Random frame content: empty with probability `empty_ratio`, otherwise a payload
/// length uniform in `0..=max_payload`.
#[derive(Debug, Clone)]
pub struct RandomContent<R = StdRng> {
    rng: R,
    empty_ratio: f64,
    max_payload: u32,
}

impl RandomContent<StdRng> {
    /// Entropy-seeded content source for `config`.
    pub fn from_config(config: &EmulatorConfig) -> Self {
        Self::with_rng(StdRng::from_entropy(), config.empty_hb_ratio, config.payload_size)
    }

    /// Reproducible content source for `config`.
    pub fn seeded(config: &EmulatorConfig, seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), config.empty_hb_ratio, config.payload_size)
    }
}

impl<R: Rng> RandomContent<R> {
    pub fn with_rng(rng: R, empty_ratio: f64, max_payload: u32) -> Self {
        Self { rng, empty_ratio: empty_ratio.clamp(0.0, 1.0), max_payload }
    }
}

impl<R: Rng + Send> ContentSource for RandomContent<R> {
    fn next_frame(&mut self) -> FrameContent {
        if self.rng.gen_bool(self.empty_ratio) {
            FrameContent::Empty
        } else {
            FrameContent::Payload(self.rng.gen_range(0..=self.max_payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(empty_hb_ratio: f64, payload_size: u32) -> EmulatorConfig {
        EmulatorConfig { empty_hb_ratio, payload_size, ..Default::default() }
    }

    #[test]
    fn ratio_one_is_always_empty() {
        let mut content = RandomContent::seeded(&config(1.0, 1024), 1);
        assert!((0..1000).all(|_| content.next_frame() == FrameContent::Empty));
    }

    #[test]
    fn ratio_zero_draws_bounded_payloads() {
        let mut content = RandomContent::seeded(&config(0.0, 96), 2);
        for _ in 0..1000 {
            match content.next_frame() {
                FrameContent::Payload(len) => assert!(len <= 96),
                FrameContent::Empty => panic!("empty frame drawn with ratio 0"),
            }
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let cfg = config(0.3, 4096);
        let mut a = RandomContent::seeded(&cfg, 42);
        let mut b = RandomContent::seeded(&cfg, 42);
        for _ in 0..100 {
            assert_eq!(a.next_frame(), b.next_frame());
        }
    }

    #[test]
    fn empty_ratio_is_roughly_honoured() {
        let mut content = RandomContent::seeded(&config(0.25, 100), 7);
        let empty = (0..10_000).filter(|_| content.next_frame() == FrameContent::Empty).count();
        assert!((2_000..3_000).contains(&empty), "{empty} empty frames out of 10000");
    }

    #[test]
    fn closures_are_content_sources() {
        let mut lengths = [70u32, 0].into_iter().cycle();
        let mut scripted = move || FrameContent::Payload(lengths.next().unwrap_or(0));
        assert_eq!(scripted.next_frame(), FrameContent::Payload(70));
        assert_eq!(scripted.next_frame(), FrameContent::Payload(0));
    }
}
