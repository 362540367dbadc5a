//! Per-link frame state

use tracing::debug;

use crate::content::FrameContent;

/// Progress of the current heartbeat frame on a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrameProgress {
    /// No frame open: the next packet starts a new one
    #[default]
    Idle,
    /// A frame is open with this many payload bytes still to write
    InProgress { bytes_remaining: u32 },
}

/// Frame state of one link. Touched only by the page filler for that link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkState {
    /// Index of the current packet within its frame
    pub pages_in_frame: u16,
    /// Whether the current frame was drawn empty
    pub empty_frame: bool,
    pub progress: FrameProgress,
}

impl LinkState {
    pub fn needs_new_frame(&self) -> bool {
        self.progress == FrameProgress::Idle
    }

    /// Open a frame with the drawn content.
    pub fn open_frame(&mut self, content: FrameContent) {
        self.pages_in_frame = 0;
        let (empty_frame, bytes_remaining) = match content {
            FrameContent::Empty => (true, 0),
            FrameContent::Payload(len) => (false, len),
        };
        self.empty_frame = empty_frame;
        self.progress = FrameProgress::InProgress { bytes_remaining };
    }

    /// Move on to the next packet of the open frame.
    ///
    /// The counter is 16 bits wide like the header field; configuration validation keeps
    /// frames below that limit.
    pub fn continue_frame(&mut self) {
        if self.pages_in_frame == u16::MAX {
            debug!("Pages counter wrapped after {} packets in one frame", u16::MAX as u32 + 1);
        }
        self.pages_in_frame = self.pages_in_frame.wrapping_add(1);
    }

    /// Account for the packet about to be written.
    ///
    /// Takes up to `capacity` payload bytes from the open frame and returns
    /// `(payload_bytes, stop_bit)`. The frame is closed when the stop bit is set.
    pub fn take_packet(&mut self, capacity: u32) -> (u32, bool) {
        let remaining = match self.progress {
            FrameProgress::InProgress { bytes_remaining } => bytes_remaining,
            FrameProgress::Idle => 0,
        };

        if remaining > 0 {
            let chunk = remaining.min(capacity);
            let left = remaining - chunk;
            if left == 0 {
                self.progress = FrameProgress::Idle;
                (chunk, true)
            } else {
                self.progress = FrameProgress::InProgress { bytes_remaining: left };
                (chunk, false)
            }
        } else if self.empty_frame && self.pages_in_frame == 0 {
            // empty frame marker, closed by the next packet
            (0, false)
        } else {
            self.progress = FrameProgress::Idle;
            (0, true)
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
