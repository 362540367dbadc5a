//! Header layout contract

use crate::Result;

/// Header fields the emulator populates for each packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFields {
    /// Orbit of the trigger that opened the current frame
    pub trigger_orbit: u32,
    /// Bunch crossing of the trigger, always below 3564
    pub trigger_bc: u16,
    /// Heartbeat frame index (orbit / heartbeat period)
    pub heartbeat_orbit: u32,
    /// Front-end electronics id
    pub fee_id: u16,
    /// Link id
    pub link_id: u8,
    /// Bytes from the start of this packet to the next one
    pub offset_next_packet: u16,
    /// Bytes actually used in this packet (header + payload)
    pub memory_size: u16,
    /// Index of this packet within its frame
    pub pages_counter: u16,
    /// Set on the last packet of a frame
    pub stop_bit: bool,
}

/// Binary layout of a packet header.
///
/// Implementations are fixed by the readout data format: the engine never reorders or
/// resizes fields.
pub trait HeaderLayout {
    /// Header size in bytes.
    const SIZE: usize;

    /// Write a complete header into `out[..Self::SIZE]`, including the layout's default
    /// values for fields not present in [`PacketFields`].
    ///
    /// # Panics
    ///
    /// Panics if `out` is shorter than [`Self::SIZE`].
    fn encode(fields: &PacketFields, out: &mut [u8]);

    /// Read the header at the start of `bytes`.
    fn decode(bytes: &[u8]) -> Result<PacketFields>;
}
