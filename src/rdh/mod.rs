//! Raw Data Header (RDH) layouts
//!
//! Every packet written by the emulator starts with a fixed-size RDH. The engine only
//! knows the named fields in [`PacketFields`]; where each field lives in the header and
//! how wide it is belongs to a [`HeaderLayout`].
//!
//! [`RdhV4`] is the 64-byte RAWDataHeader version 4 used by CRU firmware.

mod layout;
mod v4;

pub use layout::{HeaderLayout, PacketFields};
pub use v4::RdhV4;
