//! RAWDataHeader version 4
//!
//! Eight little-endian 64-bit words, 64 bytes in total:
//!
//! ```text
//! word0  version:8 headerSize:8 blockLength:16 feeId:16 priority:8 zero:8
//! word1  offsetToNext:16 memorySize:16 linkID:8 packetCounter:8 cruID:12 dataWrapperID:4
//! word2  triggerOrbit:32 heartbeatOrbit:32
//! word3  reserved
//! word4  triggerBC:12 zero:4 heartbeatBC:12 zero:4 triggerType:32
//! word5  reserved
//! word6  detectorField:16 par:16 stopBit:8 pagesCounter:16 zero:8
//! word7  reserved
//! ```
//!
//! Fields the emulator does not drive keep the v4 defaults: `blockLength = 0xFFFF`
//! and zero everywhere else.

use super::{HeaderLayout, PacketFields};
use crate::{EmulatorError, Result};

const RDH_V4_SIZE: usize = 64;
const RDH_V4_VERSION: u64 = 4;
const RDH_V4_DEFAULT_BLOCK_LENGTH: u64 = 0xFFFF;

/// The 64-byte RDH v4 layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RdhV4;

impl RdhV4 {
    /// Default value of word 0 with a zero FEE id.
    pub const DEFAULT_WORD0: u64 =
        RDH_V4_VERSION | (RDH_V4_SIZE as u64) << 8 | RDH_V4_DEFAULT_BLOCK_LENGTH << 16;
}

impl HeaderLayout for RdhV4 {
    const SIZE: usize = RDH_V4_SIZE;

    fn encode(fields: &PacketFields, out: &mut [u8]) {
        let out = &mut out[..RDH_V4_SIZE];

        let word0 = Self::DEFAULT_WORD0 | (fields.fee_id as u64) << 32;
        let word1 = fields.offset_next_packet as u64
            | (fields.memory_size as u64) << 16
            | (fields.link_id as u64) << 32;
        let word2 = fields.trigger_orbit as u64 | (fields.heartbeat_orbit as u64) << 32;
        let word4 = fields.trigger_bc as u64 & 0xFFF;
        let word6 = (fields.stop_bit as u64) << 32 | (fields.pages_counter as u64) << 40;

        let words = [word0, word1, word2, 0, word4, 0, word6, 0];
        for (chunk, word) in out.chunks_exact_mut(8).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<PacketFields> {
        let word0 = read_word(bytes, 0)?;
        let version = word0 & 0xFF;
        if version != RDH_V4_VERSION {
            return Err(EmulatorError::header(0, format!("expected RDH version 4, found {version}")));
        }
        let header_size = (word0 >> 8) & 0xFF;
        if header_size != RDH_V4_SIZE as u64 {
            return Err(EmulatorError::header(
                1,
                format!("expected header size {RDH_V4_SIZE}, found {header_size}"),
            ));
        }

        let word1 = read_word(bytes, 1)?;
        let word2 = read_word(bytes, 2)?;
        let word4 = read_word(bytes, 4)?;
        let word6 = read_word(bytes, 6)?;

        Ok(PacketFields {
            trigger_orbit: word2 as u32,
            trigger_bc: (word4 & 0xFFF) as u16,
            heartbeat_orbit: (word2 >> 32) as u32,
            fee_id: (word0 >> 32) as u16,
            link_id: (word1 >> 32) as u8,
            offset_next_packet: word1 as u16,
            memory_size: (word1 >> 16) as u16,
            pages_counter: (word6 >> 40) as u16,
            stop_bit: (word6 >> 32) & 0xFF != 0,
        })
    }
}

fn read_word(bytes: &[u8], index: usize) -> Result<u64> {
    let offset = index * 8;
    match bytes.get(offset..offset + 8) {
        Some(chunk) => {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            Ok(u64::from_le_bytes(word))
        }
        None => Err(EmulatorError::header(
            offset,
            format!("insufficient data for RDH word {index} (have {} bytes)", bytes.len()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_fields() -> PacketFields {
        PacketFields {
            trigger_orbit: 0x0b7d_d575,
            trigger_bc: 3563,
            heartbeat_orbit: 0x0b7d_d575,
            fee_id: 0x502A,
            link_id: 11,
            offset_next_packet: 8192,
            memory_size: 6000,
            pages_counter: 3,
            stop_bit: true,
        }
    }

    proptest! {
        #[test]
        fn prop_encoded_fields_decode_unchanged(
            trigger_orbit in any::<u32>(),
            trigger_bc in 0u16..3564u16,
            heartbeat_orbit in any::<u32>(),
            fee_id in any::<u16>(),
            link_id in any::<u8>(),
            offset_next_packet in any::<u16>(),
            memory_size in any::<u16>(),
            pages_counter in any::<u16>(),
            stop_bit in any::<bool>()
        ) {
            let fields = PacketFields {
                trigger_orbit, trigger_bc, heartbeat_orbit, fee_id, link_id,
                offset_next_packet, memory_size, pages_counter, stop_bit,
            };
            let mut bytes = [0xAAu8; RDH_V4_SIZE];
            RdhV4::encode(&fields, &mut bytes);
            prop_assert_eq!(RdhV4::decode(&bytes).unwrap(), fields);
        }
    }

    #[test]
    fn word_layout_matches_v4_definition() {
        let mut bytes = [0u8; RDH_V4_SIZE];
        RdhV4::encode(&sample_fields(), &mut bytes);

        // word0: version, header size, block length, FEE id
        assert_eq!(&bytes[0..8], &[0x04, 0x40, 0xFF, 0xFF, 0x2A, 0x50, 0x00, 0x00]);
        // word1: offsetToNext = 0x2000, memorySize = 0x1770, linkID = 11
        assert_eq!(&bytes[8..16], &[0x00, 0x20, 0x70, 0x17, 0x0B, 0x00, 0x00, 0x00]);
        // word2: trigger orbit then heartbeat orbit
        assert_eq!(&bytes[16..20], &0x0b7d_d575u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &0x0b7d_d575u32.to_le_bytes());
        // word4: trigger BC in the low 12 bits
        assert_eq!(&bytes[32..34], &3563u16.to_le_bytes());
        // word6: stop bit at byte 4, pages counter at bytes 5..7
        assert_eq!(bytes[52], 1);
        assert_eq!(&bytes[53..55], &3u16.to_le_bytes());
        // reserved words stay zero
        assert!(bytes[24..32].iter().all(|&b| b == 0));
        assert!(bytes[40..48].iter().all(|&b| b == 0));
        assert!(bytes[56..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn encode_overwrites_stale_bytes() {
        let mut bytes = [0xFFu8; RDH_V4_SIZE];
        RdhV4::encode(&PacketFields::default(), &mut bytes);
        assert_eq!(u64::from_le_bytes(bytes[0..8].try_into().unwrap()), RdhV4::DEFAULT_WORD0);
        assert!(bytes[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn decode_rejects_short_and_foreign_headers() {
        let mut bytes = [0u8; RDH_V4_SIZE];
        RdhV4::encode(&sample_fields(), &mut bytes);

        let short = RdhV4::decode(&bytes[..40]).unwrap_err();
        assert!(matches!(short, EmulatorError::Header { offset: 48, .. }));

        bytes[0] = 6;
        let foreign = RdhV4::decode(&bytes).unwrap_err();
        assert!(foreign.to_string().contains("version"));
    }
}
