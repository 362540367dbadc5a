//! Page filling
//!
//! Turns "time has advanced" into packets. For one link and one empty page, packets of
//! `packet_size` bytes are written back to back while a whole packet still fits:
//!
//! 1. A link with no open frame starts one. The time cursor moves forward by `bc_step`
//!    bunch crossings and the frame content is drawn. If that move enters a new
//!    timeframe and the page already holds packets, filling stops and the frame starts
//!    in the next page instead. The first packet of a page may take the new timeframe.
//! 2. Otherwise the open frame continues and its pages counter increments.
//! 3. The header is written, followed by up to `packet_size - header_size` payload
//!    bytes. The packet that writes the last payload byte carries the stop bit. An empty
//!    frame is one header-only marker packet without the stop bit, then one header-only
//!    packet with it.
//!
//! Payload bytes hold the low byte of their offset within the frame. Padding after a
//! packet's payload and after the last packet is zeroed.

use tracing::debug;

use crate::content::{ContentSource, FrameContent};
use crate::link::LinkState;
use crate::page::Page;
use crate::rdh::{HeaderLayout, PacketFields};
use crate::timing::LhcTime;

/// Fixed per-equipment inputs of the filler.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FillParams {
    pub fee_id: u16,
    pub hb_period: u32,
    pub tf_period: u32,
    pub packet_size: usize,
    pub bc_step: u32,
}

/// What one page fill did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FillReport {
    /// Time cursor after the last frame started in this page
    pub end: LhcTime,
    pub timeframe_id: u64,
    pub packets: u64,
    pub frames: u64,
    pub empty_frames: u64,
    pub payload_bytes: u64,
    /// Filling stopped on a timeframe boundary
    pub split: bool,
}

pub(crate) fn fill_page<H: HeaderLayout>(
    page: &mut Page,
    link_id: u8,
    state: &mut LinkState,
    start: LhcTime,
    params: &FillParams,
    content: &mut dyn ContentSource,
) -> FillReport {
    let packet_size = params.packet_size;
    let payload_capacity = (packet_size - H::SIZE) as u32;
    let capacity = page.capacity();
    let buf = page.buffer_mut();

    let mut report = FillReport {
        end: start,
        timeframe_id: start.timeframe_id(params.tf_period),
        ..FillReport::default()
    };
    let mut offset = 0;

    while offset + packet_size <= capacity {
        if state.needs_new_frame() {
            let (next, crossed_orbit) = report.end.advance(params.bc_step);
            if crossed_orbit {
                let next_timeframe = next.timeframe_id(params.tf_period);
                if next_timeframe != report.timeframe_id {
                    if offset > 0 {
                        debug!(
                            "Link {}: timeframe {} -> {} at {}, closing page after {} packets",
                            link_id, report.timeframe_id, next_timeframe, next, report.packets
                        );
                        report.split = true;
                        break;
                    }
                    report.timeframe_id = next_timeframe;
                }
            }
            report.end = next;

            let drawn = content.next_frame();
            state.open_frame(drawn);
            report.frames += 1;
            if drawn == FrameContent::Empty {
                report.empty_frames += 1;
            }
        } else {
            state.continue_frame();
        }

        let (payload_len, stop_bit) = state.take_packet(payload_capacity);
        let payload_len = payload_len as usize;

        let fields = PacketFields {
            trigger_orbit: report.end.orbit,
            trigger_bc: report.end.bc as u16,
            heartbeat_orbit: report.end.heartbeat_orbit(params.hb_period),
            fee_id: params.fee_id,
            link_id,
            offset_next_packet: packet_size as u16,
            memory_size: (H::SIZE + payload_len) as u16,
            pages_counter: state.pages_in_frame,
            stop_bit,
        };

        let packet = &mut buf[offset..offset + packet_size];
        H::encode(&fields, packet);
        let (payload, padding) = packet[H::SIZE..].split_at_mut(payload_len);
        let frame_offset = state.pages_in_frame as usize * payload_capacity as usize;
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte = (frame_offset + i) as u8;
        }
        padding.fill(0);

        report.packets += 1;
        report.payload_bytes += payload_len as u64;
        offset += packet_size;
    }

    buf[offset..].fill(0);
    page.set_metadata(offset, report.timeframe_id, link_id);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Packet;
    use crate::rdh::RdhV4;
    use crate::test_utils::{CompactHeader, ScriptedContent, decode_all};
    use crate::timing::LHC_BUNCHES;

    fn params(packet_size: usize, bc_step: u32, tf_period: u32) -> FillParams {
        FillParams { fee_id: 0x502A, hb_period: 1, tf_period, packet_size, bc_step }
    }

    #[test]
    fn payload_of_70_splits_into_32_32_6() {
        let mut page = Page::new(64 * 4);
        let mut state = LinkState::default();
        let mut content = ScriptedContent::new([FrameContent::Payload(70), FrameContent::Empty]);

        let report = fill_page::<CompactHeader>(
            &mut page,
            0,
            &mut state,
            LhcTime::ZERO,
            &params(64, 2, 256),
            &mut content,
        );

        let packets = decode_all::<CompactHeader>(&page);
        let chunks: Vec<_> = packets.iter().take(3).map(|p| p.payload.len()).collect();
        assert_eq!(chunks, vec![32, 32, 6]);
        let stops: Vec<_> = packets.iter().take(3).map(|p| p.fields.stop_bit).collect();
        assert_eq!(stops, vec![false, false, true]);
        let counters: Vec<_> = packets.iter().take(3).map(|p| p.fields.pages_counter).collect();
        assert_eq!(counters, vec![0, 1, 2]);
        assert!(packets.iter().take(3).all(|p| p.fields.trigger_bc == 2));

        // fourth packet opens the next (empty) frame
        assert_eq!(packets[3].fields.trigger_bc, 4);
        assert!(!packets[3].fields.stop_bit);
        assert_eq!(report.frames, 2);
        assert_eq!(report.payload_bytes, 70);
        assert_eq!(page.used(), 256);
    }

    #[test]
    fn payload_bytes_carry_frame_offsets() {
        let mut page = Page::new(64 * 3);
        let mut state = LinkState::default();
        let mut content = ScriptedContent::new([FrameContent::Payload(70)]);

        fill_page::<CompactHeader>(
            &mut page,
            0,
            &mut state,
            LhcTime::ZERO,
            &params(64, 2, 256),
            &mut content,
        );

        let payload: Vec<u8> = decode_all::<CompactHeader>(&page)
            .iter()
            .flat_map(|p: &Packet<'_>| p.payload.iter().copied())
            .collect();
        assert_eq!(payload, (0..70u8).collect::<Vec<_>>());
        // padding after the 6-byte tail is zero
        assert!(page.data()[128 + 32 + 6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn frame_continues_into_next_page() {
        let mut state = LinkState::default();
        let mut content = ScriptedContent::new([FrameContent::Payload(100)]);
        let p = params(64, 2, 256);

        let mut first = Page::new(128);
        let report = fill_page::<CompactHeader>(&mut first, 0, &mut state, LhcTime::ZERO, &p, &mut content);
        assert_eq!(report.frames, 1);
        assert!(!state.needs_new_frame());

        let mut second = Page::new(128);
        let report = fill_page::<CompactHeader>(&mut second, 0, &mut state, report.end, &p, &mut content);
        assert_eq!(report.frames, 0);

        let packets = decode_all::<CompactHeader>(&second);
        assert_eq!(packets[0].fields.pages_counter, 2);
        assert_eq!(packets[0].payload.len(), 32);
        assert_eq!(packets[1].fields.pages_counter, 3);
        assert_eq!(packets[1].payload.len(), 4);
        assert!(packets[1].fields.stop_bit);
    }

    #[test]
    fn page_closes_at_timeframe_boundary() {
        // one orbit per frame, two orbits per timeframe
        let p = params(64, LHC_BUNCHES, 2);
        let mut state = LinkState::default();
        let mut content = ScriptedContent::repeat(FrameContent::Payload(0));
        let mut page = Page::new(64 * 8);

        let report = fill_page::<CompactHeader>(&mut page, 0, &mut state, LhcTime::ZERO, &p, &mut content);

        // orbit 1 is still timeframe 1, orbit 2 would be timeframe 2
        assert!(report.split);
        assert_eq!(report.packets, 1);
        assert_eq!(report.timeframe_id, 1);
        assert_eq!(report.end, LhcTime::new(1, 0));
        assert_eq!(page.used(), 64);
        assert!(state.needs_new_frame());
    }

    #[test]
    fn first_packet_adopts_new_timeframe() {
        let p = params(64, LHC_BUNCHES, 2);
        let mut state = LinkState::default();
        let mut content = ScriptedContent::repeat(FrameContent::Payload(0));
        let mut page = Page::new(64 * 8);

        let report =
            fill_page::<CompactHeader>(&mut page, 0, &mut state, LhcTime::new(1, 0), &p, &mut content);

        let packets = decode_all::<CompactHeader>(&page);
        assert_eq!(report.timeframe_id, 2);
        assert_eq!(page.timeframe_id(), 2);
        assert_eq!(packets[0].fields.trigger_orbit, 2);
        // orbit 3 stays in timeframe 2, orbit 4 would start timeframe 3
        assert_eq!(packets.len(), 2);
        assert!(report.split);
    }

    #[test]
    fn header_fields_use_rdh_v4() {
        let p = FillParams { fee_id: 7, hb_period: 4, tf_period: 256, packet_size: 8192, bc_step: 758 };
        let mut state = LinkState::default();
        let mut content = ScriptedContent::new([FrameContent::Payload(10_000)]);
        let mut page = Page::new(8192 * 2);

        fill_page::<RdhV4>(&mut page, 5, &mut state, LhcTime::new(9, 3000), &p, &mut content);

        let packets = decode_all::<RdhV4>(&page);
        let first = packets[0].fields;
        assert_eq!(first.trigger_orbit, 10);
        assert_eq!(first.trigger_bc, 194);
        assert_eq!(first.heartbeat_orbit, 2);
        assert_eq!(first.fee_id, 7);
        assert_eq!(first.link_id, 5);
        assert_eq!(first.offset_next_packet, 8192);
        assert_eq!(first.memory_size, 8192);
        assert_eq!(packets[1].fields.memory_size as usize, 64 + 10_000 - 8128);
        assert!(packets[1].fields.stop_bit);
        assert_eq!(page.link_id(), 5);
    }

    #[test]
    fn page_smaller_than_a_packet_stays_empty() {
        let mut state = LinkState::default();
        let mut content = ScriptedContent::repeat(FrameContent::Empty);
        let mut page = Page::new(63);

        let report =
            fill_page::<CompactHeader>(&mut page, 0, &mut state, LhcTime::ZERO, &params(64, 2, 256), &mut content);

        assert_eq!(report.packets, 0);
        assert_eq!(page.used(), 0);
        assert!(state.needs_new_frame());
    }
}
