//! Packet frame wire format.
//!
//! Ground truth: `packet_header_type`/`packet_content_type`/
//! `packet_frame_type` in `Transceiver.h`, and `HandlePayload`'s read
//! sequence: length byte first, then exactly `total_size` further
//! bytes. Those further bytes are `target`, `source`, a one-byte RSSI
//! placeholder (written as zero, overwritten locally with the real
//! reading on receipt — it occupies a wire position but carries no
//! transmitted information, matching spec.md §3's "RSSI...meaningful
//! only on received frames"), then the content block packed as
//! `timestamp(6) + type(1) + size(1) + payload(size)` — the byte-order
//! resolution recorded in SPEC_FULL.md §9 Open Questions.

pub const MAX_PAYLOAD: usize = 20;
/// Bytes following the length byte that aren't part of content:
/// target, source, RSSI placeholder.
const HEADER_TAIL_LEN: u8 = 3;
const CONTENT_FIXED_LEN: u8 = 8;
/// Largest possible encoded frame: the length byte itself, plus
/// `total_size`'s own worth of bytes at maximum payload.
pub const MAX_FRAME_WIRE_LEN: usize =
    1 + HEADER_TAIL_LEN as usize + CONTENT_FIXED_LEN as usize + MAX_PAYLOAD;

/// Closed application-layer packet kind set (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum PacketKind {
    Ack = 0,
    Data = 1,
    Reading = 2,
    Time = 3,
}

impl PacketKind {
    pub fn from_u8(v: u8) -> Option<PacketKind> {
        match v {
            0 => Some(PacketKind::Ack),
            1 => Some(PacketKind::Data),
            2 => Some(PacketKind::Reading),
            3 => Some(PacketKind::Time),
            _ => None,
        }
    }
}

/// Header fields, four as named in spec.md §3; `rssi` has no
/// transmitted bearing (see module docs) and is filled in by the
/// receiver after read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct Header {
    pub total_size: u8,
    pub target: u8,
    pub source: u8,
    pub rssi: i8,
}

/// Timestamped application content, `size` bytes of `payload` valid.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Content {
    pub timestamp: [u8; 6],
    pub kind: u8,
    pub size: u8,
    pub payload: [u8; MAX_PAYLOAD],
}

impl Content {
    pub fn new(timestamp: [u8; 6], kind: PacketKind, payload: &[u8]) -> Option<Content> {
        if payload.len() > MAX_PAYLOAD {
            return None;
        }
        let mut buf = [0u8; MAX_PAYLOAD];
        buf[..payload.len()].copy_from_slice(payload);
        Some(Content {
            timestamp,
            kind: kind as u8,
            size: payload.len() as u8,
            payload: buf,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.size as usize]
    }
}

#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Frame {
    pub header: Header,
    pub content: Content,
}

impl Frame {
    /// Builds an outbound frame addressed to `target`, stamping
    /// `source` and computing `total_size`. `rssi` is zero on a frame
    /// built for transmission, matching `Transceiver_SendPacket`.
    pub fn outbound(target: u8, source: u8, content: Content) -> Frame {
        let total_size = HEADER_TAIL_LEN + CONTENT_FIXED_LEN + content.size;
        Frame {
            header: Header {
                total_size,
                target,
                source,
                rssi: 0,
            },
            content,
        }
    }

    /// Encodes the full wire sequence, length byte included.
    pub fn to_bytes(&self) -> heapless::Vec<u8, MAX_FRAME_WIRE_LEN> {
        let mut out = heapless::Vec::new();
        let _ = out.push(self.header.total_size);
        let _ = out.push(self.header.target);
        let _ = out.push(self.header.source);
        let _ = out.push(self.header.rssi as u8);
        let _ = out.extend_from_slice(&self.content.timestamp);
        let _ = out.push(self.content.kind);
        let _ = out.push(self.content.size);
        let _ = out.extend_from_slice(self.content.payload());
        out
    }

    /// Parses a frame from the bytes read after the length byte
    /// (exactly `total_size` of them, per `HandlePayload`). `rssi` is
    /// the value the device reports at read time, not the placeholder
    /// byte on the wire.
    pub fn from_wire(total_size: u8, rssi: i8, bytes: &[u8]) -> Option<Frame> {
        if bytes.len() < HEADER_TAIL_LEN as usize + CONTENT_FIXED_LEN as usize {
            return None;
        }
        let target = bytes[0];
        let source = bytes[1];
        // bytes[2] is the RSSI placeholder; ignored.
        let mut timestamp = [0u8; 6];
        timestamp.copy_from_slice(&bytes[3..9]);
        let kind = bytes[9];
        let size = bytes[10];
        let payload_start = 11;
        let payload_end = payload_start + size as usize;
        if size as usize > MAX_PAYLOAD || payload_end > bytes.len() {
            return None;
        }
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..size as usize].copy_from_slice(&bytes[payload_start..payload_end]);
        Some(Frame {
            header: Header {
                total_size,
                target,
                source,
                rssi,
            },
            content: Content {
                timestamp,
                kind,
                size,
                payload,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_total_size_matches_formula() {
        let content = Content::new([24, 1, 2, 3, 4, 5], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        let frame = Frame::outbound(0xAA, 0xA0, content);
        assert_eq!(frame.header.total_size, 3 + 8 + 2);
    }

    #[test]
    fn total_size_equals_bytes_following_the_length_byte() {
        let content = Content::new([24, 1, 2, 3, 4, 5], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        let frame = Frame::outbound(0xAA, 0xA0, content);
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len() - 1, frame.header.total_size as usize);
    }

    #[test]
    fn round_trips_through_wire_bytes() {
        let content = Content::new([24, 1, 2, 3, 4, 5], PacketKind::Reading, &[0xFA, 0x00, 0xE0, 0x01]).unwrap();
        let frame = Frame::outbound(0xAA, 0xA0, content);
        let bytes = frame.to_bytes();

        // Device FIFO read convention: length byte consumed separately,
        // the rest handed to from_wire.
        let total_size = bytes[0];
        let rest = &bytes[1..];
        let parsed = Frame::from_wire(total_size, -42, rest).unwrap();

        assert_eq!(parsed.header.target, 0xAA);
        assert_eq!(parsed.header.source, 0xA0);
        assert_eq!(parsed.header.rssi, -42);
        assert_eq!(parsed.content.payload(), &[0xFA, 0x00, 0xE0, 0x01]);
        assert_eq!(parsed.content.kind, PacketKind::Reading as u8);
    }

    #[test]
    fn payload_over_capacity_is_rejected() {
        let oversize = [0u8; MAX_PAYLOAD + 1];
        assert!(Content::new([0; 6], PacketKind::Data, &oversize).is_none());
    }
}
