//! Application-layer packet dispatch on top of the radio link layer.
//!
//! Ground truth: `firmware/src/common/com/Com.c`. A fixed dispatch
//! table indexed by packet kind (closed enum, per Design Notes §9),
//! sent/received/lost/invalid counters, and the "zero the timestamp and
//! continue" RTC-failure policy from `Com_Send`.

use crate::error_log::ClockSource;
use crate::radio::{Content, Frame, PacketKind};

const NR_PACKET_KINDS: usize = 4;

/// Packet handlers are plain function pointers indexed by kind, matching
/// the original's `com_packet_handler_t` table rather than a boxed
/// closure map.
pub type Handler = fn(&Frame) -> bool;

/// Narrow view of [`crate::radio::TransceiverFsm`] that comms needs,
/// so this module isn't generic over the concrete [`crate::radio::RadioDevice`].
pub trait LinkLayer {
    fn send(&mut self, target: u8, content: Content) -> bool;
    fn receive(&mut self) -> Option<Frame>;
}

impl<D: crate::radio::RadioDevice> LinkLayer for crate::radio::TransceiverFsm<D> {
    fn send(&mut self, target: u8, content: Content) -> bool {
        crate::radio::TransceiverFsm::send(self, target, content)
    }
    fn receive(&mut self) -> Option<Frame> {
        crate::radio::TransceiverFsm::receive(self)
    }
}

#[derive(Debug, Clone, Copy, Default, defmt::Format)]
pub struct Statistics {
    pub sent: u32,
    pub received: u32,
    pub lost: u32,
    pub invalid: u32,
}

pub struct Comms {
    handlers: [Option<Handler>; NR_PACKET_KINDS],
    statistics: Statistics,
}

impl Comms {
    pub const fn new() -> Self {
        Self {
            handlers: [None; NR_PACKET_KINDS],
            statistics: Statistics {
                sent: 0,
                received: 0,
                lost: 0,
                invalid: 0,
            },
        }
    }

    pub fn set_handler(&mut self, kind: PacketKind, handler: Option<Handler>) {
        self.handlers[kind as usize] = handler;
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// Stamps `payload` with the current time and hands it to the link
    /// layer. On RTC read failure the timestamp is zeroed and `on_rtc_fail`
    /// is invoked so the caller can log `RTC_FAIL`; the send still
    /// proceeds, matching `Com_Send`'s "not critical" comment.
    pub fn send<L: LinkLayer, C: ClockSource>(
        &mut self,
        link: &mut L,
        clock: &mut C,
        target: u8,
        kind: PacketKind,
        payload: &[u8],
        mut on_rtc_fail: impl FnMut(),
    ) -> bool {
        let timestamp = match clock.now() {
            Some(t) => t.to_bytes(),
            None => {
                on_rtc_fail();
                [0u8; 6]
            }
        };

        let sent = match Content::new(timestamp, kind, payload) {
            Some(content) => link.send(target, content),
            None => false,
        };

        if sent {
            self.statistics.sent += 1;
        } else {
            self.statistics.lost += 1;
        }
        sent
    }

    /// Pops one inbound frame (if any) and dispatches it: an unknown
    /// kind is a warning plus invalid counter; a kind with no installed
    /// handler is informational plus received counter; otherwise the
    /// handler runs and received is counted regardless of its result,
    /// matching `HandlePacket`.
    pub fn update<L: LinkLayer>(&mut self, link: &mut L) {
        if let Some(frame) = link.receive() {
            self.dispatch(&frame);
        }
    }

    /// Runs the same kind-dispatch and counter bookkeeping as [`Comms::update`]
    /// against a frame the caller already popped off the link layer itself
    /// (e.g. because it needs to inspect the frame before deciding how to
    /// route it, as the main application does for `READING` packets).
    pub fn dispatch(&mut self, frame: &Frame) -> bool {
        match PacketKind::from_u8(frame.content.kind) {
            None => {
                self.statistics.invalid += 1;
                false
            }
            Some(kind) => match self.handlers[kind as usize] {
                None => {
                    self.statistics.received += 1;
                    false
                }
                Some(handler) => {
                    let status = handler(frame);
                    self.statistics.received += 1;
                    status
                }
            },
        }
    }
}

impl Default for Comms {
    fn default() -> Self {
        Self::new()
    }
}
