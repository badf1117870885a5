//! Link-layer state machine: two nested FSMs cooperatively stepped by
//! [`TransceiverFsm::service`], one call per event-loop iteration.
//!
//! Ground truth: `firmware/src/common/transceiver/Transceiver.c`. Outer
//! `Listening ↔ Sending`; inner `Init → Waiting → Init` while listening,
//! `Init → Writing → Transmitting → Init` while sending. Oversize-frame
//! handling follows `HandlePayload`'s `RFM_FIFO_SIZE - 1` check.

use crate::event::{Event, EventKind};
use crate::fifo::Fifo;
use crate::radio::frame::{Content, Frame};
use crate::radio::rfm69::{Mode, RadioDevice, RadioParams, RFM_FIFO_SIZE};

pub const TX_FIFO_CAPACITY: usize = 3;
pub const RX_FIFO_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outer {
    Listening,
    Sending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listening {
    Init,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sending {
    Init,
    Writing,
    Transmitting,
}

pub struct TransceiverFsm<D: RadioDevice> {
    device: D,
    own_address: u8,
    outer: Outer,
    listening: Listening,
    sending: Sending,
    tx: Fifo<Frame, TX_FIFO_CAPACITY>,
    rx: Fifo<Frame, RX_FIFO_CAPACITY>,
}

impl<D: RadioDevice> TransceiverFsm<D> {
    /// Programs the device per `params` and starts in the listening
    /// state, matching `Transceiver_Init`.
    pub fn init(mut device: D, params: &RadioParams) -> Self {
        device.configure(params);
        TransceiverFsm {
            device,
            own_address: params.address,
            outer: Outer::Listening,
            listening: Listening::Init,
            sending: Sending::Init,
            tx: Fifo::new(),
            rx: Fifo::new(),
        }
    }

    /// Advance whichever outer state is active by one step. Intended to
    /// be called every event-loop iteration.
    pub fn service(&mut self) {
        self.outer = match self.outer {
            Outer::Listening => self.step_listening(),
            Outer::Sending => self.step_sending(),
        };
    }

    /// Pop one inbound frame, if any.
    pub fn receive(&mut self) -> Option<Frame> {
        self.rx.pop()
    }

    /// Validate and enqueue an outbound frame addressed to `target`.
    /// Returns `false` (no mutation) if `target == 0`, the content
    /// exceeds the payload cap, or the outbound queue is full.
    pub fn send(&mut self, target: u8, content: Content) -> bool {
        if target == 0 || content.size as usize > crate::radio::frame::MAX_PAYLOAD {
            return false;
        }
        let frame = Frame::outbound(target, self.own_address, content);
        self.tx.push(frame)
    }

    /// `SLEEP`: drain in-flight work, then put the device to sleep.
    /// `WAKEUP`: bring the device back to standby. Any other event is
    /// ignored, matching `Transceiver_EventHandler`'s default case.
    pub fn handle_event(&mut self, event: &Event) {
        match event.kind {
            EventKind::Sleep => {
                while self.is_active() {
                    self.service();
                }
                self.device.set_mode(Mode::Sleep);
            }
            EventKind::Wakeup => {
                self.device.set_mode(Mode::Standby);
            }
            _ => {}
        }
    }

    /// True while the link layer still has in-flight work: sending,
    /// a payload sitting in the device FIFO, or a queued outbound
    /// frame. Mirrors `IsActive`.
    pub fn is_active(&mut self) -> bool {
        self.outer == Outer::Sending || self.device.is_payload_ready() || !self.tx.is_empty()
    }

    pub fn outbound_is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Escape hatch to the underlying device for binaries that need
    /// board capabilities the link layer itself has no use for (e.g.
    /// charger/battery sensing wired through the same [`crate::board::Board`]
    /// a [`crate::radio::BoardRfm69`] holds).
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    fn step_listening(&mut self) -> Outer {
        match self.listening {
            Listening::Init => {
                self.device.set_mode(Mode::Receiver);
                self.listening = Listening::Waiting;
                Outer::Listening
            }
            Listening::Waiting => {
                if self.device.is_payload_ready() {
                    self.device.set_mode(Mode::Standby);
                    self.handle_payload();
                    self.listening = Listening::Init;
                    Outer::Listening
                } else if self.device.is_rx_timeout() {
                    self.device.restart_rx();
                    Outer::Listening
                } else if !self.tx.is_empty() {
                    self.listening = Listening::Init;
                    Outer::Sending
                } else {
                    Outer::Listening
                }
            }
        }
    }

    fn step_sending(&mut self) -> Outer {
        match self.sending {
            Sending::Init => {
                self.device.set_mode(Mode::Standby);
                self.sending = Sending::Writing;
                Outer::Sending
            }
            Sending::Writing => {
                if self.device.is_mode_ready() {
                    if let Some(frame) = self.tx.pop() {
                        self.device.write_fifo(&frame.to_bytes());
                        self.device.set_mode(Mode::Transmitter);
                        self.sending = Sending::Transmitting;
                        Outer::Sending
                    } else {
                        self.sending = Sending::Init;
                        Outer::Listening
                    }
                } else {
                    Outer::Sending
                }
            }
            Sending::Transmitting => {
                if self.device.is_packet_sent() {
                    self.sending = Sending::Init;
                    Outer::Listening
                } else {
                    Outer::Sending
                }
            }
        }
    }

    /// Reads the length-prefixed payload out of the device FIFO. An
    /// oversize frame (more than the device FIFO minus the length byte)
    /// is dropped: clear the FIFO and do not push anything.
    fn handle_payload(&mut self) {
        let total_size = self.device.read_length_byte();
        if total_size as usize > RFM_FIFO_SIZE - 1 {
            self.device.clear_fifo();
            return;
        }
        let mut buf = [0u8; RFM_FIFO_SIZE - 1];
        let rest = &mut buf[..total_size as usize];
        self.device.read_fifo(rest);
        let rssi = self.device.rssi();
        if let Some(frame) = Frame::from_wire(total_size, rssi, rest) {
            let _ = self.rx.push(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::frame::PacketKind;

    #[derive(Default)]
    struct FakeDevice {
        mode: Option<Mode>,
        payload_ready: bool,
        rx_timeout: bool,
        mode_ready: bool,
        packet_sent: bool,
        fifo_in: heapless::Vec<u8, 128>,
        fifo_out: heapless::Vec<u8, 128>,
        configured: bool,
        cleared: bool,
    }

    impl RadioDevice for FakeDevice {
        fn configure(&mut self, _params: &RadioParams) {
            self.configured = true;
        }
        fn set_mode(&mut self, mode: Mode) {
            self.mode = Some(mode);
        }
        fn is_mode_ready(&mut self) -> bool {
            self.mode_ready
        }
        fn is_payload_ready(&mut self) -> bool {
            self.payload_ready
        }
        fn is_rx_timeout(&mut self) -> bool {
            self.rx_timeout
        }
        fn restart_rx(&mut self) {
            self.rx_timeout = false;
        }
        fn read_length_byte(&mut self) -> u8 {
            self.fifo_in.remove(0)
        }
        fn read_fifo(&mut self, buf: &mut [u8]) {
            for b in buf.iter_mut() {
                *b = self.fifo_in.remove(0);
            }
        }
        fn write_fifo(&mut self, data: &[u8]) {
            let _ = self.fifo_out.extend_from_slice(data);
        }
        fn clear_fifo(&mut self) {
            self.cleared = true;
            self.fifo_in.clear();
        }
        fn rssi(&mut self) -> i8 {
            -55
        }
        fn is_packet_sent(&mut self) -> bool {
            self.packet_sent
        }
    }

    fn params() -> RadioParams {
        RadioParams {
            network_id: [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF],
            address: 0xA0,
            broadcast_address: 0xFF,
            aes_key: [0u8; 17],
            high_power: false,
        }
    }

    #[test]
    fn init_configures_device_and_starts_listening() {
        let fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        assert!(fsm.device.configured);
        assert_eq!(fsm.outer, Outer::Listening);
    }

    #[test]
    fn send_queue_backpressure_matches_scenario_5() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        let content = Content::new([0; 6], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        assert!(fsm.send(0xAA, content));
        assert!(fsm.send(0xAA, content));
        assert!(fsm.send(0xAA, content));
        assert!(!fsm.send(0xAA, content));
    }

    #[test]
    fn send_rejects_zero_target() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        let content = Content::new([0; 6], PacketKind::Reading, &[]).unwrap();
        assert!(!fsm.send(0, content));
    }

    #[test]
    fn full_listening_to_sending_cycle_delivers_frame() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        let content = Content::new([24, 1, 2, 3, 4, 5], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        assert!(fsm.send(0xAA, content));

        // Listening Init -> Waiting.
        fsm.service();
        assert_eq!(fsm.listening, Listening::Waiting);

        // Waiting sees a queued frame and hands off to Sending.
        fsm.service();
        assert_eq!(fsm.outer, Outer::Sending);
        assert_eq!(fsm.sending, Sending::Init);

        // Sending Init -> Writing.
        fsm.service();
        assert_eq!(fsm.sending, Sending::Writing);

        // Writing, mode not ready yet: stalls.
        fsm.service();
        assert_eq!(fsm.sending, Sending::Writing);

        fsm.device.mode_ready = true;
        fsm.service();
        assert_eq!(fsm.sending, Sending::Transmitting);
        assert!(!fsm.device.fifo_out.is_empty());

        fsm.device.packet_sent = true;
        fsm.service();
        assert_eq!(fsm.outer, Outer::Listening);
        assert_eq!(fsm.sending, Sending::Init);
    }

    #[test]
    fn oversized_frame_is_dropped() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        fsm.listening = Listening::Waiting;
        fsm.device.payload_ready = true;
        let _ = fsm.device.fifo_in.push(200); // > RFM_FIFO_SIZE - 1
        fsm.service();
        assert!(fsm.device.cleared);
        assert!(fsm.receive().is_none());
    }

    #[test]
    fn well_formed_frame_is_delivered_to_inbound_queue() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        let content = Content::new([24, 1, 2, 3, 4, 5], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        let wire = Frame::outbound(0xA0, 0xAA, content).to_bytes();

        fsm.listening = Listening::Waiting;
        fsm.device.payload_ready = true;
        let _ = fsm.device.fifo_in.extend_from_slice(&wire);
        fsm.service();

        let received = fsm.receive().unwrap();
        assert_eq!(received.content.payload(), &[0xFA, 0x00]);
        assert_eq!(received.header.rssi, -55);
    }

    #[test]
    fn rx_timeout_restarts_receiver_without_leaving_listening() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        fsm.listening = Listening::Waiting;
        fsm.device.rx_timeout = true;
        fsm.service();
        assert_eq!(fsm.outer, Outer::Listening);
        assert!(!fsm.device.rx_timeout);
    }

    #[test]
    fn sleep_drain_invariant_matches_scenario_6() {
        let mut fsm = TransceiverFsm::init(FakeDevice::default(), &params());
        let content = Content::new([0; 6], PacketKind::Reading, &[0xFA, 0x00]).unwrap();
        assert!(fsm.send(0xAA, content));
        fsm.device.mode_ready = true;
        fsm.device.packet_sent = true;

        fsm.handle_event(&Event::new(0, EventKind::Sleep));

        assert!(fsm.outbound_is_empty());
        assert_eq!(fsm.device.mode, Some(Mode::Sleep));
    }
}
