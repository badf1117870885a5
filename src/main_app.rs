//! Main (hub) application: the static node table, `READING`/`TIME`
//! round trip, sensor-extrema persistence, and the stack watermark.
//!
//! Ground truth: `main_firmware.c`'s event loop, `Node.h`'s node record,
//! and `packethandler/PacketHandler.c`'s `PacketHandler_HandleReadingPacket`.
//! The view tree navigated by the rotary encoder (`guiRTC`/`guiSensor`/
//! `guiNodes` in the original) is out of this crate's core, per spec.

use crate::comms::{Comms, LinkLayer};
use crate::error_log::{ClockSource, Code, ErrorLog, ErrorLogStorage};
use crate::radio::{Frame, PacketKind};
use crate::sensor::{Sensor, PERSIST_SIZE};
use crate::time::DateTime;

/// Number of statically configured remote nodes (`module.nodes[3]` in
/// `main_firmware.c`).
pub const MAX_NODES: usize = 3;

/// First node address; node `i` is addressed `NODE_BASE_ADDRESS + i`,
/// matching `Node_Init(&module.nodes[i], i + 128)`.
pub const NODE_BASE_ADDRESS: u8 = 0x80;

/// Free-stack threshold, in bytes, below which [`StackWatermark`] logs
/// once (`LOW_STACK_LIMIT` in `main_firmware.c`).
pub const DEFAULT_STACK_WATERMARK: u32 = 100;

/// Per-node bookkeeping the hub keeps for one configured remote: last
/// activity, RSSI, battery, and the two reported channels.
pub struct NodeRecord {
    pub id: u8,
    pub last_active_ms: u32,
    pub connected: bool,
    pub rssi: i8,
    pub battery_mv: Option<u16>,
    pub temperature: Sensor,
    pub humidity: Sensor,
}

impl NodeRecord {
    fn new(id: u8) -> Self {
        Self {
            id,
            last_active_ms: 0,
            connected: false,
            rssi: 0,
            battery_mv: None,
            temperature: Sensor::new(0),
            humidity: Sensor::new(1),
        }
    }

    fn report_activity(&mut self, now_ms: u32) {
        self.last_active_ms = now_ms;
        self.connected = true;
    }

    /// A node counts as active if it has been heard from within the last
    /// two report intervals (`Node_IsActive`'s doc comment); the interval
    /// itself is network-wide configuration, not something this record
    /// stores per node.
    pub fn is_active(&self, now_ms: u32, report_interval_ms: u32) -> bool {
        self.connected
            && now_ms.wrapping_sub(self.last_active_ms) <= report_interval_ms.saturating_mul(2)
    }

    /// Parses a `READING` payload — temperature, humidity, optional
    /// battery mV, all little-endian — and widens the per-channel
    /// extrema. Returns `false` on a payload too short to contain at
    /// least the two required channels.
    fn apply_reading(&mut self, payload: &[u8]) -> bool {
        if payload.len() < 4 {
            return false;
        }
        self.temperature
            .update(i16::from_le_bytes([payload[0], payload[1]]));
        self.humidity
            .update(i16::from_le_bytes([payload[2], payload[3]]));
        if payload.len() >= 6 {
            self.battery_mv = Some(u16::from_le_bytes([payload[4], payload[5]]));
        }
        true
    }
}

/// The statically configured remote nodes, addressed `NODE_BASE_ADDRESS`
/// through `NODE_BASE_ADDRESS + MAX_NODES - 1`. There is no
/// auto-registration: a source address outside this range is a warning,
/// never a new entry (`PacketHandler_HandleReadingPacket`'s `else`
/// branch, TODO comment included in the original).
pub struct NodeTable {
    nodes: [NodeRecord; MAX_NODES],
}

impl NodeTable {
    pub fn new() -> Self {
        Self {
            nodes: core::array::from_fn(|i| NodeRecord::new(NODE_BASE_ADDRESS + i as u8)),
        }
    }

    pub fn find_mut(&mut self, id: u8) -> Option<&mut NodeRecord> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NodeRecord> {
        self.nodes.iter_mut()
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs `LOW_STACK` exactly once per boot the first time free stack
/// drops below the configured watermark. Ground truth:
/// `CheckMemoryUsage`'s `memory_low_flag` static; `logged` is the Rust
/// shape of that flag.
pub struct StackWatermark {
    watermark: u32,
    logged: bool,
}

impl StackWatermark {
    pub fn new(watermark: u32) -> Self {
        Self {
            watermark,
            logged: false,
        }
    }

    /// Returns `true` the first (and only the first) time `free_bytes`
    /// drops below the watermark.
    pub fn check(&mut self, free_bytes: u32) -> bool {
        if !self.logged && free_bytes < self.watermark {
            self.logged = true;
            true
        } else {
            false
        }
    }
}

impl Default for StackWatermark {
    fn default() -> Self {
        Self::new(DEFAULT_STACK_WATERMARK)
    }
}

pub struct MainApp {
    pub nodes: NodeTable,
    pub comms: Comms,
    stack_watermark: StackWatermark,
}

impl MainApp {
    pub fn new() -> Self {
        Self {
            nodes: NodeTable::new(),
            comms: Comms::new(),
            stack_watermark: StackWatermark::default(),
        }
    }

    /// Pops one inbound frame (if any). `READING` is routed to the node
    /// table and answered with a `TIME` reply; every other kind goes
    /// through `Comms`'s own dispatch so any installed `ACK`/`DATA`
    /// handler still runs and the statistics stay in one place.
    pub fn service<L: LinkLayer, C: ClockSource>(
        &mut self,
        link: &mut L,
        clock: &mut C,
        now_ms: u32,
    ) {
        let frame = match link.receive() {
            Some(frame) => frame,
            None => return,
        };

        let is_reading = frame.content.kind == PacketKind::Reading as u8;
        self.comms.dispatch(&frame);
        if is_reading {
            self.handle_reading(&frame, link, clock, now_ms);
        }
    }

    fn handle_reading<L: LinkLayer, C: ClockSource>(
        &mut self,
        frame: &Frame,
        link: &mut L,
        clock: &mut C,
        now_ms: u32,
    ) {
        let source = frame.header.source;
        match self.nodes.find_mut(source) {
            Some(node) => {
                node.report_activity(now_ms);
                node.rssi = frame.header.rssi;
                node.apply_reading(frame.content.payload());

                let timestamp = clock.now().unwrap_or(DateTime::INVALID).to_bytes();
                self.comms
                    .send(link, clock, source, PacketKind::Time, &timestamp, || {});
            }
            None => {
                defmt::warn!("reading from unknown node: {:x}", source);
            }
        }
    }

    /// Checks the free-stack estimate and logs `LOW_STACK` through
    /// `error_log` the first time it drops below the watermark.
    pub fn check_stack<S: ErrorLogStorage>(
        &mut self,
        error_log: &mut ErrorLog<S>,
        clock: &mut dyn ClockSource,
        free_bytes: u32,
    ) {
        if self.stack_watermark.check(free_bytes) {
            let information = free_bytes.min(u8::MAX as u32) as u8;
            error_log.log(clock, Code::LowStack, information);
            defmt::warn!("low stack: {} bytes free", free_bytes);
        }
    }

    /// Packs every node's temperature/humidity extrema, in node-table
    /// order, for the binary to write into the RTC's battery-backed SRAM
    /// before a cold boot would otherwise lose the running max/min.
    pub fn persist_extrema(&self, out: &mut [[u8; PERSIST_SIZE]; MAX_NODES * 2]) {
        for (i, node) in self.nodes.iter().enumerate() {
            out[i * 2] = node.temperature.persist();
            out[i * 2 + 1] = node.humidity.persist();
        }
    }

    /// Adopts CRC-valid extrema read back from SRAM at boot; a node's
    /// channel with a bad CRC keeps its freshly initialized bounds
    /// (`Sensor::adopt`'s contract).
    pub fn adopt_extrema(&mut self, bytes: &[[u8; PERSIST_SIZE]; MAX_NODES * 2]) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.temperature.adopt(bytes[i * 2]);
            node.humidity.adopt(bytes[i * 2 + 1]);
        }
    }

    /// Adopts extrema from an [`ExtremaStorage`] at boot, then packs and
    /// writes the current extrema back to it. The binary calls this once
    /// at startup (restore) and again on an interval (persist), the same
    /// two-call shape `ErrorLog`/`ConfigStore` use around their own
    /// storage traits.
    pub fn restore_extrema<S: ExtremaStorage>(&mut self, storage: &S) {
        self.adopt_extrema(&storage.read());
    }

    pub fn save_extrema<S: ExtremaStorage>(&self, storage: &mut S) {
        let mut bytes = [[0u8; PERSIST_SIZE]; MAX_NODES * 2];
        self.persist_extrema(&mut bytes);
        storage.write(&bytes);
    }
}

/// Non-volatile backing store for the per-node sensor extrema, abstracted
/// the same way [`ErrorLogStorage`] is so the core stays testable on host.
/// Binaries implement this against the MCU's battery-backed SRAM; host
/// tests and any board revision without that SRAM wired up yet use
/// [`RamExtremaStorage`].
pub trait ExtremaStorage {
    fn read(&self) -> [[u8; PERSIST_SIZE]; MAX_NODES * 2];
    fn write(&mut self, bytes: &[[u8; PERSIST_SIZE]; MAX_NODES * 2]);
}

/// In-memory [`ExtremaStorage`]. Does not survive a real power-on reset —
/// no battery-backed SRAM driver is wired up on this board revision, the
/// same gap `bin/node.rs`'s `NodeClock` documents for the RTC.
pub struct RamExtremaStorage {
    bytes: [[u8; PERSIST_SIZE]; MAX_NODES * 2],
}

impl RamExtremaStorage {
    pub const fn new() -> Self {
        Self {
            bytes: [[0u8; PERSIST_SIZE]; MAX_NODES * 2],
        }
    }
}

impl Default for RamExtremaStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtremaStorage for RamExtremaStorage {
    fn read(&self) -> [[u8; PERSIST_SIZE]; MAX_NODES * 2] {
        self.bytes
    }

    fn write(&mut self, bytes: &[[u8; PERSIST_SIZE]; MAX_NODES * 2]) {
        self.bytes = *bytes;
    }
}

impl Default for MainApp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::Content;

    struct FixedClock(Option<DateTime>);
    impl ClockSource for FixedClock {
        fn now(&mut self) -> Option<DateTime> {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeLink {
        sent: heapless::Vec<(u8, Content), 4>,
        inbound: heapless::Vec<Frame, 4>,
    }
    impl LinkLayer for FakeLink {
        fn send(&mut self, target: u8, content: Content) -> bool {
            self.sent.push((target, content)).is_ok()
        }
        fn receive(&mut self) -> Option<Frame> {
            self.inbound.pop()
        }
    }

    fn reading_frame(source: u8, temperature: i16, humidity: i16) -> Frame {
        let mut payload = heapless::Vec::<u8, 4>::new();
        payload.extend_from_slice(&temperature.to_le_bytes()).unwrap();
        payload.extend_from_slice(&humidity.to_le_bytes()).unwrap();
        let content = Content::new([0; 6], PacketKind::Reading, &payload).unwrap();
        let mut frame = Frame::outbound(0xAA, source, content);
        frame.header.rssi = -55;
        frame
    }

    #[test]
    fn reading_from_known_node_updates_record_and_replies_with_time() {
        let mut app = MainApp::new();
        let mut link = FakeLink::default();
        let mut clock = FixedClock(Some(DateTime {
            year: 24,
            month: 1,
            day: 2,
            hour: 3,
            minute: 4,
            second: 5,
        }));

        link.inbound.push(reading_frame(NODE_BASE_ADDRESS, 250, 480)).unwrap();
        app.service(&mut link, &mut clock, 1_000);

        let node = app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap();
        assert!(node.connected);
        assert_eq!(node.rssi, -55);
        assert_eq!(node.temperature.value, 250);
        assert_eq!(node.humidity.value, 480);

        assert_eq!(link.sent.len(), 1);
        assert_eq!(link.sent[0].0, NODE_BASE_ADDRESS);
        assert_eq!(link.sent[0].1.kind, PacketKind::Time as u8);
    }

    #[test]
    fn reading_from_unknown_source_is_ignored() {
        let mut app = MainApp::new();
        let mut link = FakeLink::default();
        let mut clock = FixedClock(Some(DateTime::INVALID));

        link.inbound.push(reading_frame(0x42, 1, 2)).unwrap();
        app.service(&mut link, &mut clock, 0);

        assert!(link.sent.is_empty());
        assert_eq!(app.comms.statistics().received, 1);
    }

    #[test]
    fn node_becomes_inactive_after_two_missed_intervals() {
        let mut app = MainApp::new();
        let mut link = FakeLink::default();
        let mut clock = FixedClock(Some(DateTime::INVALID));
        link.inbound.push(reading_frame(NODE_BASE_ADDRESS, 1, 2)).unwrap();
        app.service(&mut link, &mut clock, 1_000);

        let node = app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap();
        assert!(node.is_active(60_000, 60_000));
        assert!(!node.is_active(130_000, 60_000));
    }

    #[test]
    fn stack_watermark_logs_exactly_once() {
        let mut error_log = ErrorLog::init(crate::error_log::RamStorage::new());
        let mut clock = FixedClock(Some(DateTime::INVALID));
        let mut app = MainApp::new();

        app.check_stack(&mut error_log, &mut clock, 50);
        app.check_stack(&mut error_log, &mut clock, 50);
        app.check_stack(&mut error_log, &mut clock, 200);

        let logged: heapless::Vec<_, 4> = error_log.dump().collect();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].code, Code::LowStack as u8);
    }

    #[test]
    fn extrema_round_trip_through_persist_and_adopt() {
        let mut app = MainApp::new();
        app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap().temperature.update(300);
        app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap().temperature.update(-50);

        let mut buf = [[0u8; PERSIST_SIZE]; MAX_NODES * 2];
        app.persist_extrema(&mut buf);

        let mut reloaded = MainApp::new();
        reloaded.adopt_extrema(&buf);
        let node = reloaded.nodes.find_mut(NODE_BASE_ADDRESS).unwrap();
        assert_eq!(node.temperature.max, 300);
        assert_eq!(node.temperature.min, -50);
    }

    #[test]
    fn extrema_survive_a_restart_through_ram_storage() {
        let mut storage = RamExtremaStorage::new();

        let mut app = MainApp::new();
        app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap().humidity.update(900);
        app.nodes.find_mut(NODE_BASE_ADDRESS).unwrap().humidity.update(100);
        app.save_extrema(&mut storage);

        // A fresh app (as if the process restarted) restores from the
        // same storage instead of from its own just-initialized state.
        let mut restarted = MainApp::new();
        restarted.restore_extrema(&storage);
        let node = restarted.nodes.find_mut(NODE_BASE_ADDRESS).unwrap();
        assert_eq!(node.humidity.max, 900);
        assert_eq!(node.humidity.min, 100);
    }
}
