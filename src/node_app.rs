//! Node application: the battery-powered unit's wake/measure/send/sleep
//! cycle.
//!
//! Ground truth: `node_firmware.c`'s `main` loop and `Sensor.c`'s
//! `Sensor_Update`/`SendCallback`. Driving the DHT22 sampling hardware
//! itself is out of this crate's core (board-specific, wired by the
//! `node` binary); this module owns the two sensor records, the battery
//! FSM, the send decision, and the sleep/wake bookkeeping.

use crate::comms::{Comms, LinkLayer};
use crate::error_log::ClockSource;
use crate::event::{Event, EventBus, EventKind};
use crate::power::Power;
use crate::radio::PacketKind;
use crate::sensor::Sensor;

/// Destination address for outbound `READING` packets.
pub const GATEWAY_ADDRESS: u8 = 0xAA;

/// Maximum time awake between sleeps, regardless of send activity.
pub const MAX_AWAKE_TIME_MS: u32 = 3000;

struct SleepState {
    last_sleep_time_ms: u32,
    sleep_now: bool,
}

/// Per-node application state: the two reported channels, the battery
/// state machine, and the awake/sleep tracking that used to live in
/// `node_firmware.c`'s file-local `sleep_status`.
pub struct NodeApp {
    pub temperature: Sensor,
    pub humidity: Sensor,
    pub power: Power,
    sleep: SleepState,
}

impl NodeApp {
    pub fn new(now_ms: u32) -> Self {
        Self {
            temperature: Sensor::new(0),
            humidity: Sensor::new(1),
            power: Power::new(),
            sleep: SleepState {
                last_sleep_time_ms: now_ms,
                sleep_now: false,
            },
        }
    }

    /// Record a completed sensor sample, widen the persisted extrema, and
    /// hand the reading to comms as a `READING` packet. Arms the sleep
    /// flag on a successful send — the Rust shape of the `RHT_SENT`
    /// listener in the original, since here the caller owning the state
    /// can just act on the `send` result directly instead of round
    /// tripping through the event bus.
    #[allow(clippy::too_many_arguments)]
    pub fn report_reading<L: LinkLayer, C: ClockSource>(
        &mut self,
        events: &EventBus,
        now_ms: u32,
        comms: &mut Comms,
        link: &mut L,
        clock: &mut C,
        temperature_x10: i16,
        humidity_x10: i16,
        battery_mv: Option<u16>,
        on_rtc_fail: impl FnMut(),
    ) -> bool {
        self.temperature.update(temperature_x10);
        self.humidity.update(humidity_x10);

        let mut payload: heapless::Vec<u8, 6> = heapless::Vec::new();
        let _ = payload.extend_from_slice(&temperature_x10.to_le_bytes());
        let _ = payload.extend_from_slice(&humidity_x10.to_le_bytes());
        if let Some(mv) = battery_mv {
            let _ = payload.extend_from_slice(&mv.to_le_bytes());
        }

        let sent = comms.send(
            link,
            clock,
            GATEWAY_ADDRESS,
            PacketKind::Reading,
            &payload,
            on_rtc_fail,
        );

        if sent {
            self.sleep.sleep_now = true;
            events.trigger(&Event::new(now_ms, EventKind::ReadingSent));
        }
        sent
    }

    /// True if the unit should enter sleep this iteration: either the
    /// send-completed flag is armed, or the awake time budget has been
    /// exceeded — but never while a charger holds the unit awake.
    pub fn is_time_for_sleep(&self, now_ms: u32, charger_connected: bool) -> bool {
        if charger_connected {
            return false;
        }
        self.sleep.sleep_now || now_ms.wrapping_sub(self.sleep.last_sleep_time_ms) > MAX_AWAKE_TIME_MS
    }

    /// Clears the awake-tracking state after the binary has returned from
    /// MCU sleep and cleared the RTC alarm.
    pub fn on_wake(&mut self, now_ms: u32) {
        self.sleep.last_sleep_time_ms = now_ms;
        self.sleep.sleep_now = false;
    }
}
