//! Node battery state machine.
//!
//! Ground truth: `firmware/node_firmware/Power.c`. `NORMAL`/`LOW`/
//! `CRITICAL` track the battery voltage; `CHARGING`/`CONNECTED` branch
//! off whenever a charger is present, rejoining `NORMAL` once it's
//! unplugged. Every transition fires exactly the event the original
//! does, through the same [`EventBus`](crate::event::EventBus).

use crate::event::{Event, EventBus, EventKind};

pub const LOW_VOLTAGE_MV: u16 = 2200;
pub const CRITICAL_VOLTAGE_MV: u16 = 1900;

#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
enum State {
    Normal,
    Low,
    Critical,
    Charging,
    Connected,
}

/// Battery-voltage reading, absent when the ADC sample isn't ready yet
/// (`libPower_IsBatteryVoltageValid`).
pub type BatteryReading = Option<u16>;

pub struct Power {
    state: State,
}

impl Power {
    pub fn new() -> Self {
        Self {
            state: State::Normal,
        }
    }

    /// Advance the state machine from the latest charger/battery
    /// readings, firing the matching event on any transition.
    pub fn update(
        &mut self,
        now_ms: u32,
        events: &EventBus,
        is_charging: bool,
        charger_connected: bool,
        battery_mv: BatteryReading,
    ) {
        let fire = |events: &EventBus, kind: EventKind| events.trigger(&Event::new(now_ms, kind));

        self.state = match self.state {
            State::Normal => {
                if is_charging {
                    fire(events, EventKind::BatteryChargingStarted);
                    State::Charging
                } else if battery_mv.is_some_and(|mv| mv < LOW_VOLTAGE_MV) {
                    fire(events, EventKind::BatteryLow);
                    State::Low
                } else {
                    State::Normal
                }
            }
            State::Low => {
                if is_charging {
                    fire(events, EventKind::BatteryChargingStarted);
                    State::Charging
                } else if battery_mv.is_some_and(|mv| mv < CRITICAL_VOLTAGE_MV) {
                    fire(events, EventKind::BatteryCritical);
                    State::Critical
                } else {
                    State::Low
                }
            }
            State::Critical => {
                if is_charging {
                    fire(events, EventKind::BatteryChargingStarted);
                    State::Charging
                } else {
                    State::Critical
                }
            }
            State::Charging => {
                if !is_charging {
                    fire(events, EventKind::BatteryChargingStopped);
                    State::Connected
                } else {
                    State::Charging
                }
            }
            State::Connected => {
                if is_charging {
                    fire(events, EventKind::BatteryChargingStarted);
                    State::Charging
                } else if !charger_connected {
                    fire(events, EventKind::BatteryChargerDisconnected);
                    State::Normal
                } else {
                    State::Connected
                }
            }
        };
    }

    pub fn is_normal(&self) -> bool {
        self.state == State::Normal
    }

    pub fn is_charging(&self) -> bool {
        self.state == State::Charging
    }
}

impl Default for Power {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    static LAST_EVENT: Cell<Option<EventKind>> = Cell::new(None);

    fn record(e: &Event) {
        LAST_EVENT.set(Some(e.kind));
    }

    fn bus() -> EventBus {
        let mut bus = EventBus::new();
        bus.add_listener(EventKind::All, record);
        bus
    }

    #[test]
    fn normal_to_low_on_voltage_drop() {
        LAST_EVENT.set(None);
        let bus = bus();
        let mut power = Power::new();
        power.update(0, &bus, false, false, Some(2100));
        assert_eq!(LAST_EVENT.get(), Some(EventKind::BatteryLow));
        assert!(!power.is_normal());
    }

    #[test]
    fn low_to_critical_on_further_drop() {
        LAST_EVENT.set(None);
        let bus = bus();
        let mut power = Power::new();
        power.update(0, &bus, false, false, Some(2100));
        power.update(1, &bus, false, false, Some(1800));
        assert_eq!(LAST_EVENT.get(), Some(EventKind::BatteryCritical));
    }

    #[test]
    fn charging_preempts_any_battery_state() {
        LAST_EVENT.set(None);
        let bus = bus();
        let mut power = Power::new();
        power.update(0, &bus, false, false, Some(1800));
        power.update(1, &bus, true, true, None);
        assert_eq!(LAST_EVENT.get(), Some(EventKind::BatteryChargingStarted));
        assert!(power.is_charging());
    }

    #[test]
    fn full_charge_cycle_returns_to_normal() {
        LAST_EVENT.set(None);
        let bus = bus();
        let mut power = Power::new();
        power.update(0, &bus, true, true, None); // -> Charging
        power.update(1, &bus, false, true, None); // -> Connected
        assert_eq!(LAST_EVENT.get(), Some(EventKind::BatteryChargingStopped));
        power.update(2, &bus, false, false, None); // charger unplugged -> Normal
        assert_eq!(LAST_EVENT.get(), Some(EventKind::BatteryChargerDisconnected));
        assert!(power.is_normal());
    }

    #[test]
    fn invalid_battery_reading_causes_no_transition() {
        LAST_EVENT.set(None);
        let bus = bus();
        let mut power = Power::new();
        power.update(0, &bus, false, false, None);
        assert_eq!(LAST_EVENT.get(), None);
        assert!(power.is_normal());
    }
}
