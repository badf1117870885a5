//! Intra-process event bus coordinating power transitions across
//! independently developed subsystems.
//!
//! Ground truth: `firmware/src/common/Event.c` / `Event.h`. Listeners are
//! stored in registration order in a fixed-capacity table (design value
//! 10, matching `MAX_NR_LISTENERS`); `trigger` dispatches synchronously
//! and completes before returning. Re-entrant triggering from inside a
//! listener is a precondition violation, not something this module
//! detects at runtime — the original relies on the single-threaded
//! cooperative scheduler to make it structurally impossible, and so do
//! we: `trigger` takes `&self`, so a listener cannot reach a live `&mut
//! EventBus` to re-trigger without going through unsafe code.

use heapless::Vec;

pub const MAX_LISTENERS: usize = 10;

/// Closed set of event kinds that can cross subsystem boundaries.
///
/// `All` is not a real event; it is the listener registration wildcard
/// that matches every triggered event, exactly like `EVENT_ALL` in the
/// original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum EventKind {
    All,
    Sleep,
    Wakeup,
    BatteryChargingStarted,
    BatteryChargingStopped,
    BatteryChargerDisconnected,
    BatteryCritical,
    BatteryLow,
    /// Fired by the node application exactly once when a reading has been
    /// accepted by the link layer for transmission; arms the sleep
    /// condition. Named `EVENT_RHT_AVAILABLE`/"sent callback" across
    /// source variants (spec.md §9 Open Questions); this crate commits to
    /// the "reading sent" contract.
    ReadingSent,
}

/// A timestamped event, millisecond clock value at the moment it was
/// raised.
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct Event {
    pub timestamp_ms: u32,
    pub kind: EventKind,
}

impl Event {
    pub fn new(timestamp_ms: u32, kind: EventKind) -> Self {
        Self { timestamp_ms, kind }
    }
}

type Callback = fn(&Event);

struct Listener {
    kind: EventKind,
    callback: Callback,
}

/// Fixed-capacity event bus. Listeners register once at startup; there is
/// no unregister in the core.
pub struct EventBus {
    listeners: Vec<Listener, MAX_LISTENERS>,
}

impl EventBus {
    pub const fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register `callback` to be invoked for every event whose id matches
    /// `kind`, or every event at all if `kind` is [`EventKind::All`].
    ///
    /// Panics if the listener table (capacity 10) is already full — a
    /// precondition violation in the original firmware's terms, since
    /// listener registration only ever happens once at startup with a
    /// statically known set of subsystems.
    pub fn add_listener(&mut self, kind: EventKind, callback: Callback) {
        self.listeners
            .push(Listener { kind, callback })
            .unwrap_or_else(|_| panic!("event listener table full"));
    }

    /// Notify every listener registered for `event.kind`, plus every
    /// `All` listener, in registration order. Completes synchronously
    /// before returning.
    pub fn trigger(&self, event: &Event) {
        for listener in &self.listeners {
            if listener.kind == event.kind || listener.kind == EventKind::All {
                (listener.callback)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    // Listener callbacks are plain fn pointers (no closures, matching the
    // original's function-pointer table), so tests communicate results
    // through thread-local-free statics scoped to each test via distinct
    // Cell types would require globals; instead we just check dispatch
    // order through a deterministic sequence captured by trigger count.

    static CALL_LOG: Cell<[u8; 8]> = Cell::new([0; 8]);
    static CALL_COUNT: Cell<usize> = Cell::new(0);

    fn record(id: u8) {
        let mut log = CALL_LOG.get();
        let count = CALL_COUNT.get();
        log[count] = id;
        CALL_LOG.set(log);
        CALL_COUNT.set(count + 1);
    }

    fn reset_log() {
        CALL_LOG.set([0; 8]);
        CALL_COUNT.set(0);
    }

    fn listener_one(_e: &Event) {
        record(1);
    }

    fn listener_two(_e: &Event) {
        record(2);
    }

    fn listener_all(_e: &Event) {
        record(9);
    }

    #[test]
    fn dispatches_to_matching_listener_only() {
        reset_log();
        let mut bus = EventBus::new();
        bus.add_listener(EventKind::Sleep, listener_one);
        bus.add_listener(EventKind::Wakeup, listener_two);
        bus.trigger(&Event::new(0, EventKind::Sleep));
        assert_eq!(CALL_COUNT.get(), 1);
        assert_eq!(CALL_LOG.get()[0], 1);
    }

    #[test]
    fn all_listener_matches_every_event() {
        reset_log();
        let mut bus = EventBus::new();
        bus.add_listener(EventKind::All, listener_all);
        bus.add_listener(EventKind::Sleep, listener_one);
        bus.trigger(&Event::new(0, EventKind::Sleep));
        assert_eq!(CALL_COUNT.get(), 2);
        assert_eq!(CALL_LOG.get()[0], 9);
        assert_eq!(CALL_LOG.get()[1], 1);
    }

    #[test]
    fn delivery_order_matches_registration_order() {
        reset_log();
        let mut bus = EventBus::new();
        bus.add_listener(EventKind::Wakeup, listener_two);
        bus.add_listener(EventKind::Wakeup, listener_one);
        bus.trigger(&Event::new(0, EventKind::Wakeup));
        assert_eq!(CALL_LOG.get()[0], 2);
        assert_eq!(CALL_LOG.get()[1], 1);
    }

    #[test]
    fn unrelated_event_triggers_nothing() {
        reset_log();
        let mut bus = EventBus::new();
        bus.add_listener(EventKind::Sleep, listener_one);
        bus.trigger(&Event::new(0, EventKind::Wakeup));
        assert_eq!(CALL_COUNT.get(), 0);
    }

    #[test]
    #[should_panic(expected = "event listener table full")]
    fn registering_past_capacity_panics() {
        let mut bus = EventBus::new();
        for _ in 0..MAX_LISTENERS {
            bus.add_listener(EventKind::Sleep, listener_one);
        }
        bus.add_listener(EventKind::Sleep, listener_one);
    }
}
