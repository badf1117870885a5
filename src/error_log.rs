//! Persistent ring of error records, combined with the fail-stop assertion
//! contract.
//!
//! Ground truth: `firmware/src/common/ErrorHandler.c`. Entries are
//! appended to a fixed-capacity ring (design value 80) backed by
//! non-volatile storage; at boot, [`ErrorLog::init`] scans the ring in
//! physical order to find where the previous session left off, by
//! looking for the first id that is not strictly greater than the one
//! before it.

use crate::time::DateTime;

pub const LOG_SIZE: usize = 80;

/// Error kinds recorded in the log (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum Code {
    PowerOn = 1,
    AssertFail = 2,
    LowStack = 3,
    RtcFail = 4,
    /// Reported when [`crate::config::ConfigStore::load`] rejects a
    /// corrupted record and falls back to the compiled-in default.
    CorruptConfig = 5,
}

/// One persisted error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub struct LogEntry {
    pub id: u32,
    pub timestamp: u32,
    pub code: u8,
    pub information: u8,
}

impl LogEntry {
    const EMPTY: LogEntry = LogEntry {
        id: 0,
        timestamp: 0,
        code: 0,
        information: 0,
    };
}

/// Non-volatile backing store for the error log, abstracted so the core
/// can be exercised on host without real EEPROM/flash. Binaries implement
/// this against the MCU's persistent memory; host tests implement it
/// in-memory.
pub trait ErrorLogStorage {
    fn read(&self, index: usize) -> LogEntry;
    fn write(&mut self, index: usize, entry: LogEntry);
}

/// RTC capability the log needs to timestamp entries. Failure to read the
/// clock does not abort the append — a zero timestamp is stored instead,
/// matching `FillLogEntry`'s "fill the entry even if the timestamp read
/// fails" comment.
pub trait ClockSource {
    fn now(&mut self) -> Option<DateTime>;
}

pub struct ErrorLog<S: ErrorLogStorage> {
    storage: S,
    current_index: usize,
    current_id: u32,
}

impl<S: ErrorLogStorage> ErrorLog<S> {
    /// Scan the ring in physical order to locate the write head and the
    /// next id to use. The first index `i` whose id is not strictly
    /// greater than the previous one (slot 0's predecessor is treated as
    /// id 0) marks the write head. If no such break exists the ring is
    /// full and wraps to index 0.
    pub fn init(storage: S) -> Self {
        let mut prev_id = 0u32;
        for i in 0..LOG_SIZE {
            let id = storage.read(i).id;
            if id <= prev_id {
                defmt::debug!("error log resumed at index {}, next id {}", i, prev_id + 1);
                return ErrorLog {
                    storage,
                    current_index: i,
                    current_id: prev_id + 1,
                };
            }
            prev_id = id;
        }
        defmt::debug!("error log resumed at index 0, next id {}", prev_id + 1);
        ErrorLog {
            storage,
            current_index: 0,
            current_id: prev_id + 1,
        }
    }

    /// Append a new record with a monotonically increasing id, advance
    /// the write index modulo [`LOG_SIZE`], and tick the id counter.
    pub fn log(&mut self, clock: &mut dyn ClockSource, code: Code, information: u8) {
        let timestamp = clock.now().map(|t| t.to_timestamp()).unwrap_or(0);
        let entry = LogEntry {
            id: self.current_id,
            timestamp,
            code: code as u8,
            information,
        };
        self.storage.write(self.current_index, entry);
        self.current_index = (self.current_index + 1) % LOG_SIZE;
        self.current_id += 1;
    }

    /// Logs `AssertFail` with a `defmt::error!` diagnostic, then hands
    /// off to [`point_of_no_return`]. Ground truth: `libDebug_Assert`'s
    /// print-then-halt sequence.
    pub fn assert_fail(
        &mut self,
        clock: &mut dyn ClockSource,
        information: u8,
        disable_watchdog_and_interrupts: impl FnOnce(),
    ) -> ! {
        defmt::error!("assertion failed, information={}", information);
        self.log(clock, Code::AssertFail, information);
        point_of_no_return(disable_watchdog_and_interrupts)
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_id(&self) -> u32 {
        self.current_id
    }

    /// Iterate physical log records, stopping at the first never-written
    /// (id == 0) slot. Debug-build tooling only, matching
    /// `ErrorHandler_DumpLog`'s `#ifdef DEBUG_ENABLE` guard.
    pub fn dump(&self) -> impl Iterator<Item = LogEntry> + '_ {
        (0..LOG_SIZE)
            .map(|i| self.storage.read(i))
            .take_while(|e| e.id != 0)
    }
}

/// In-memory [`ErrorLogStorage`] used by host tests and by any binary
/// without battery-backed NV memory wired up yet.
pub struct RamStorage {
    entries: [LogEntry; LOG_SIZE],
}

impl RamStorage {
    pub const fn new() -> Self {
        Self {
            entries: [LogEntry::EMPTY; LOG_SIZE],
        }
    }
}

impl Default for RamStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorLogStorage for RamStorage {
    fn read(&self, index: usize) -> LogEntry {
        self.entries[index]
    }

    fn write(&mut self, index: usize, entry: LogEntry) {
        self.entries[index] = entry;
    }
}

/// Disable the watchdog, disable interrupts, and loop forever. The
/// explicit fail-stop contract (spec.md §4.E/§7): infallible, no
/// allocation, no locks, runs with the watchdog disabled so nothing can
/// resurrect the device except an external reset.
///
/// The concrete watchdog-disable and interrupt-disable steps are board
/// capabilities (outside the core, per Design Notes §9); this function
/// takes them as a closure so the core stays hardware-agnostic while
/// still expressing the "point of no return" as a real, non-bypassable
/// control-flow dead end (`-> !`).
pub fn point_of_no_return(disable_watchdog_and_interrupts: impl FnOnce()) -> ! {
    disable_watchdog_and_interrupts();
    loop {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(Option<DateTime>);
    impl ClockSource for FixedClock {
        fn now(&mut self) -> Option<DateTime> {
            self.0
        }
    }

    #[test]
    fn fresh_log_starts_at_index_zero_id_one() {
        let log = ErrorLog::init(RamStorage::new());
        assert_eq!(log.current_index(), 0);
        assert_eq!(log.current_id(), 1);
    }

    #[test]
    fn id_increases_strictly_on_successive_appends() {
        let mut log = ErrorLog::init(RamStorage::new());
        let mut clock = FixedClock(Some(DateTime::INVALID));
        let mut last_id = 0;
        for _ in 0..10 {
            log.log(&mut clock, Code::PowerOn, 0);
            assert!(log.current_id() > last_id);
            last_id = log.current_id();
        }
    }

    #[test]
    fn wraps_after_eighty_entries() {
        let mut log = ErrorLog::init(RamStorage::new());
        let mut clock = FixedClock(Some(DateTime::INVALID));
        for _ in 0..LOG_SIZE {
            log.log(&mut clock, Code::PowerOn, 0);
        }
        assert_eq!(log.current_index(), 0);
        assert_eq!(log.current_id(), LOG_SIZE as u32 + 1);

        // 81st call overwrites slot 0.
        log.log(&mut clock, Code::PowerOn, 0);
        assert_eq!(log.current_index(), 1);
        assert_eq!(log.current_id(), LOG_SIZE as u32 + 2);
    }

    #[test]
    fn boot_scan_after_wraparound_matches_in_ram_counter() {
        // Simulate what an 81-call append sequence leaves behind: slot 0
        // holds the 81st id, slots 1..80 hold ids 2..80 (slot 0's id, 81,
        // is not strictly greater than slot 79's id, 80 — that's the
        // wraparound break the boot scan looks for).
        let mut storage = RamStorage::new();
        for i in 0..LOG_SIZE {
            let id = if i == 0 { (LOG_SIZE + 1) as u32 } else { (i + 1) as u32 };
            storage.write(
                i,
                LogEntry {
                    id,
                    timestamp: 0,
                    code: Code::PowerOn as u8,
                    information: 0,
                },
            );
        }
        let rescanned = ErrorLog::init(storage);
        assert_eq!(rescanned.current_index(), 1);
        assert_eq!(rescanned.current_id(), LOG_SIZE as u32 + 2);
    }

    #[test]
    fn rtc_failure_stores_zero_timestamp_without_aborting_append() {
        let mut log = ErrorLog::init(RamStorage::new());
        let mut clock = FixedClock(None);
        log.log(&mut clock, Code::RtcFail, 0);
        let entry = log.dump().next().unwrap();
        assert_eq!(entry.timestamp, 0);
        assert_eq!(entry.code, Code::RtcFail as u8);
    }

    #[test]
    fn dump_stops_at_first_never_written_slot() {
        let mut log = ErrorLog::init(RamStorage::new());
        let mut clock = FixedClock(Some(DateTime::INVALID));
        log.log(&mut clock, Code::PowerOn, 1);
        log.log(&mut clock, Code::PowerOn, 2);
        let entries: heapless::Vec<LogEntry, 4> = log.dump().collect();
        assert_eq!(entries.len(), 2);
    }
}
