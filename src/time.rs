//! Calendar time arithmetic over the 2000-01-01 00:00:00 UTC epoch.
//!
//! Ground truth: `firmware/src/common/time/Time.c`. The timestamp <->
//! broken-down-time conversion exploits the epoch sitting at the
//! conjunction of the 4- and 100-year leap cycles, so the inverse can be
//! computed without a lookup table (Michael Duane Rice's algorithm, as
//! credited in the original source).

use core::fmt::Write as _;

const DAYS_IN_MONTHS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const SECONDS_PER_DAY: u32 = 86_400;
const SECONDS_PER_HOUR: u32 = 3_600;
const DAYS_IN_MARCH_OCTOBER: u8 = 31;
const DAYS_IN_WEEK: u8 = 7;

/// Broken-down calendar time, six fields, year offset from 2000.
///
/// The all-zero value is the distinguished "invalid" sentinel used in
/// packet payloads when no RTC reading was available at send time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, defmt::Format)]
pub struct DateTime {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    pub const INVALID: DateTime = DateTime {
        year: 0,
        month: 0,
        day: 0,
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub const fn is_invalid(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }

    /// Gregorian leap year rule applied to `2000 + year`.
    pub fn is_leap_year(&self) -> bool {
        let year = 2000u32 + self.year as u32;
        year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
    }

    /// Number of days in this time's month, leap-year adjusted for
    /// February.
    pub fn days_in_month(&self) -> u8 {
        debug_assert!(self.month >= 1 && self.month as usize <= DAYS_IN_MONTHS.len());
        let days = DAYS_IN_MONTHS[(self.month - 1) as usize];
        if self.month == 2 && self.is_leap_year() {
            days + 1
        } else {
            days
        }
    }

    /// Zeller-congruence-style weekday, 0 = Sunday.
    pub fn day_of_week(&self) -> u8 {
        const T: [u16; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
        let mut year = self.year as u16 + 2000;
        if self.month < 3 {
            year -= 1;
        }
        let leap_adjustment = year / 4 - year / 100 + year / 400;
        ((year + leap_adjustment + T[(self.month - 1) as usize] + self.day as u16) % 7) as u8
    }

    /// Central European DST window: last Sunday of March through the last
    /// Sunday of October, active on the boundary day itself starting in
    /// March and ending in October. Hour granularity is intentionally not
    /// modeled.
    pub fn is_dst_active(&self) -> bool {
        const MARCH: u8 = 3;
        const OCTOBER: u8 = 10;

        if self.month > MARCH && self.month < OCTOBER {
            return true;
        }
        if self.month < MARCH || self.month > OCTOBER {
            return false;
        }

        let mut next_sunday = self.day + (DAYS_IN_WEEK - self.day_of_week());
        if next_sunday < DAYS_IN_MARCH_OCTOBER {
            while next_sunday + DAYS_IN_WEEK < DAYS_IN_MARCH_OCTOBER {
                next_sunday += DAYS_IN_WEEK;
            }
        } else {
            next_sunday -= DAYS_IN_WEEK;
        }

        (self.month == MARCH && self.day >= next_sunday)
            || (self.month == OCTOBER && self.day < next_sunday)
    }

    pub fn add_seconds(&mut self, seconds: u32) {
        *self = Self::from_timestamp(self.to_timestamp().wrapping_add(seconds));
    }

    pub fn add_minutes(&mut self, minutes: u32) {
        self.add_seconds(minutes.wrapping_mul(60));
    }

    pub fn add_hours(&mut self, hours: u32) {
        self.add_seconds(hours.wrapping_mul(SECONDS_PER_HOUR));
    }

    pub fn add_days(&mut self, days: u32) {
        self.add_seconds(days.wrapping_mul(SECONDS_PER_DAY));
    }

    /// Epoch seconds elapsed since 2000-01-01 00:00:00 UTC.
    pub fn to_timestamp(&self) -> u32 {
        let year = self.year as i64;
        let mut leaps: i64 = 0;
        if year != 0 {
            let m = year - 1;
            leaps = m / 4 - m / 100 + 1;
        }
        let mut days: i64 = 365 * year + leaps;

        let mut d: i64 = self.day as i64 - 1;
        let month = self.month as i64 - 1;

        if month < 2 {
            if month != 0 {
                d += 31;
            }
        } else {
            let mut n: i64 = 59;
            if self.is_leap_year() {
                n += 1;
            }
            d += n;

            const MARCH: i64 = 2; // zero-based March
            const JULY: i64 = 6; // zero-based July
            let mut n2 = month - MARCH;
            if n2 > (JULY - MARCH) {
                d += 153;
            }
            n2 %= 5;

            let m = (n2 / 2) * 61;
            d += m;
            if n2 & 1 != 0 {
                d += 31;
            }
        }

        days += d;
        let mut total = days * SECONDS_PER_DAY as i64;
        total += self.hour as i64 * SECONDS_PER_HOUR as i64;
        total += self.minute as i64 * 60;
        total += self.second as i64;

        total as u32
    }

    /// Inverse of [`DateTime::to_timestamp`].
    pub fn from_timestamp(timestamp: u32) -> DateTime {
        let mut days = (timestamp / SECONDS_PER_DAY) as i64;
        let second = (timestamp % 60) as u8;
        let mut rem = timestamp / 60;
        let minute = (rem % 60) as u8;
        rem /= 60;
        let hour = (rem % 24) as u8;

        // Map into a 100-year cycle, then a 4-year cycle.
        let mut years = 100 * (days / 36525);
        let mut remainder = days % 36525;

        years += 4 * (remainder / 1461);
        days = remainder % 1461;
        if years > 100 {
            days += 1;
        }

        let mut leap_year = 1i64;
        if years == 100 {
            leap_year = 0;
        }

        let n = 364 + leap_year;
        if days > n {
            days -= leap_year;
            leap_year = 0;
            years += days / 365;
            remainder = days % 365;
            days = remainder;
        }

        let year = years as u8;

        let n = 59 + leap_year;
        let (month, day) = if days < n {
            let month = days / 31;
            let day = days % 31;
            (month, day)
        } else {
            let mut d = days - n;
            let mut month = 2 + (d / 153) * 5;
            d %= 153;
            month += (d / 61) * 2;
            d %= 61;
            month += d / 31;
            let day = d % 31;
            (month, day)
        };

        DateTime {
            year,
            month: (month + 1) as u8,
            day: (day + 1) as u8,
            hour,
            minute,
            second,
        }
    }

    /// Packs the six fields in wire order (year, month, day, hour,
    /// minute, second), matching the `struct time_t` layout referenced
    /// throughout the original source's packet content.
    pub fn to_bytes(&self) -> [u8; 6] {
        [self.year, self.month, self.day, self.hour, self.minute, self.second]
    }

    pub fn from_bytes(bytes: [u8; 6]) -> DateTime {
        DateTime {
            year: bytes[0],
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
        }
    }

    /// Writes `"20YY-MM-DD HH:MM:SS"` into `out`, truncating to fit and
    /// always leaving a valid, NUL-free `&str` slice of what was written
    /// (there is no NUL terminator in Rust strings; callers that need one
    /// for a C FFI boundary should append it themselves).
    pub fn format_timestamp<'a>(&self, out: &'a mut heapless::String<32>) -> &'a str {
        out.clear();
        // heapless::String::write! silently truncates on overflow instead
        // of panicking, matching snprintf's truncate-and-terminate
        // behavior.
        let _ = write!(
            out,
            "20{:02}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        );
        out.as_str()
    }
}
