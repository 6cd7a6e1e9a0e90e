//! Resolves the configured canonical timezone to a UTC offset.
//!
//! The offset decides what "today" means, which in turn decides whether a
//! viewed month counts as current, past, or future for balance
//! projections.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Look up `canonical_timezone` (e.g. "America/Sao_Paulo") and return its
/// UTC offset as of now, or `None` if the name is unknown.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}
