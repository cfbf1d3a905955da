//! Resolves canonical timezone names to UTC offsets.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone, timezones};

use crate::Error;

/// The UTC offset of the canonical timezone `canonical_timezone` (e.g.
/// `"Pacific/Auckland"`) at the instant `at`.
///
/// The offset depends on `at` because of daylight saving transitions.
///
/// # Errors
/// This function will return an [Error::InvalidTimezone] if
/// `canonical_timezone` is not a known timezone name.
pub fn local_offset(canonical_timezone: &str, at: OffsetDateTime) -> Result<UtcOffset, Error> {
    let timezone = timezones::get_by_name(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezone(canonical_timezone.to_owned()))?;

    Ok(timezone.get_offset_utc(&at).to_utc())
}
