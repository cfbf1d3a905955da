//! Defines the clock trait used to inject time into the processor and
//! scheduler.

use time::OffsetDateTime;

/// A source of the current time.
///
/// The processor and scheduler read time through this trait so tests can
/// pin the clock to a fixed instant.
pub trait Clock {
    /// The current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// A [Clock] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
