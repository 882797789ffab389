//! Wall-clock timestamp as carried by headers, votes and commit signatures.

/// Nanoseconds per second.
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A UTC timestamp split into whole seconds and a sub-second nanosecond remainder.
///
/// `nanos` is always within `0..1_000_000_000`, also for instants before the unix epoch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    /// Seconds since the unix epoch.
    pub seconds: i64,
    /// Sub-second remainder in nanoseconds.
    pub nanos: i32,
}

impl Timestamp {
    /// Creates a new [`Timestamp`].
    pub const fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    /// Builds a [`Timestamp`] from nanoseconds since the unix epoch.
    pub const fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            seconds: nanos.div_euclid(NANOS_PER_SEC),
            nanos: nanos.rem_euclid(NANOS_PER_SEC) as i32,
        }
    }

    /// Returns the nanoseconds since the unix epoch, saturating at the `i64` bounds.
    pub const fn unix_nanos(&self) -> i64 {
        self.seconds.saturating_mul(NANOS_PER_SEC).saturating_add(self.nanos as i64)
    }
}
