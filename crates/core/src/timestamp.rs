use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// Server write time: 8 bytes wall_ms (big-endian u64) followed by 4 bytes
/// counter (big-endian u32). Byte order and logical order agree, so the
/// encoded form can be indexed and compared directly.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Timestamp {
    wall_ms: u64,
    counter: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { wall_ms: 0, counter: 0 };

    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; 12]) -> Self {
        let mut wall = [0u8; 8];
        let mut counter = [0u8; 4];
        wall.copy_from_slice(&bytes[..8]);
        counter.copy_from_slice(&bytes[8..]);
        Self {
            wall_ms: u64::from_be_bytes(wall),
            counter: u32::from_be_bytes(counter),
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        let arr: [u8; 12] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| serde::de::Error::invalid_length(v.len(), &"12 bytes"))?;
        Ok(Timestamp::from_bytes(&arr))
    }
}

/// The store's write clock. Every stamp it hands out is strictly greater than
/// the previous one, even when the wall clock stalls or steps backwards, so
/// `lastUpdated` never decreases for a record.
pub struct ServerClock {
    wall_ms: u64,
    counter: u32,
}

impl ServerClock {
    pub fn new() -> Self {
        Self {
            wall_ms: 0,
            counter: 0,
        }
    }

    /// Resume after the largest stamp already persisted.
    pub fn resume_after(last: Timestamp) -> Self {
        Self {
            wall_ms: last.wall_ms,
            counter: last.counter,
        }
    }

    pub fn tick(&mut self) -> Result<Timestamp, CoreError> {
        let now = physical_now()?;

        let ts = if now > self.wall_ms {
            Timestamp::new(now, 0)
        } else {
            Timestamp::new(self.wall_ms, self.counter + 1)
        };

        self.wall_ms = ts.wall_ms;
        self.counter = ts.counter;
        Ok(ts)
    }
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_monotonicity() {
        let mut clock = ServerClock::new();
        let mut prev = clock.tick().unwrap();
        for _ in 0..100 {
            let next = clock.tick().unwrap();
            assert!(next > prev, "expected {next:?} > {prev:?}");
            prev = next;
        }
    }

    #[test]
    fn stalled_wall_clock_increments_counter() {
        let future_ms = physical_now().unwrap() + 100_000;
        let mut clock = ServerClock::resume_after(Timestamp::new(future_ms, 0));

        let t1 = clock.tick().unwrap();
        assert_eq!(t1.wall_ms(), future_ms);
        assert_eq!(t1.counter(), 1);

        let t2 = clock.tick().unwrap();
        assert_eq!(t2.wall_ms(), future_ms);
        assert_eq!(t2.counter(), 2);
    }

    #[test]
    fn ordering_matches_bytes() {
        let pairs = vec![
            (Timestamp::new(100, 0), Timestamp::new(200, 0)),
            (Timestamp::new(100, 0), Timestamp::new(100, 1)),
            (Timestamp::new(100, 999), Timestamp::new(101, 0)),
            (Timestamp::ZERO, Timestamp::new(0, 1)),
        ];

        for (a, b) in &pairs {
            assert_eq!(a.cmp(b), a.to_bytes().cmp(&b.to_bytes()));
            assert!(a < b, "expected {a:?} < {b:?}");
        }
    }

    #[test]
    fn bytes_restore_the_same_stamp() {
        let ts = Timestamp::new(1_700_000_000_000, 42);
        assert_eq!(Timestamp::from_bytes(&ts.to_bytes()), ts);
    }
}
