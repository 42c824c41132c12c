//! Record identifiers.
//!
//! Keys are 24 lowercase hex characters: four bytes of big-endian unix
//! seconds, five bytes fixed per process and a three-byte counter. Keys
//! generated by one process are strictly increasing: the counter restarts
//! every second, and when it runs out the key borrows the next second.

use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::StoreError;

const KEY_BYTES: usize = 12;
const KEY_LEN: usize = KEY_BYTES * 2;
const COUNTER_MASK: u32 = 0x00ff_ffff;

/// A validated record key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey(String);

impl RecordKey {
    /// Generate a fresh key.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or_default();
        let (seconds, count) = next_stamp(now);

        let mut bytes = [0u8; KEY_BYTES];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process_bytes());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);

        Self(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    /// Parse an externally supplied identifier.
    ///
    /// Uppercase hex is accepted and normalised. Anything else is reported as
    /// [`StoreError::Cast`].
    pub fn parse(value: &str) -> Result<Self, StoreError> {
        if Self::is_well_formed(value) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(StoreError::Cast {
                value: value.to_string(),
            })
        }
    }

    /// Whether `value` has the shape of a record key.
    pub fn is_well_formed(value: &str) -> bool {
        value.len() == KEY_LEN && value.bytes().all(|byte| byte.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn process_bytes() -> &'static [u8; 5] {
    static PROCESS: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS.get_or_init(|| {
        let random = Uuid::new_v4();
        let mut bytes = [0u8; 5];
        bytes.copy_from_slice(&random.as_bytes()[..5]);
        bytes
    })
}

/// Last issued `(seconds, counter)` pair for this process.
fn last_stamp() -> &'static Mutex<(u32, u32)> {
    static LAST: OnceLock<Mutex<(u32, u32)>> = OnceLock::new();
    LAST.get_or_init(|| Mutex::new((0, 0)))
}

fn next_stamp(now: u32) -> (u32, u32) {
    let mut last = match last_stamp().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *last = advance(*last, now);
    *last
}

/// Successor of `last` at wall-clock second `now`. Never goes backwards,
/// even when the clock does.
fn advance((seconds, count): (u32, u32), now: u32) -> (u32, u32) {
    if now > seconds {
        (now, 0)
    } else if count < COUNTER_MASK {
        (seconds, count + 1)
    } else {
        (seconds.wrapping_add(1), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_well_formed_and_distinct() {
        let first = RecordKey::generate();
        let second = RecordKey::generate();

        assert!(RecordKey::is_well_formed(first.as_str()));
        assert!(RecordKey::is_well_formed(second.as_str()));
        assert_ne!(first, second);
    }

    #[test]
    fn counter_exhaustion_borrows_the_next_second() {
        assert_eq!(advance((100, 5), 100), (100, 6));
        assert_eq!(advance((100, COUNTER_MASK), 100), (101, 0));
        assert_eq!(advance((101, 0), 100), (101, 1));
        assert_eq!(advance((101, 7), 102), (102, 0));
    }

    #[test]
    fn generated_keys_sort_in_creation_order() {
        let keys: Vec<RecordKey> = (0..1000).map(|_| RecordKey::generate()).collect();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn parse_accepts_object_id_shaped_values() {
        let key = RecordKey::parse("507F1F77BCF86CD799439011").unwrap();
        assert_eq!(key.as_str(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn parse_rejects_malformed_values() {
        for value in ["", "123", "not-a-valid-identifier!!", "507f1f77bcf86cd79943901g"] {
            match RecordKey::parse(value) {
                Err(StoreError::Cast { value: rejected }) => assert_eq!(rejected, value),
                other => panic!("expected cast failure for {value:?}, got {other:?}"),
            }
        }
    }
}
