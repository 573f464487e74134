//! Session identifiers.
//!
//! Ids are `"p"` followed by a base-36 counter. The counter starts at the
//! wall-clock millisecond of process start and only ever increments, so ids
//! are unique for the lifetime of the process without coordination.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Prefix shared by every session id.
pub const SESSION_ID_PREFIX: char = 'p';

/// Opaque, server-generated player/session identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing id string (as received from a client or the store).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Monotonic id source.
#[derive(Debug)]
pub struct SessionIdGenerator {
    next: u64,
}

impl SessionIdGenerator {
    /// Counter seeded from the current wall-clock time.
    pub fn from_clock() -> Self {
        Self::starting_at(Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Counter starting at a fixed value.
    pub fn starting_at(start: u64) -> Self {
        Self { next: start }
    }

    /// Produce the next id.
    pub fn next_id(&mut self) -> SessionId {
        let value = self.next;
        self.next = self.next.wrapping_add(1);

        let mut id = String::with_capacity(16);
        id.push(SESSION_ID_PREFIX);
        id.push_str(&to_base36(value));
        SessionId(id)
    }
}

/// Lowercase base-36 rendering of an unsigned integer.
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if value == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).unwrap_or_default()
}
