//! Stream identifier type

use std::fmt;

/// Identifier of one side of an ADB stream (the `local-id` / `remote-id`
/// carried in `OPEN`, `OKAY`, `WRTE` and `CLSE` messages)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

impl StreamId {
    /// Create a new stream ID
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}
