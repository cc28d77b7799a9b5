use std::fmt::{Display, Formatter};

/// Per-sender monotonically increasing counter identifying a datagram in that sender's stream.
///
/// Sequence numbers are compared with plain total order over `u64`. The in-flight range between
///  low- and high-water marks is bounded (gaps are skipped long before they can grow anywhere
///  near the counter's range), and a 64 bit counter does not wrap within any realistic session
///  lifetime, so no circular comparison window is needed. Arithmetic is checked: an overflow
///  would be a protocol bug and panics rather than silently wrapping.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SequenceId(u64);

impl Display for SequenceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SequenceId {
    pub const ZERO: SequenceId = SequenceId(0);

    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> SequenceId {
        SequenceId(
            self.0.checked_add(1)
                .expect("sequence number overflow")
        )
    }

    pub fn prev(&self) -> SequenceId {
        SequenceId(
            self.0.checked_sub(1)
                .expect("sequence number underflow")
        )
    }
}
