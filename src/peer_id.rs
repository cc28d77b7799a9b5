use std::fmt::{Display, Formatter};

/// Opaque identifier of a multicast session endpoint. Assigned by the session manager when the
///  session is created and immutable for the session's lifetime.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PeerId(u64);

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl PeerId {
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }
}
