use std::collections::VecDeque;

use tokio::time::Instant;

use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// One outstanding repair request: when it was sent, to whom, and the peer's high-water mark at
///  that time. The high-water mark is what the expiry policy compares against: if the peer has
///  not even advanced past it by the time the entry expires, the peer is considered
///  unresponsive and the data below the mark is abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairRecord {
    pub requested_at: Instant,
    pub peer: PeerId,
    pub marked_high: SequenceId,
}

/// Time-ordered record of outstanding repair requests across all peers.
///
/// Entries are recorded once per repair cycle per peer with gaps, so several entries per peer
///  may coexist. Recording happens with nondecreasing timestamps, which makes a deque the
///  natural representation: append at the back, expire from the front.
pub struct RepairLedger {
    records: VecDeque<RepairRecord>,
}

impl RepairLedger {
    pub fn new() -> RepairLedger {
        RepairLedger {
            records: VecDeque::default(),
        }
    }

    pub fn record(&mut self, requested_at: Instant, peer: PeerId, marked_high: SequenceId) {
        debug_assert!(
            self.records.back().map(|r| r.requested_at <= requested_at).unwrap_or(true),
            "repair records must be appended in time order"
        );
        self.records.push_back(RepairRecord { requested_at, peer, marked_high });
    }

    /// Removes and returns every record at or before `deadline`, oldest first.
    pub fn expire(&mut self, deadline: Instant) -> Vec<RepairRecord> {
        let mut expired = Vec::new();
        while let Some(front) = self.records.front() {
            if front.requested_at > deadline {
                break;
            }
            expired.push(self.records.pop_front().expect("front was just checked"));
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
