use rustc_hash::FxHashMap;
use tracing::debug;

use crate::disjoint_sequence::DisjointSequence;
use crate::peer_id::PeerId;
use crate::sequence_id::SequenceId;

/// Per-peer reception state for the whole session: one [DisjointSequence] per registered remote
///  peer, keyed by peer identity.
///
/// Peers are registered on first control contact (i.e. when their handshake is seen). Datagrams
///  from unregistered peers are treated permissively: `update` accepts them without recording
///  anything, because the handshake may simply not have gone through yet and dropping the
///  traffic would be worse than delivering it unchecked.
pub struct SequenceTracker {
    sequences: FxHashMap<PeerId, DisjointSequence>,
}

impl SequenceTracker {
    pub fn new() -> SequenceTracker {
        SequenceTracker {
            sequences: FxHashMap::default(),
        }
    }

    pub fn is_known(&self, peer: PeerId) -> bool {
        self.sequences.contains_key(&peer)
    }

    /// Registers a peer with a baseline sequence number, establishing the point from which
    ///  reception gaps are checked. Re-registering a known peer keeps the existing state - the
    ///  baseline from the first contact wins.
    pub fn register(&mut self, peer: PeerId, baseline: SequenceId) {
        if self.sequences.contains_key(&peer) {
            debug!("peer {} is already registered - keeping existing sequence state", peer);
            return;
        }
        self.sequences.insert(peer, DisjointSequence::new(baseline));
    }

    /// Records a sequence number received from `peer`, returning whether it was newly recorded.
    ///  `false` means a duplicate (or resolved) number, and the caller must discard the
    ///  datagram. Unknown peers are accepted unconditionally.
    pub fn update(&mut self, peer: PeerId, seq: SequenceId) -> bool {
        match self.sequences.get_mut(&peer) {
            Some(sequence) => sequence.update(seq),
            None => true,
        }
    }

    /// Advances `peer`'s low-water mark, abandoning all gaps below `floor`. A skip for an
    ///  unknown peer has nothing to act on and is logged and ignored.
    pub fn skip(&mut self, peer: PeerId, floor: SequenceId) {
        match self.sequences.get_mut(&peer) {
            Some(sequence) => sequence.skip(floor),
            None => debug!("skip for unknown peer {} - ignoring", peer),
        }
    }

    pub fn high_of(&self, peer: PeerId) -> Option<SequenceId> {
        self.sequences.get(&peer).map(|s| s.high())
    }

    pub fn depth_of(&self, peer: PeerId) -> u64 {
        self.sequences.get(&peer).map(|s| s.depth()).unwrap_or(0)
    }

    pub fn gaps_of(&self, peer: PeerId) -> Vec<(SequenceId, SequenceId)> {
        self.sequences.get(&peer)
            .map(|s| s.gap_ranges().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &DisjointSequence)> {
        self.sequences.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    const PEER: PeerId = PeerId::from_raw(0x1001);
    const OTHER: PeerId = PeerId::from_raw(0x1002);

    #[rstest]
    fn test_unknown_peer_is_permissive() {
        let mut tracker = SequenceTracker::new();

        assert!(!tracker.is_known(PEER));
        assert!(tracker.update(PEER, SequenceId::from_raw(7)));
        assert!(tracker.update(PEER, SequenceId::from_raw(7)), "unknown peers are not tracked, so repeats are accepted too");
        assert!(!tracker.is_known(PEER));
    }

    #[rstest]
    fn test_register_establishes_baseline() {
        let mut tracker = SequenceTracker::new();
        tracker.register(PEER, SequenceId::from_raw(42));

        assert!(tracker.is_known(PEER));
        assert!(!tracker.update(PEER, SequenceId::from_raw(42)), "the baseline itself counts as received");
        assert!(tracker.update(PEER, SequenceId::from_raw(43)));
        assert_eq!(tracker.high_of(PEER), Some(SequenceId::from_raw(43)));
    }

    #[rstest]
    fn test_register_is_first_contact_wins() {
        let mut tracker = SequenceTracker::new();
        tracker.register(PEER, SequenceId::from_raw(10));
        tracker.update(PEER, SequenceId::from_raw(15));

        tracker.register(PEER, SequenceId::from_raw(99));
        assert_eq!(tracker.high_of(PEER), Some(SequenceId::from_raw(15)));
    }

    #[rstest]
    fn test_skip_unknown_peer_is_ignored() {
        let mut tracker = SequenceTracker::new();
        tracker.skip(PEER, SequenceId::from_raw(10));
        assert!(!tracker.is_known(PEER));
    }

    #[rstest]
    fn test_gaps_and_depth_per_peer() {
        let mut tracker = SequenceTracker::new();
        tracker.register(PEER, SequenceId::from_raw(1));
        tracker.register(OTHER, SequenceId::from_raw(1));

        for seq in [2u64, 4, 6] {
            tracker.update(PEER, SequenceId::from_raw(seq));
        }
        tracker.update(OTHER, SequenceId::from_raw(2));

        assert_eq!(
            tracker.gaps_of(PEER),
            vec![(SequenceId::from_raw(3), SequenceId::from_raw(3)), (SequenceId::from_raw(5), SequenceId::from_raw(5))],
        );
        assert_eq!(tracker.depth_of(PEER), 2);
        assert_eq!(tracker.gaps_of(OTHER), vec![]);
        assert_eq!(tracker.depth_of(OTHER), 0);
    }
}
