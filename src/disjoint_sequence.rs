use std::collections::BTreeMap;

use crate::sequence_id::SequenceId;

/// The set of sequence numbers received from one remote peer, represented as low / high water
///  marks plus the gap ranges in between.
///
/// * `low` is the lowest sequence number still of interest: everything below it is resolved,
///    either delivered or abandoned by a skip decision. It only ever moves up.
/// * `high` is the highest sequence number observed so far.
/// * `gaps` are the closed ranges in `[low, high)` that have not been received yet.
///
/// NB: There is an invariant that the gap ranges are sorted ascending, mutually disjoint and
///      never adjacent, and that every range lies fully inside `[low, high)` - `high` itself has
///      been received and is never part of a gap.
///
/// This is a pure data structure: no I/O, no logging. Skip decisions are logged where they are
///  made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisjointSequence {
    low: SequenceId,
    high: SequenceId,
    gaps: BTreeMap<SequenceId, SequenceId>,
}

impl DisjointSequence {
    /// A new instance seeded from the first sequence number seen from the peer, typically the
    ///  transport header that carried the peer's handshake. That number counts as received, and
    ///  gap checking starts from it.
    pub fn new(baseline: SequenceId) -> DisjointSequence {
        DisjointSequence {
            low: baseline,
            high: baseline,
            gaps: BTreeMap::default(),
        }
    }

    pub fn low(&self) -> SequenceId {
        self.low
    }

    pub fn high(&self) -> SequenceId {
        self.high
    }

    /// Records `seq` as received, registering any sequence numbers that were jumped over as a
    ///  new gap.
    ///
    /// Returns whether `seq` was newly recorded - `false` means the number was seen before (or
    ///  lies below the low-water mark and is resolved either way), and the caller must discard
    ///  the datagram to prevent duplicate delivery.
    pub fn update(&mut self, seq: SequenceId) -> bool {
        if seq > self.high {
            // everything between the previous high-water mark and the new one is now missing
            if seq > self.high.next() {
                self.gaps.insert(self.high.next(), seq.prev());
            }
            self.high = seq;
            return true;
        }

        if let Some((&start, &end)) = self.gaps.range(..=seq).next_back() {
            if seq <= end {
                // inside a gap: shrink or split the range around the newly received number
                self.gaps.remove(&start);
                if start < seq {
                    self.gaps.insert(start, seq.prev());
                }
                if seq < end {
                    self.gaps.insert(seq.next(), end);
                }
                return true;
            }
        }

        false
    }

    /// Unconditionally advances the low-water mark to `floor`, abandoning all gaps below it.
    ///  Sequence numbers below `floor` are permanently resolved: a late arrival for one of them
    ///  is treated as a duplicate from then on.
    ///
    /// The low-water mark never moves down - a `floor` at or below the current mark is a no-op.
    pub fn skip(&mut self, floor: SequenceId) {
        if floor <= self.low {
            return;
        }

        while let Some((&start, &end)) = self.gaps.first_key_value() {
            if end < floor {
                self.gaps.remove(&start);
                continue;
            }
            if start < floor {
                // the range straddles the new low-water mark: keep only the upper part
                self.gaps.remove(&start);
                self.gaps.insert(floor, end);
            }
            break;
        }

        self.low = floor;
        if self.high < floor {
            // no sequence number at or above the floor was ever received; re-baseline so that
            //  future gap checking starts at the floor
            self.high = floor;
        }
    }

    /// true iff at least one sequence number in `[low, high)` is missing
    pub fn disjoint(&self) -> bool {
        !self.gaps.is_empty()
    }

    /// total number of sequence numbers currently missing
    pub fn depth(&self) -> u64 {
        self.gaps.iter()
            .map(|(start, end)| end.to_raw() - start.to_raw() + 1)
            .sum()
    }

    /// the missing ranges in ascending order, each as a closed `(start, end)` pair
    pub fn gap_ranges(&self) -> impl Iterator<Item = (SequenceId, SequenceId)> + '_ {
        self.gaps.iter()
            .map(|(&start, &end)| (start, end))
    }
}
