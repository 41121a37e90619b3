use tracing::warn;

/// Classification of a key relative to the previous datagram's key
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SequenceGap {
    /// `key == last_key + 1`, including wrap-around from `u64::MAX` to 0
    Contiguous,
    /// `key > last_key + 1`: the number of keys that were skipped
    Dropped(u64),
    /// `key <= last_key`: a duplicate, a reordered datagram or a restarted sender. This is never
    ///  counted as dropped datagrams since the unsigned difference would be close to 2^64.
    NotIncreasing,
}

/// The only place where keys are subtracted. Ordering is checked before subtracting, so the
///  result can not underflow.
pub fn sequence_gap(last_key: u64, key: u64) -> SequenceGap {
    if key == last_key.wrapping_add(1) {
        SequenceGap::Contiguous
    }
    else if key > last_key {
        SequenceGap::Dropped(key - last_key - 1)
    }
    else {
        SequenceGap::NotIncreasing
    }
}

/// Keeps track of the most recent key in a stream of datagrams
#[derive(Default, Debug)]
pub struct SequenceTracker {
    last_key: Option<u64>,
}
impl SequenceTracker {
    pub fn new() -> SequenceTracker {
        Default::default()
    }

    pub fn last_key(&self) -> Option<u64> {
        self.last_key
    }

    /// Registers a datagram's key, returning its relation to the previous key or `None` for the
    ///  first datagram, which only establishes the baseline. The key becomes the new reference
    ///  in either case.
    pub fn on_key(&mut self, key: u64) -> Option<SequenceGap> {
        let gap = self.last_key
            .map(|last_key| sequence_gap(last_key, key));

        if gap == Some(SequenceGap::NotIncreasing) {
            warn!("received key {} after {:?} - duplicate or reordered datagram", key, self.last_key);
        }

        self.last_key = Some(key);
        gap
    }
}
