use bytes::BufMut;

/// Produces the expected payload words of a datagram, seeded from the datagram's key.
///
/// The sender derives every word from a running state `s` that starts out as the key: word `i`
///  is `s ^ i`, and `s` advances to `3 * s + 1` after each word (wrapping). Word 0 is therefore
///  the key itself, which makes the payload self-describing.
///
/// This is a cheap reproducible mixing function for detecting corruption, not a cryptographic
///  checksum.
#[derive(Clone, Debug)]
pub struct ExpectedWords {
    state: u64,
    index: u64,
}
impl ExpectedWords {
    pub fn new(key: u64) -> ExpectedWords {
        ExpectedWords {
            state: key,
            index: 0,
        }
    }

    fn next_state(state: u64) -> u64 {
        state.wrapping_mul(3).wrapping_add(1)
    }
}

impl Iterator for ExpectedWords {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let word = self.state ^ self.index;
        self.state = Self::next_state(self.state);
        self.index = self.index.wrapping_add(1);
        Some(word)
    }
}

/// The expected word at `index` for a datagram with the given key.
///
/// NB: This walks the recurrence from the start, so it is O(index). Verification of a full
///  datagram should iterate over [ExpectedWords] instead.
pub fn expected_word(key: u64, index: usize) -> u64 {
    ExpectedWords::new(key)
        .nth(index)
        .expect("ExpectedWords is infinite")
}

/// Writes a complete, valid payload of `num_words` little-endian words for `key`
pub fn put_payload(buf: &mut impl BufMut, key: u64, num_words: usize) {
    for word in ExpectedWords::new(key).take(num_words) {
        buf.put_u64_le(word);
    }
}
