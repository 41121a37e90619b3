use bytes::Buf;

pub const WORD_LEN: usize = size_of::<u64>();

/// Bounds-checked view of a datagram as a sequence of little-endian u64 words. Trailing bytes
///  that do not form a complete word are never read.
#[derive(Clone, Debug)]
pub struct PayloadWords<'a> {
    buf: &'a [u8],
}
impl<'a> PayloadWords<'a> {
    pub fn new(datagram: &'a [u8]) -> PayloadWords<'a> {
        PayloadWords {
            buf: datagram,
        }
    }

    pub fn num_complete_words(datagram: &[u8]) -> usize {
        datagram.len() / WORD_LEN
    }

    pub fn has_partial_word(datagram: &[u8]) -> bool {
        datagram.len() % WORD_LEN != 0
    }

    /// the datagram's sequence key, if it has at least one complete word
    pub fn first_word(datagram: &[u8]) -> Option<u64> {
        PayloadWords::new(datagram).next()
    }
}

impl Iterator for PayloadWords<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.buf.remaining() < WORD_LEN {
            return None;
        }
        Some(self.buf.get_u64_le())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.buf.len() / WORD_LEN;
        (n, Some(n))
    }
}

impl ExactSizeIterator for PayloadWords<'_> {}
