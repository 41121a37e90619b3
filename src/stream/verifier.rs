use std::fmt::{Display, Formatter};
use tracing::debug;
use crate::stream::generator::ExpectedWords;
use crate::stream::payload::PayloadWords;

/// The result of checking one datagram against its expected payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationOutcome {
    /// number of mismatching words, plus one if the datagram's length is not a multiple of the
    ///  word size
    pub mismatch_count: u32,
    /// `None` if the datagram is too short to contain a key
    pub key: Option<u64>,
    pub len: usize,
}
impl VerificationOutcome {
    pub fn is_pass(&self) -> bool {
        self.mismatch_count == 0
    }
}

impl Display for VerificationOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "datagram  length={:4}  ", self.len)?;
        match self.key {
            Some(key) => write!(f, "key={}  ", key)?,
            None => write!(f, "key=-  ")?,
        }
        if self.is_pass() {
            write!(f, "PASS")
        }
        else {
            write!(f, "{} FAIL", self.mismatch_count)
        }
    }
}

/// Checks every complete word of a datagram against the words derived from its key (word 0).
///
/// All words are checked, even after a mismatch was found, so the mismatch count reflects
///  the extent of corruption. Details of each mismatching word are logged at DEBUG level.
pub fn verify_datagram(datagram: &[u8]) -> VerificationOutcome {
    let mut mismatch_count = 0;

    if PayloadWords::has_partial_word(datagram) {
        debug!("wrong length: {}, partial datagram?", datagram.len());
        mismatch_count += 1;
    }

    let key = match PayloadWords::first_word(datagram) {
        Some(key) => key,
        None => return VerificationOutcome {
            mismatch_count,
            key: None,
            len: datagram.len(),
        },
    };

    let actual_and_expected = PayloadWords::new(datagram)
        .zip(ExpectedWords::new(key));
    for (index, (actual, expected)) in actual_and_expected.enumerate() {
        if actual != expected {
            debug!("words[{:2}] = {:016x} != {:016x}", index, actual, expected);
            mismatch_count += 1;
        }
    }

    VerificationOutcome {
        mismatch_count,
        key: Some(key),
        len: datagram.len(),
    }
}
