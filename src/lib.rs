//! Verification and benchmarking of an incoming UDP stream.
//!
//! The sender (e.g. an FPGA test design) emits a continuous stream of datagrams, each consisting
//!  of 8-byte words: word 0 is a key that increments by one per datagram, and every other word
//!  is derived from the key by a simple recurrence. The receiver re-derives the expected payload
//!  from the key, so it can verify every datagram and detect dropped datagrams without any
//!  coordination with the sender.
//!
//! ## Payload
//!
//! All words are u64 in little-endian byte order:
//! ```ascii
//! 0:   key (u64) - sequence number of the datagram, incremented by 1 per datagram
//! 8:   E(key, 1)
//! ...
//! 8*i: E(key, i)
//! ```
//!
//! `E(key, i) = s_i ^ i` where `s_0 = key` and `s_(i+1) = 3 * s_i + 1` (mod 2^64).
//!
//! Trailing bytes that do not form a complete word are a verification failure, but the complete
//!  words of such a datagram are still verified.
//!
//! ## Drop detection
//!
//! A gap in the key sequence is counted as dropped datagrams. Kernel drops (e.g. a socket receive
//!  buffer that is too small) can not be distinguished from drops on the network. A key that
//!  does not increase (duplicate, reordered or a restarted sender) is counted as out-of-order and
//!  does not contribute to the drop count.

pub mod stream;
pub mod receive;
