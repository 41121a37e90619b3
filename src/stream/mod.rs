//! Verification of a stream of self-describing datagrams.
//!
//! Each datagram is a sequence of little-endian u64 words. Word 0 is the datagram's *key*, which
//!  increments by one per datagram, and all other words are derived from the key (see
//!  [generator::ExpectedWords]). This allows the receiver to detect both corrupted payload
//!  (by re-deriving the words) and dropped datagrams (by gaps in the key sequence) without any
//!  shared state with the sender.

pub mod generator;
pub mod payload;
pub mod verifier;
pub mod sequence_tracker;
pub mod stream_stats;
