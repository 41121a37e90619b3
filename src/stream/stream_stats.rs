use std::fmt::{Display, Formatter};
use std::time::Duration;
use tokio::time::Instant;
use crate::stream::sequence_tracker::{SequenceGap, SequenceTracker};
use crate::stream::verifier::VerificationOutcome;

pub const GIBIBYTE: u64 = 1024 * 1024 * 1024;

/// Periodic throughput and loss figures
#[derive(Clone, Debug, PartialEq)]
pub struct ThroughputReport {
    pub bytes_since_last_report: u64,
    pub total_bytes: u64,
    pub total_dropped: u64,
    pub total_received: u64,
}
impl ThroughputReport {
    pub fn drop_ratio(&self) -> f64 {
        if self.total_received == 0 {
            return 0.0;
        }
        self.total_dropped as f64 / self.total_received as f64
    }
}

impl Display for ThroughputReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:4.1} GB ({:4.1} GB), dropped {} / {} packets ({:.1e})",
               self.bytes_since_last_report as f64 / GIBIBYTE as f64,
               self.total_bytes as f64 / GIBIBYTE as f64,
               self.total_dropped,
               self.total_received,
               self.drop_ratio(),
        )
    }
}

/// Accumulated statistics of one stream of datagrams. There is one instance per receive session,
///  and it is updated sequentially for every datagram; there is no reset.
///
/// Reports are rate limited: a report is produced for a datagram only if more than the report
///  interval has passed since the previous report. If no datagrams arrive, there are no reports.
#[derive(Debug)]
pub struct StreamStats {
    report_interval: Duration,

    total_received: u64,
    total_bytes: u64,
    total_dropped: u64,
    total_failed: u64,
    total_out_of_order: u64,

    sequence: SequenceTracker,

    last_report_bytes: u64,
    last_report_time: Instant,
}
impl StreamStats {
    pub fn new(report_interval: Duration, now: Instant) -> StreamStats {
        StreamStats {
            report_interval,
            total_received: 0,
            total_bytes: 0,
            total_dropped: 0,
            total_failed: 0,
            total_out_of_order: 0,
            sequence: SequenceTracker::new(),
            last_report_bytes: 0,
            last_report_time: now,
        }
    }

    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    pub fn total_out_of_order(&self) -> u64 {
        self.total_out_of_order
    }

    pub fn last_key(&self) -> Option<u64> {
        self.sequence.last_key()
    }

    /// Accounts for a verified datagram, returning a report if one is due
    pub fn on_datagram(&mut self, outcome: &VerificationOutcome, now: Instant) -> Option<ThroughputReport> {
        self.total_received += 1;
        self.total_bytes += outcome.len as u64;
        if !outcome.is_pass() {
            self.total_failed += 1;
        }

        // datagrams too short for a key can not be placed in the sequence
        if let Some(key) = outcome.key {
            match self.sequence.on_key(key) {
                Some(SequenceGap::Dropped(n)) => self.total_dropped = self.total_dropped.saturating_add(n),
                Some(SequenceGap::NotIncreasing) => self.total_out_of_order += 1,
                Some(SequenceGap::Contiguous) | None => {}
            }
        }

        self.report_if_due(now)
    }

    fn report_if_due(&mut self, now: Instant) -> Option<ThroughputReport> {
        if now.saturating_duration_since(self.last_report_time) <= self.report_interval {
            return None;
        }

        let report = ThroughputReport {
            bytes_since_last_report: self.total_bytes - self.last_report_bytes,
            total_bytes: self.total_bytes,
            total_dropped: self.total_dropped,
            total_received: self.total_received,
        };

        self.last_report_time = now;
        self.last_report_bytes = self.total_bytes;
        Some(report)
    }
}
