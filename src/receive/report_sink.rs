#[cfg(test)] use mockall::automock;
use std::io::Write;
use crate::receive::receive_loop::ReceiveSummary;
use crate::stream::stream_stats::ThroughputReport;
use crate::stream::verifier::VerificationOutcome;

/// The receive loop's textual output. This is separate from logging: it is the tool's actual
///  result, intended for stdout.
#[cfg_attr(test, automock)]
pub trait ReportSink: Send + Sync + 'static {
    fn on_throughput_report(&self, report: &ThroughputReport);

    fn on_datagram_outcome(&self, outcome: &VerificationOutcome);

    fn on_summary(&self, summary: &ReceiveSummary);
}

pub struct StdoutReportSink;

impl ReportSink for StdoutReportSink {
    fn on_throughput_report(&self, report: &ThroughputReport) {
        println!("{}", report);
    }

    fn on_datagram_outcome(&self, outcome: &VerificationOutcome) {
        println!("{}", outcome);
    }

    fn on_summary(&self, summary: &ReceiveSummary) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", summary);
        let _ = stdout.flush();
    }
}
