use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, trace};
use crate::receive::config::ReceiveConfig;
use crate::receive::datagram_socket::DatagramSocket;
use crate::receive::report_sink::ReportSink;
use crate::stream::stream_stats::StreamStats;
use crate::stream::verifier::verify_datagram;

/// The reason the receive loop terminated
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// the configured maximum number of datagrams was received
    TargetReached,
    /// A datagram was empty or filled the entire receive buffer (and was possibly truncated).
    ///  This points to a framing problem upstream rather than to corrupted data, so there is no
    ///  point in continuing.
    InvalidLength(usize),
    Cancelled,
}

/// Final tallies of a receive session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiveSummary {
    pub received: u64,
    pub failed: u64,
    pub timeouts: u64,
    pub dropped: u64,
    pub out_of_order: u64,
    pub termination: Termination,
}

impl Display for ReceiveSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} received, {} failed, {} timeouts, {} dropped, {} out of order",
               self.received, self.failed, self.timeouts, self.dropped, self.out_of_order)
    }
}

enum ReceiveState {
    Waiting,
    Processing { len: usize },
}

enum WaitResult {
    Datagram(usize),
    Timeout,
    Retry,
    Cancelled,
}

/// ReceiveLoop reads datagrams one at a time, verifying and accounting for each before waiting
///  for the next one. There is no concurrency: the receive buffer is allocated once and reused.
pub struct ReceiveLoop {
    config: Arc<ReceiveConfig>,
    socket: Arc<dyn DatagramSocket>,
    report_sink: Arc<dyn ReportSink>,
}
impl ReceiveLoop {
    pub fn new(config: Arc<ReceiveConfig>, socket: Arc<dyn DatagramSocket>, report_sink: Arc<dyn ReportSink>) -> anyhow::Result<ReceiveLoop> {
        config.validate()?;

        Ok(ReceiveLoop {
            config,
            socket,
            report_sink,
        })
    }

    /// Runs until the configured number of datagrams was received, an invalid datagram length is
    ///  encountered, or `shutdown` is set to `true`. The final summary is passed to the report
    ///  sink before it is returned.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ReceiveSummary {
        info!("starting receive loop");

        let mut buf = vec![0u8; self.config.buffer_capacity];
        let mut stats = StreamStats::new(self.config.report_interval, Instant::now());
        let mut timeouts = 0u64;

        let mut state = ReceiveState::Waiting;
        let termination = loop {
            state = match state {
                ReceiveState::Waiting => {
                    if self.is_target_reached(&stats) {
                        break Termination::TargetReached;
                    }

                    match self.wait_for_datagram(&mut buf, &mut shutdown).await {
                        WaitResult::Datagram(len) => {
                            if len == 0 || len >= buf.len() {
                                error!("invalid datagram length {} (receive buffer capacity is {}) - terminating", len, buf.len());
                                break Termination::InvalidLength(len);
                            }
                            ReceiveState::Processing { len }
                        }
                        WaitResult::Timeout => {
                            timeouts += 1;
                            ReceiveState::Waiting
                        }
                        WaitResult::Retry => ReceiveState::Waiting,
                        WaitResult::Cancelled => break Termination::Cancelled,
                    }
                }
                ReceiveState::Processing { len } => {
                    self.process_datagram(&buf[..len], &mut stats);
                    ReceiveState::Waiting
                }
            }
        };

        let summary = ReceiveSummary {
            received: stats.total_received(),
            failed: stats.total_failed(),
            timeouts,
            dropped: stats.total_dropped(),
            out_of_order: stats.total_out_of_order(),
            termination,
        };
        info!("receive loop terminated: {:?}", termination);
        self.report_sink.on_summary(&summary);
        summary
    }

    fn is_target_reached(&self, stats: &StreamStats) -> bool {
        match self.config.max_datagrams {
            Some(max) => stats.total_received() >= max,
            None => false,
        }
    }

    async fn wait_for_datagram(&self, buf: &mut [u8], shutdown: &mut watch::Receiver<bool>) -> WaitResult {
        if *shutdown.borrow_and_update() {
            return WaitResult::Cancelled;
        }

        select! {
            biased;
            Ok(()) = shutdown.changed() => {
                if *shutdown.borrow_and_update() {
                    WaitResult::Cancelled
                }
                else {
                    WaitResult::Retry
                }
            }
            recv_result = timeout(self.config.wait_timeout, self.socket.recv_datagram(buf)) => {
                match recv_result {
                    Err(_) => WaitResult::Timeout,
                    Ok(Ok(len)) => WaitResult::Datagram(len),
                    Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {
                        debug!("interrupted while waiting for a datagram - retrying");
                        WaitResult::Retry
                    }
                    Ok(Err(e)) => {
                        error!("error receiving datagram: {}", e);
                        WaitResult::Retry
                    }
                }
            }
        }
    }

    fn process_datagram(&self, datagram: &[u8], stats: &mut StreamStats) {
        trace!("received datagram of {} bytes", datagram.len());

        let outcome = verify_datagram(datagram);
        if let Some(report) = stats.on_datagram(&outcome, Instant::now()) {
            self.report_sink.on_throughput_report(&report);
        }
        if self.config.verbose || !outcome.is_pass() {
            self.report_sink.on_datagram_outcome(&outcome);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::receive::report_sink::MockReportSink;
    use crate::stream::generator::put_payload;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Scripted {
        Datagram(Vec<u8>),
        Silence,
        Error(io::ErrorKind),
    }

    /// Plays back a fixed sequence of socket events. Once the script is exhausted, it returns
    ///  empty datagrams, which terminates the receive loop.
    struct ScriptedSocket {
        script: Mutex<VecDeque<Scripted>>,
    }
    impl ScriptedSocket {
        fn new(script: Vec<Scripted>) -> Arc<ScriptedSocket> {
            Arc::new(ScriptedSocket {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl DatagramSocket for ScriptedSocket {
        async fn recv_datagram(&self, buf: &mut [u8]) -> io::Result<usize> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Datagram(datagram)) => {
                    let len = datagram.len().min(buf.len());
                    buf[..len].copy_from_slice(&datagram[..len]);
                    Ok(len)
                }
                Some(Scripted::Silence) => std::future::pending().await,
                Some(Scripted::Error(kind)) => Err(io::Error::from(kind)),
                None => Ok(0),
            }
        }
    }

    fn datagram(key: u64) -> Scripted {
        let mut buf = Vec::new();
        put_payload(&mut buf, key, 16);
        Scripted::Datagram(buf)
    }

    fn corrupted_datagram(key: u64) -> Scripted {
        let mut buf = Vec::new();
        put_payload(&mut buf, key, 16);
        buf[100] ^= 0x40;
        Scripted::Datagram(buf)
    }

    fn config(max_datagrams: Option<u64>) -> Arc<ReceiveConfig> {
        let mut config = ReceiveConfig::default_for_port(0);
        config.max_datagrams = max_datagrams;
        config.buffer_capacity = 1000;
        config.report_interval = Duration::from_secs(3600);
        Arc::new(config)
    }

    fn sink_expecting_summary(expected: ReceiveSummary) -> MockReportSink {
        let mut sink = MockReportSink::new();
        sink.expect_on_summary()
            .once()
            .withf(move |s| s == &expected)
            .return_const(());
        sink
    }

    async fn run_loop(config: Arc<ReceiveConfig>, script: Vec<Scripted>, sink: MockReportSink) -> ReceiveSummary {
        let (_shutdown_send, shutdown) = watch::channel(false);
        ReceiveLoop::new(config, ScriptedSocket::new(script), Arc::new(sink))
            .unwrap()
            .run(shutdown)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_reached() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 3,
            failed: 0,
            timeouts: 0,
            dropped: 1,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });

        let script = vec![datagram(5), datagram(6), datagram(8), datagram(9)];
        let summary = run_loop(config(Some(3)), script, sink).await;
        assert_eq!(summary.termination, Termination::TargetReached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_counted() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 2,
            failed: 0,
            timeouts: 3,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });

        let script = vec![Scripted::Silence, datagram(1), Scripted::Silence, Scripted::Silence, datagram(2)];
        run_loop(config(Some(2)), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_timeouts() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 2,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });

        let script = vec![
            Scripted::Error(io::ErrorKind::Interrupted),
            datagram(1),
            Scripted::Error(io::ErrorKind::ConnectionRefused),
            Scripted::Error(io::ErrorKind::Interrupted),
            datagram(2),
        ];
        run_loop(config(Some(2)), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_datagram_terminates() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 1,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::InvalidLength(0),
        });

        let script = vec![datagram(1), Scripted::Datagram(vec![]), datagram(2)];
        run_loop(config(None), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_datagram_terminates() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 0,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::InvalidLength(1000),
        });

        let script = vec![Scripted::Datagram(vec![0; 1000]), datagram(1)];
        run_loop(config(None), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_largest_valid_datagram() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 1,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });

        let mut buf = Vec::new();
        put_payload(&mut buf, 3, 124);
        assert_eq!(buf.len(), 992);

        run_loop(config(Some(1)), vec![Scripted::Datagram(buf)], sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_datagrams_are_reported() {
        let mut sink = sink_expecting_summary(ReceiveSummary {
            received: 5,
            failed: 2,
            timeouts: 0,
            dropped: 0,
            out_of_order: 1,
            termination: Termination::TargetReached,
        });
        sink.expect_on_datagram_outcome()
            .once()
            .withf(|o| o.key == Some(2) && o.mismatch_count == 1)
            .return_const(());
        sink.expect_on_datagram_outcome()
            .once()
            .withf(|o| o.key == Some(4) && o.len == 13 && o.mismatch_count == 1)
            .return_const(());

        let mut truncated = Vec::new();
        put_payload(&mut truncated, 4, 2);
        truncated.truncate(13);

        let script = vec![datagram(1), corrupted_datagram(2), datagram(3), Scripted::Datagram(truncated), datagram(2)];
        run_loop(config(Some(5)), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_verbose_reports_every_datagram() {
        let mut config = ReceiveConfig::default_for_port(0);
        config.max_datagrams = Some(3);
        config.verbose = true;
        config.report_interval = Duration::from_secs(3600);

        let mut sink = sink_expecting_summary(ReceiveSummary {
            received: 3,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });
        sink.expect_on_datagram_outcome()
            .times(3)
            .withf(|o| o.is_pass())
            .return_const(());

        run_loop(Arc::new(config), vec![datagram(1), datagram(2), datagram(3)], sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_throughput_report_after_interval() {
        let mut config = ReceiveConfig::default_for_port(0);
        config.max_datagrams = Some(3);
        config.report_interval = Duration::from_secs(1);

        let mut sink = sink_expecting_summary(ReceiveSummary {
            received: 3,
            failed: 0,
            timeouts: 2,
            dropped: 1,
            out_of_order: 0,
            termination: Termination::TargetReached,
        });
        sink.expect_on_throughput_report()
            .once()
            .withf(|r| r.total_received == 2 && r.total_bytes == 256 && r.bytes_since_last_report == 256 && r.total_dropped == 1)
            .return_const(());

        let script = vec![datagram(1), Scripted::Silence, Scripted::Silence, datagram(3), datagram(4)];
        run_loop(Arc::new(config), script, sink).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 1,
            failed: 0,
            timeouts: 5,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::Cancelled,
        });

        let mut script = vec![datagram(1)];
        for _ in 0..100 {
            script.push(Scripted::Silence);
        }

        let (shutdown_send, shutdown) = watch::channel(false);
        let receive_loop = ReceiveLoop::new(config(None), ScriptedSocket::new(script), Arc::new(sink)).unwrap();

        let handle = tokio::spawn(async move {
            receive_loop.run(shutdown).await
        });

        tokio::time::sleep(Duration::from_millis(5500)).await;
        shutdown_send.send(true).unwrap();

        let summary = handle.await.unwrap();
        assert_eq!(summary.termination, Termination::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let sink = sink_expecting_summary(ReceiveSummary {
            received: 0,
            failed: 0,
            timeouts: 0,
            dropped: 0,
            out_of_order: 0,
            termination: Termination::Cancelled,
        });

        let (_shutdown_send, shutdown) = watch::channel(true);
        ReceiveLoop::new(config(None), ScriptedSocket::new(vec![datagram(1)]), Arc::new(sink))
            .unwrap()
            .run(shutdown)
            .await;
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ReceiveConfig::default_for_port(0);
        config.buffer_capacity = 0;

        let result = ReceiveLoop::new(Arc::new(config), ScriptedSocket::new(vec![]), Arc::new(MockReportSink::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_summary_format() {
        let summary = ReceiveSummary {
            received: 1000,
            failed: 2,
            timeouts: 7,
            dropped: 3,
            out_of_order: 1,
            termination: Termination::TargetReached,
        };
        assert_eq!(summary.to_string(), "1000 received, 2 failed, 7 timeouts, 3 dropped, 1 out of order");
    }
}
