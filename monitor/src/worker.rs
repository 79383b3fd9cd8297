//! Actor-per-session worker
//!
//! A `SessionWorker` owns one `MonitorSession` on a dedicated thread and is
//! fed through a bounded channel, so frames for that session are processed
//! one at a time and in submission order.

use crate::error::{MonitorError, Result};
use crate::session::{FrameReport, MonitorSession, SessionReport};
use crate::types::Frame;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::thread;
use violationtrack::Timestamp;

/// Commands accepted by the worker thread
pub enum SessionCommand {
    Frame(Frame),
    Sweep(Timestamp),
    Finish(Sender<SessionReport>),
}

pub struct SessionWorker {
    session_id: String,
    command_tx: Sender<SessionCommand>,
    report_rx: Receiver<FrameReport>,
    worker_handle: thread::JoinHandle<()>,
}

impl SessionWorker {
    /// Move a session onto its own thread
    ///
    /// `buffer_size` bounds the frame queue; `submit` blocks when it is full.
    pub fn spawn(session: MonitorSession, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        let session_id = session.session_id().to_string();
        let (command_tx, command_rx) = bounded::<SessionCommand>(buffer_size);
        let (report_tx, report_rx) = bounded::<FrameReport>(buffer_size * 2);

        let worker_handle = thread::spawn(move || {
            Self::command_processor(session, command_rx, report_tx);
        });

        Self {
            session_id,
            command_tx,
            report_rx,
            worker_handle,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queue a frame, waiting for room if the queue is full
    pub fn submit(&self, frame: Frame) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Frame(frame))
            .map_err(|_| MonitorError::session_closed(&self.session_id))
    }

    /// Queue a frame without blocking; returns false when the queue is full
    pub fn try_submit(&self, frame: Frame) -> Result<bool> {
        match self.command_tx.try_send(SessionCommand::Frame(frame)) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => Ok(false),
            Err(TrySendError::Disconnected(_)) => {
                Err(MonitorError::session_closed(&self.session_id))
            }
        }
    }

    /// Request a staleness sweep between frames
    pub fn sweep(&self, now: Timestamp) -> Result<()> {
        self.command_tx
            .send(SessionCommand::Sweep(now))
            .map_err(|_| MonitorError::session_closed(&self.session_id))
    }

    /// Next per-frame report, if one is ready
    pub fn try_recv_report(&self) -> Option<FrameReport> {
        self.report_rx.try_recv().ok()
    }

    /// Process every queued frame, stop the thread and return the report
    pub fn finish(self) -> Result<SessionReport> {
        let (reply_tx, reply_rx) = bounded::<SessionReport>(1);
        self.command_tx
            .send(SessionCommand::Finish(reply_tx))
            .map_err(|_| MonitorError::session_closed(&self.session_id))?;
        let report = reply_rx
            .recv()
            .map_err(|_| MonitorError::session_closed(&self.session_id))?;
        self.worker_handle
            .join()
            .map_err(|_| MonitorError::other(format!("worker for {} panicked", self.session_id)))?;
        Ok(report)
    }

    /// Command processor thread - owns the session until Finish
    fn command_processor(
        mut session: MonitorSession,
        command_rx: Receiver<SessionCommand>,
        report_tx: Sender<FrameReport>,
    ) {
        log::info!("Session {} worker started", session.session_id());
        let mut reports_dropped = 0_u64;

        while let Ok(command) = command_rx.recv() {
            match command {
                SessionCommand::Frame(frame) => {
                    let Some(report) = session.process_frame(&frame) else {
                        continue;
                    };
                    if let Err(TrySendError::Full(_)) = report_tx.try_send(report) {
                        reports_dropped += 1;
                        if reports_dropped % 100 == 1 {
                            log::warn!(
                                "Session {}: report queue full, {} frame reports dropped",
                                session.session_id(),
                                reports_dropped
                            );
                        }
                    }
                }
                SessionCommand::Sweep(now) => {
                    session.sweep(now);
                }
                SessionCommand::Finish(reply) => {
                    let report = session.finish();
                    if reply.send(report).is_err() {
                        log::warn!("Session report receiver dropped before finish");
                    }
                    return;
                }
            }
        }

        log::info!(
            "Session {} worker stopped without finish",
            session.session_id()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::types::Detection;
    use std::time::{Duration, Instant};
    use violationtrack::Bbox;

    fn frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| {
                Frame::new(
                    i,
                    i as f64 * 0.1,
                    vec![
                        Detection::new("person", Bbox::new(0.0, 0.0, 40.0, 100.0), Some(1), 0.9),
                        Detection::new("no_helmet", Bbox::new(0.0, 0.0, 40.0, 20.0), Some(1), 0.9),
                    ],
                )
            })
            .collect()
    }

    #[test]
    fn test_worker_matches_inline_session() {
        let mut inline = MonitorSession::new("inline", MonitorConfig::default()).unwrap();
        for frame in frames(30) {
            inline.process_frame(&frame);
        }
        let expected = inline.finish();

        let session = MonitorSession::new("inline", MonitorConfig::default()).unwrap();
        let worker = SessionWorker::spawn(session, 4);
        for frame in frames(30) {
            worker.submit(frame).unwrap();
        }
        let report = worker.finish().unwrap();

        assert_eq!(report, expected);
        assert_eq!(report.frames, 30);
        assert!(report.metrics.counts_by_type.ppe > 0);
    }

    #[test]
    fn test_reports_are_delivered() {
        let session = MonitorSession::new("reports", MonitorConfig::default()).unwrap();
        let worker = SessionWorker::spawn(session, 8);
        for frame in frames(3) {
            worker.submit(frame).unwrap();
        }
        worker.sweep(0.3).unwrap();

        let mut received = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while received.len() < 3 && Instant::now() < deadline {
            match worker.try_recv_report() {
                Some(report) => received.push(report.frame_id),
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        assert_eq!(received, vec![0, 1, 2]);

        let report = worker.finish().unwrap();
        assert_eq!(report.frames, 3);
    }
}
