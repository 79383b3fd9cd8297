//! Parallel processing of independent sessions
//!
//! Sessions share no state, so a batch is simply mapped over the rayon
//! thread pool with one `MonitorSession` per job.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::session::{MonitorSession, SessionReport};
use crate::types::Frame;
use rayon::prelude::*;
use std::collections::BTreeMap;
use violationtrack::Polygon;

/// Input for one session of a batch
#[derive(Debug, Clone)]
pub struct SessionJob {
    pub session_id: String,
    pub zones: BTreeMap<String, Polygon>,
    /// Frames in timestamp order
    pub frames: Vec<Frame>,
}

impl SessionJob {
    pub fn new(session_id: &str, frames: Vec<Frame>) -> Self {
        Self {
            session_id: session_id.to_string(),
            zones: BTreeMap::new(),
            frames,
        }
    }

    pub fn with_zones(mut self, zones: BTreeMap<String, Polygon>) -> Self {
        self.zones = zones;
        self
    }
}

/// Run a single job to completion on the current thread
pub fn run_session(job: SessionJob, config: &MonitorConfig) -> Result<SessionReport> {
    let mut session = MonitorSession::new(&job.session_id, config.clone())?;
    if !job.zones.is_empty() {
        session.set_zones(job.zones)?;
    }
    for frame in &job.frames {
        session.process_frame(frame);
    }
    Ok(session.finish())
}

/// Run every job in parallel; results keep the order of `jobs`
pub fn run_sessions(jobs: Vec<SessionJob>, config: &MonitorConfig) -> Vec<Result<SessionReport>> {
    log::info!("Running {} sessions in parallel", jobs.len());
    jobs.into_par_iter()
        .map(|job| run_session(job, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Detection;
    use violationtrack::Bbox;

    fn job(id: &str, missing: Option<&str>) -> SessionJob {
        let frames = (0..20)
            .map(|i| {
                let mut dets = vec![
                    Detection::new("person", Bbox::new(0.0, 0.0, 40.0, 100.0), Some(1), 0.9),
                    Detection::new("helmet", Bbox::new(0.0, 0.0, 40.0, 20.0), Some(1), 0.9),
                    Detection::new("vest", Bbox::new(0.0, 30.0, 40.0, 60.0), Some(1), 0.9),
                ];
                if let Some(label) = missing {
                    dets.push(Detection::new(label, Bbox::new(0.0, 0.0, 40.0, 20.0), Some(1), 0.95));
                }
                Frame::new(i, i as f64 * 0.1, dets)
            })
            .collect();
        SessionJob::new(id, frames)
    }

    #[test]
    fn test_sessions_are_independent_and_ordered() {
        let config = MonitorConfig::default();
        let jobs = vec![job("clean", None), job("helmet", Some("no_helmet")), job("clean-2", None)];
        let reports: Vec<SessionReport> = run_sessions(jobs, &config)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();

        let ids: Vec<_> = reports.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["clean", "helmet", "clean-2"]);
        assert!(reports[0].stream.is_empty());
        assert!(!reports[1].stream.is_empty());
        assert!(reports[2].stream.is_empty());
        assert_eq!(reports[0].metrics.compliance_rate, 100.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let config = MonitorConfig::default();
        let sequential = run_session(job("a", Some("no_vest")), &config).unwrap();
        let parallel = run_sessions(vec![job("a", Some("no_vest"))], &config)
            .pop()
            .unwrap()
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_bad_zone_fails_only_its_job() {
        let config = MonitorConfig::default();
        let square =
            Polygon::from_points(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]).unwrap();
        let bad = job("bad", None).with_zones(BTreeMap::from([("".to_string(), square)]));
        let results = run_sessions(vec![bad, job("good", None)], &config);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }
}
