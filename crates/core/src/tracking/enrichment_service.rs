/// Background enrichment of face tracks.
///
/// Two worker threads, one per lane kind, take jobs from crossbeam
/// channels. Each job carries the lane ticket it was dispatched with, so a
/// lane frees itself when its job ends however it ends.
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::recognition::domain::face_analyzer::FaceAnalyzer;
use crate::recognition::domain::feature_store::FeatureStore;
use crate::recognition::domain::match_notifier::MatchNotifier;
use crate::recognition::domain::similarity_matcher::best_match;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::domain::face_track::{FaceTrack, TrackState};
use super::domain::task_lane::{LaneKind, LaneTicket};

/// Everything the workers share.
#[derive(Clone)]
pub struct EnrichmentContext {
    pub analyzer: Arc<dyn FaceAnalyzer>,
    pub store: FeatureStore,
    pub notifier: Arc<dyn MatchNotifier>,
    pub match_threshold: f32,
}

struct LaneJob {
    track_id: u32,
    state: Arc<TrackState>,
    ticket: LaneTicket,
    frame: Arc<Frame>,
    region: Region,
}

pub struct EnrichmentService {
    identity_tx: Option<Sender<LaneJob>>,
    attributes_tx: Option<Sender<LaneJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl EnrichmentService {
    pub fn start(context: EnrichmentContext) -> std::io::Result<Self> {
        let (identity_tx, identity_rx) = crossbeam_channel::unbounded();
        let (attributes_tx, attributes_rx) = crossbeam_channel::unbounded();

        let ctx = context.clone();
        let identity = std::thread::Builder::new()
            .name("identity-lane".into())
            .spawn(move || worker_loop(&identity_rx, |job| run_identity(&ctx, job)))?;
        let ctx = context;
        let attributes = std::thread::Builder::new()
            .name("attributes-lane".into())
            .spawn(move || worker_loop(&attributes_rx, |job| run_attributes(&ctx, job)))?;

        Ok(Self {
            identity_tx: Some(identity_tx),
            attributes_tx: Some(attributes_tx),
            workers: vec![identity, attributes],
        })
    }

    /// Submits every lane of `track` that still lacks a result and is not
    /// already busy. Returns the lanes that were submitted.
    ///
    /// The frame is copied once and shared by the submitted jobs.
    pub fn dispatch(&self, track: &FaceTrack, frame: &Frame) -> Vec<LaneKind> {
        let state = track.state();
        let mut snapshot: Option<Arc<Frame>> = None;
        let mut submitted = Vec::new();

        for kind in [LaneKind::Identity, LaneKind::Attributes] {
            if !state.needs(kind) {
                continue;
            }
            let Some(ticket) = state.lane(kind).try_acquire() else {
                continue;
            };
            let frame = snapshot
                .get_or_insert_with(|| Arc::new(frame.clone()))
                .clone();
            let job = LaneJob {
                track_id: track.id(),
                state: Arc::clone(state),
                ticket,
                frame,
                region: track.region(),
            };
            let tx = match kind {
                LaneKind::Identity => self.identity_tx.as_ref(),
                LaneKind::Attributes => self.attributes_tx.as_ref(),
            };
            match tx.map(|tx| tx.send(job)) {
                Some(Ok(())) => {
                    log::debug!("Track {}: {kind} job dispatched", track.id());
                    submitted.push(kind);
                }
                _ => log::warn!("Track {}: {kind} worker is not running", track.id()),
            }
        }
        submitted
    }

    /// Closes the job queues, lets queued jobs finish and joins the workers.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.identity_tx.take();
        self.attributes_tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("Enrichment worker panicked");
            }
        }
    }
}

impl Drop for EnrichmentService {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(rx: &Receiver<LaneJob>, mut run: impl FnMut(LaneJob)) {
    for job in rx {
        if job.ticket.is_cancelled() {
            log::debug!("Track {}: job cancelled before start", job.track_id);
            continue;
        }
        run(job);
    }
}

fn run_identity(ctx: &EnrichmentContext, job: LaneJob) {
    let feature = match ctx.analyzer.extract_feature(&job.frame, &job.region) {
        Ok(feature) => feature,
        Err(e) => {
            log::debug!("Track {}: feature extraction failed: {e}", job.track_id);
            job.state.commit_identity(&job.ticket, String::new(), 0.0);
            return;
        }
    };

    if job.ticket.is_cancelled() {
        log::debug!("Track {}: identity cancelled", job.track_id);
        return;
    }

    let result = best_match(&feature, &ctx.store.snapshot(), ctx.analyzer.as_ref());
    if result.is_confident(ctx.match_threshold) {
        log::debug!(
            "Track {}: matched {} ({:.2})",
            job.track_id,
            result.name,
            result.score
        );
        if job
            .state
            .commit_identity(&job.ticket, result.name.clone(), result.score)
        {
            ctx.notifier.notify(&result.name);
        } else {
            log::debug!("Track {}: identity cancelled", job.track_id);
        }
    } else {
        log::debug!(
            "Track {}: no match, closest {:?} at {:.2}",
            job.track_id,
            result.name,
            result.score
        );
        job.state.commit_identity(&job.ticket, String::new(), 0.0);
    }
}

fn run_attributes(ctx: &EnrichmentContext, job: LaneJob) {
    match ctx.analyzer.compute_attributes(&job.frame, &job.region) {
        Ok(attributes) => {
            if !job.state.commit_attributes(&job.ticket, attributes) {
                log::debug!("Track {}: attributes cancelled", job.track_id);
            }
        }
        Err(e) => log::debug!("Track {}: attribute analysis failed: {e}", job.track_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::domain::face_analyzer::AnalysisError;
    use crate::recognition::domain::feature::{FaceAttributes, FeatureVector, Gender};
    use crate::recognition::domain::feature_source::FeatureRecord;
    use crate::recognition::domain::feature_store::FeatureMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const QUERY: u8 = 1;

    fn attrs() -> FaceAttributes {
        FaceAttributes {
            liveness: true,
            age: 41,
            gender: Gender::Male,
        }
    }

    /// Blocks feature extraction (and comparison) until the test releases the
    /// matching gate. A gate whose sender is gone lets every call through.
    struct GatedAnalyzer {
        gate: Receiver<()>,
        compare_gate: Receiver<()>,
        extractions: AtomicUsize,
        comparisons: AtomicUsize,
        attributes: Option<FaceAttributes>,
    }

    impl FaceAnalyzer for GatedAnalyzer {
        fn extract_feature(&self, _: &Frame, _: &Region) -> Result<FeatureVector, AnalysisError> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            let _ = self.gate.recv();
            Ok(FeatureVector::new(vec![QUERY]))
        }

        fn compute_attributes(&self, _: &Frame, _: &Region) -> Result<FaceAttributes, AnalysisError> {
            self.attributes
                .ok_or(AnalysisError::ModelUnavailable("attributes"))
        }

        fn compare(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
            self.comparisons.fetch_add(1, Ordering::SeqCst);
            let _ = self.compare_gate.recv();
            if a == b {
                0.9
            } else {
                0.1
            }
        }
    }

    struct Harness {
        service: EnrichmentService,
        analyzer: Arc<GatedAnalyzer>,
        notified: Arc<Mutex<Vec<String>>>,
        gate: Option<Sender<()>>,
        compare_gate: Option<Sender<()>>,
    }

    fn harness(enrolled: u8, attributes: Option<FaceAttributes>, gated: bool) -> Harness {
        harness_with(enrolled, attributes, gated, false)
    }

    fn harness_with(
        enrolled: u8,
        attributes: Option<FaceAttributes>,
        gated: bool,
        compare_gated: bool,
    ) -> Harness {
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let (compare_tx, compare_rx) = crossbeam_channel::unbounded();
        let analyzer = Arc::new(GatedAnalyzer {
            gate: gate_rx,
            compare_gate: compare_rx,
            extractions: AtomicUsize::new(0),
            comparisons: AtomicUsize::new(0),
            attributes,
        });
        let store = FeatureStore::new();
        store.replace(FeatureMap::from_records(vec![FeatureRecord {
            name: "alice".into(),
            feature: FeatureVector::new(vec![enrolled]),
        }]));
        let notified = Arc::new(Mutex::new(Vec::new()));
        let sink = notified.clone();
        let notifier: Arc<dyn MatchNotifier> =
            Arc::new(move |name: &str| sink.lock().unwrap().push(name.to_string()));
        let service = EnrichmentService::start(EnrichmentContext {
            analyzer: analyzer.clone(),
            store,
            notifier,
            match_threshold: 0.6,
        })
        .unwrap();
        Harness {
            service,
            analyzer,
            notified,
            gate: if gated { Some(gate_tx) } else { None },
            compare_gate: if compare_gated { Some(compare_tx) } else { None },
        }
    }

    fn frame() -> Frame {
        Frame::filled(200, 200, [90, 90, 90], 0)
    }

    fn track() -> FaceTrack {
        FaceTrack::new(3, Region::new(20, 20, 80, 80))
    }

    fn wait_for(counter: &AtomicUsize, n: usize) {
        while counter.load(Ordering::SeqCst) < n {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_confident_match_is_committed_and_notified() {
        let h = harness(QUERY, Some(attrs()), false);
        let t = track();

        let lanes = h.service.dispatch(&t, &frame());
        h.service.shutdown();

        assert_eq!(lanes, vec![LaneKind::Identity, LaneKind::Attributes]);
        let info = t.info();
        assert_eq!(info.name, "alice");
        assert!((info.score - 0.9).abs() < 1e-6);
        assert_eq!(info.attributes, Some(attrs()));
        assert!(t.is_complete());
        assert_eq!(*h.notified.lock().unwrap(), vec!["alice".to_string()]);
    }

    #[test]
    fn test_weak_match_leaves_name_empty() {
        let h = harness(QUERY + 1, None, false);
        let t = track();

        h.service.dispatch(&t, &frame());
        h.service.shutdown();

        assert_eq!(t.info().name, "");
        assert_eq!(t.info().score, 0.0);
        assert!(h.notified.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_double_dispatch_while_identity_in_flight() {
        let mut h = harness(QUERY, None, true);
        let t = track();
        let f = frame();

        let first = h.service.dispatch(&t, &f);
        wait_for(&h.analyzer.extractions, 1);
        let second = h.service.dispatch(&t, &f);

        assert!(first.contains(&LaneKind::Identity));
        assert!(!second.contains(&LaneKind::Identity));

        h.gate.take();
        h.service.shutdown();
        assert_eq!(h.analyzer.extractions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_discards_in_flight_identity() {
        let mut h = harness(QUERY, None, true);
        let t = track();

        h.service.dispatch(&t, &frame());
        wait_for(&h.analyzer.extractions, 1);
        t.cancel();
        h.gate.take();
        h.service.shutdown();

        assert_eq!(t.info().name, "");
        assert!(h.notified.lock().unwrap().is_empty());
        assert!(!t.state().lane(LaneKind::Identity).is_busy());
    }

    #[test]
    fn test_cancel_while_matching_discards_result_without_notifying() {
        let mut h = harness_with(QUERY, None, false, true);
        let t = track();

        h.service.dispatch(&t, &frame());
        wait_for(&h.analyzer.comparisons, 1);
        t.cancel();
        h.compare_gate.take();
        h.service.shutdown();

        assert_eq!(t.info().name, "");
        assert_eq!(t.info().score, 0.0);
        assert!(h.notified.lock().unwrap().is_empty());
        assert!(!t.state().lane(LaneKind::Identity).is_busy());
    }

    #[test]
    fn test_failed_attributes_leave_fields_unset_and_free_lane() {
        let h = harness(QUERY, None, false);
        let t = track();

        h.service.dispatch(&t, &frame());
        h.service.shutdown();

        assert!(t.info().attributes.is_none());
        assert!(!t.state().lane(LaneKind::Attributes).is_busy());
        assert!(t.need_update());
    }

    #[test]
    fn test_dispatch_skips_resolved_lanes() {
        let h = harness(QUERY, Some(attrs()), false);
        let t = track();
        let ticket = t.state().lane(LaneKind::Identity).try_acquire().unwrap();
        t.state().commit_identity(&ticket, "bob".into(), 0.8);
        drop(ticket);

        let lanes = h.service.dispatch(&t, &frame());
        h.service.shutdown();

        assert_eq!(lanes, vec![LaneKind::Attributes]);
        assert_eq!(h.analyzer.extractions.load(Ordering::SeqCst), 0);
        assert_eq!(t.info().name, "bob");
    }

    #[test]
    fn test_job_for_cancelled_track_never_runs() {
        let h = harness(QUERY, None, false);
        let t = track();
        t.cancel();

        h.service.dispatch(&t, &frame());
        h.service.shutdown();

        assert_eq!(h.analyzer.extractions.load(Ordering::SeqCst), 0);
        assert!(!t.state().lane(LaneKind::Identity).is_busy());
    }
}
