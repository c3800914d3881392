/// The per-frame driver: read, detect, reconcile, dispatch, annotate, emit.
///
/// Runs on the caller's thread and never waits on enrichment. Frame-source
/// and detection failures end the run; everything else is logged and
/// absorbed.
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::profile_source::ProfileHandle;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::FPS_WINDOW;
use crate::shared::frame::Frame;
use crate::video::domain::frame_broadcaster::FrameBroadcaster;
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

use super::domain::frame_annotator::{FrameAnnotator, TrackView};
use super::domain::frame_rate::FrameRateCounter;
use super::domain::task_lane::LaneKind;
use super::domain::track_set::{ReconcileReport, TrackSet};
use super::enrichment_service::EnrichmentService;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("frame source failed: {0}")]
    FrameSource(Box<dyn std::error::Error>),
    #[error("face detection failed on frame {frame}: {source}")]
    Detection {
        frame: usize,
        source: Box<dyn std::error::Error>,
    },
}

impl TrackerError {
    /// True when the frame source simply ran out of frames.
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            TrackerError::FrameSource(e) => matches!(
                e.downcast_ref::<FrameSourceError>(),
                Some(FrameSourceError::EndOfStream)
            ),
            TrackerError::Detection { .. } => false,
        }
    }
}

/// Totals for one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: usize,
    pub dispatches: usize,
    pub elapsed: Duration,
}

/// What happened on one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub faces: usize,
    pub reconcile: ReconcileReport,
    /// Track id and lanes submitted, if a track was dispatched.
    pub dispatched: Option<(u32, Vec<LaneKind>)>,
}

pub struct TrackerLoop {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    annotator: Box<dyn FrameAnnotator>,
    broadcaster: Arc<dyn FrameBroadcaster>,
    enrichment: EnrichmentService,
    profile: ProfileHandle,
    tracks: TrackSet,
    fps: FrameRateCounter,
}

impl TrackerLoop {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        annotator: Box<dyn FrameAnnotator>,
        broadcaster: Arc<dyn FrameBroadcaster>,
        enrichment: EnrichmentService,
        profile: ProfileHandle,
    ) -> Self {
        let mode = profile.current().mode;
        Self {
            source,
            detector,
            annotator,
            broadcaster,
            enrichment,
            profile,
            tracks: TrackSet::new(mode),
            fps: FrameRateCounter::new(FPS_WINDOW),
        }
    }

    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    /// Runs until the profile turns the server off or a frame cannot be
    /// read or analysed. Live tracks are cancelled on the way out, and the
    /// enrichment workers are joined when the loop is dropped.
    pub fn run(mut self) -> Result<RunSummary, TrackerError> {
        let started = Instant::now();
        let mut frames = 0;
        let mut dispatches = 0;
        let mut profile = self.profile.current();
        log::info!("Tracker started in {} mode", profile.mode);

        let result = loop {
            self.tracks.set_mode(profile.mode);
            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) => break Err(TrackerError::FrameSource(e)),
            };
            match self.process_frame(frame) {
                Ok(report) => {
                    if report.dispatched.is_some() {
                        dispatches += 1;
                    }
                }
                Err(e) => break Err(e),
            }
            frames += 1;
            if let Some(fps) = self.fps.tick() {
                log::info!("FPS: {fps:.2}");
            }

            profile = self.profile.current();
            if !profile.server_on {
                log::info!("Server switched off, stopping tracker");
                break Ok(());
            }
        };

        let cancelled = self.tracks.cancel_all();
        let summary = RunSummary {
            frames,
            dispatches,
            elapsed: started.elapsed(),
        };
        log::info!(
            "Tracker ran {:.1}s over {} frames ({} dispatches, {} tracks cancelled)",
            summary.elapsed.as_secs_f64(),
            summary.frames,
            summary.dispatches,
            cancelled
        );
        result.map(|()| summary)
    }

    /// One frame through detection, reconciliation, dispatch, annotation and
    /// broadcast.
    pub fn process_frame(&mut self, mut frame: Frame) -> Result<FrameReport, TrackerError> {
        let detections = self
            .detector
            .detect(&frame)
            .map_err(|source| TrackerError::Detection {
                frame: frame.index(),
                source,
            })?;
        let reconcile = self.tracks.reconcile(&detections, frame.center());

        let dispatched = self.tracks.select_for_update().and_then(|track| {
            let lanes = self.enrichment.dispatch(track, &frame);
            (!lanes.is_empty()).then(|| (track.id(), lanes))
        });

        let views: Vec<TrackView> = self.tracks.iter().map(TrackView::from).collect();
        self.annotator.annotate(&mut frame, &views);
        self.broadcaster.broadcast(frame);

        Ok(FrameReport {
            faces: detections.len(),
            reconcile,
            dispatched,
        })
    }
}
