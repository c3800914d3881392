use std::collections::BTreeMap;

use crate::config::profile::TrackingMode;
use crate::detection::domain::face_detector::DetectedFace;

use super::face_track::FaceTrack;

/// What one reconciliation did, by track id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<u32>,
    pub updated: Vec<u32>,
    pub removed: Vec<u32>,
}

/// The live tracks, keyed by detector track id.
pub struct TrackSet {
    mode: TrackingMode,
    tracks: BTreeMap<u32, FaceTrack>,
}

impl TrackSet {
    pub fn new(mode: TrackingMode) -> Self {
        Self {
            mode,
            tracks: BTreeMap::new(),
        }
    }

    /// Takes effect on the next [`TrackSet::reconcile`].
    pub fn set_mode(&mut self, mode: TrackingMode) {
        if mode != self.mode {
            log::info!("Tracking mode changed to {mode}");
            self.mode = mode;
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&FaceTrack> {
        self.tracks.get(&id)
    }

    /// Tracks in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &FaceTrack> {
        self.tracks.values()
    }

    /// Brings the track set in line with this frame's detections.
    ///
    /// Tracks whose id is gone are cancelled and dropped. `frame_center` is
    /// used by single mode to choose which face to follow.
    pub fn reconcile(
        &mut self,
        detections: &[DetectedFace],
        frame_center: (i32, i32),
    ) -> ReconcileReport {
        let wanted: Vec<DetectedFace> = match self.mode {
            TrackingMode::Multi => detections.to_vec(),
            TrackingMode::Single => self
                .pick_single(detections, frame_center)
                .into_iter()
                .collect(),
        };

        let mut report = ReconcileReport::default();
        let keep: Vec<u32> = wanted.iter().map(|d| d.track_id).collect();
        self.tracks.retain(|id, track| {
            if keep.contains(id) {
                return true;
            }
            track.cancel();
            log::debug!("Track {id} lost, cancelled");
            report.removed.push(*id);
            false
        });

        for face in wanted {
            match self.tracks.get_mut(&face.track_id) {
                Some(track) => {
                    track.set_region(face.region);
                    if !report.updated.contains(&face.track_id) {
                        report.updated.push(face.track_id);
                    }
                }
                None => {
                    log::debug!("Track {} created", face.track_id);
                    self.tracks
                        .insert(face.track_id, FaceTrack::new(face.track_id, face.region));
                    report.created.push(face.track_id);
                }
            }
        }
        report
    }

    /// Keeps following the current face while it is still detected,
    /// otherwise switches to the face nearest the frame center.
    fn pick_single(
        &self,
        detections: &[DetectedFace],
        frame_center: (i32, i32),
    ) -> Option<DetectedFace> {
        let followed = self
            .tracks
            .keys()
            .find_map(|id| detections.iter().find(|d| d.track_id == *id));
        if let Some(face) = followed {
            return Some(*face);
        }
        detections
            .iter()
            .enumerate()
            .min_by_key(|(i, d)| (d.region.manhattan_distance_to(frame_center), *i))
            .map(|(_, d)| *d)
    }

    /// The one track to enrich this frame: the largest eligible region,
    /// lowest id on ties.
    pub fn select_for_update(&self) -> Option<&FaceTrack> {
        let mut best: Option<&FaceTrack> = None;
        for track in self.tracks.values().filter(|t| t.need_update()) {
            match best {
                Some(b) if track.region().area() <= b.region().area() => {}
                _ => best = Some(track),
            }
        }
        best
    }

    /// Cancels and drops every track.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.tracks.len();
        for track in self.tracks.values() {
            track.cancel();
        }
        self.tracks.clear();
        count
    }
}
