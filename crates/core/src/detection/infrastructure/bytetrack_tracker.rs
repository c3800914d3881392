/// Simplified ByteTrack association, used to give detections stable ids.
///
/// High-confidence detections are matched to existing tracks first, then
/// low-confidence detections may keep an otherwise unmatched track alive.
/// Only high-confidence detections can open a new track.
use std::collections::HashSet;

use super::math::{bbox_iou, ScoredBox};

const HIGH_THRESH: f64 = 0.5;
const MATCH_THRESH: f64 = 0.3;

/// A detection that was associated with a track this frame.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackedBox {
    pub id: u32,
    pub bbox: [f64; 4],
    pub score: f64,
}

#[derive(Clone, Debug)]
struct TrackState {
    id: u32,
    bbox: [f64; 4],
    frames_lost: usize,
}

pub struct ByteTracker {
    tracks: Vec<TrackState>,
    next_id: u32,
    max_lost: usize,
}

impl ByteTracker {
    pub fn new(max_lost: usize) -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
            max_lost,
        }
    }

    /// Associates this frame's detections and returns the matched ones,
    /// ordered by track id.
    pub fn update(&mut self, detections: &[ScoredBox]) -> Vec<TrackedBox> {
        let (high, low): (Vec<usize>, Vec<usize>) =
            (0..detections.len()).partition(|&i| detections[i].score >= HIGH_THRESH);

        let mut matched_tracks: HashSet<usize> = HashSet::new();
        let mut out = Vec::new();

        let all_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let high_pairs = greedy_match(&self.tracks, &all_tracks, detections, &high);
        let mut used_high: HashSet<usize> = HashSet::new();
        for (ti, di) in high_pairs {
            self.apply(ti, &detections[di], &mut out);
            matched_tracks.insert(ti);
            used_high.insert(di);
        }

        let remaining: Vec<usize> = all_tracks
            .iter()
            .copied()
            .filter(|ti| !matched_tracks.contains(ti))
            .collect();
        for (ti, di) in greedy_match(&self.tracks, &remaining, detections, &low) {
            self.apply(ti, &detections[di], &mut out);
            matched_tracks.insert(ti);
        }

        for (ti, track) in self.tracks.iter_mut().enumerate() {
            if !matched_tracks.contains(&ti) {
                track.frames_lost += 1;
            }
        }
        let max_lost = self.max_lost;
        self.tracks.retain(|t| t.frames_lost <= max_lost);

        for di in high.into_iter().filter(|di| !used_high.contains(di)) {
            let det = &detections[di];
            self.tracks.push(TrackState {
                id: self.next_id,
                bbox: det.bbox,
                frames_lost: 0,
            });
            out.push(TrackedBox {
                id: self.next_id,
                bbox: det.bbox,
                score: det.score,
            });
            self.next_id += 1;
        }

        out.sort_by_key(|t| t.id);
        out
    }

    fn apply(&mut self, track_idx: usize, det: &ScoredBox, out: &mut Vec<TrackedBox>) {
        let track = &mut self.tracks[track_idx];
        track.bbox = det.bbox;
        track.frames_lost = 0;
        out.push(TrackedBox {
            id: track.id,
            bbox: det.bbox,
            score: det.score,
        });
    }
}

/// Greedy IoU matching between the given track and detection indices:
/// pairs by descending IoU, each side used at most once.
fn greedy_match(
    tracks: &[TrackState],
    track_idx: &[usize],
    detections: &[ScoredBox],
    det_idx: &[usize],
) -> Vec<(usize, usize)> {
    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for &ti in track_idx {
        for &di in det_idx {
            let iou = bbox_iou(&tracks[ti].bbox, &detections[di].bbox);
            if iou >= MATCH_THRESH {
                pairs.push((ti, di, iou));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

    let mut used_tracks = HashSet::new();
    let mut used_dets = HashSet::new();
    let mut matches = Vec::new();
    for (ti, di, _) in pairs {
        if !used_tracks.contains(&ti) && !used_dets.contains(&di) {
            used_tracks.insert(ti);
            used_dets.insert(di);
            matches.push((ti, di));
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> ScoredBox {
        ScoredBox {
            bbox: [x1, y1, x2, y2],
            score,
        }
    }

    #[test]
    fn test_new_detections_get_unique_ids() {
        let mut tracker = ByteTracker::new(5);
        let tracks = tracker.update(&[
            det(0.0, 0.0, 50.0, 50.0, 0.9),
            det(100.0, 100.0, 150.0, 150.0, 0.8),
        ]);
        assert_eq!(tracks.len(), 2);
        assert_ne!(tracks[0].id, tracks[1].id);
    }

    #[test]
    fn test_consistent_id_across_frames() {
        let mut tracker = ByteTracker::new(5);
        let id = tracker.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)])[0].id;

        let t2 = tracker.update(&[det(12.0, 12.0, 62.0, 62.0, 0.9)]);

        assert_eq!(t2.len(), 1);
        assert_eq!(t2[0].id, id);
        assert_eq!(t2[0].bbox, [12.0, 12.0, 62.0, 62.0]);
    }

    #[test]
    fn test_lost_track_is_retired() {
        let mut tracker = ByteTracker::new(1);
        let id = tracker.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)])[0].id;

        tracker.update(&[]);
        tracker.update(&[]);
        let t = tracker.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)]);

        assert_ne!(t[0].id, id);
    }

    #[test]
    fn test_track_survives_within_max_lost() {
        let mut tracker = ByteTracker::new(3);
        let id = tracker.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)])[0].id;

        tracker.update(&[]);
        tracker.update(&[]);
        let t = tracker.update(&[det(12.0, 12.0, 62.0, 62.0, 0.9)]);

        assert_eq!(t[0].id, id);
    }

    #[test]
    fn test_low_confidence_keeps_existing_track() {
        let mut tracker = ByteTracker::new(5);
        let id = tracker.update(&[det(10.0, 10.0, 60.0, 60.0, 0.9)])[0].id;

        let t = tracker.update(&[det(12.0, 12.0, 62.0, 62.0, 0.3)]);

        assert_eq!(t.len(), 1);
        assert_eq!(t[0].id, id);
    }

    #[test]
    fn test_low_confidence_does_not_open_track() {
        let mut tracker = ByteTracker::new(5);
        assert!(tracker
            .update(&[det(10.0, 10.0, 60.0, 60.0, 0.3)])
            .is_empty());
    }

    #[test]
    fn test_output_sorted_by_id() {
        let mut tracker = ByteTracker::new(5);
        tracker.update(&[det(0.0, 0.0, 50.0, 50.0, 0.9)]);
        let t = tracker.update(&[
            det(300.0, 300.0, 350.0, 350.0, 0.9),
            det(1.0, 1.0, 51.0, 51.0, 0.9),
        ]);
        let ids: Vec<u32> = t.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
