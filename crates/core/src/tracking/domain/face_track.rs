use std::sync::{Arc, Mutex, MutexGuard};

use crate::recognition::domain::feature::{FaceAttributes, Gender};
use crate::shared::region::Region;

use super::task_lane::{LaneKind, LaneTicket, TaskLane};

/// Enrichment results for one track. Empty name and unset attributes mean
/// "not resolved yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackInfo {
    pub name: String,
    pub score: f32,
    pub attributes: Option<FaceAttributes>,
}

impl TrackInfo {
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && self.attributes.is_some()
    }

    /// Compact overlay text: name and score, liveness, gender, age.
    /// Unresolved parts are left out; a fresh track renders as "".
    pub fn status_line(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.name.is_empty() {
            parts.push(self.name.clone());
            parts.push(format!("{:.2}", self.score));
        }
        if let Some(attrs) = &self.attributes {
            parts.push(if attrs.liveness { "live" } else { "spoof" }.to_string());
            parts.push(
                match attrs.gender {
                    Gender::Male => "M",
                    Gender::Female => "F",
                }
                .to_string(),
            );
            parts.push(attrs.age.to_string());
        }
        parts.join(",")
    }
}

/// The part of a track shared with in-flight enrichment jobs.
///
/// Commits and cancellation both happen under the `info` lock, so a result
/// either lands before a cancel or is discarded.
#[derive(Debug, Default)]
pub struct TrackState {
    info: Mutex<TrackInfo>,
    identity: TaskLane,
    attributes: TaskLane,
}

impl TrackState {
    fn lock(&self) -> MutexGuard<'_, TrackInfo> {
        self.info.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn info(&self) -> TrackInfo {
        self.lock().clone()
    }

    pub fn lane(&self, kind: LaneKind) -> &TaskLane {
        match kind {
            LaneKind::Identity => &self.identity,
            LaneKind::Attributes => &self.attributes,
        }
    }

    /// True while the lane's result is still missing.
    pub fn needs(&self, kind: LaneKind) -> bool {
        let info = self.lock();
        match kind {
            LaneKind::Identity => info.name.is_empty(),
            LaneKind::Attributes => info.attributes.is_none(),
        }
    }

    /// Records an identity result unless the track was cancelled. Returns
    /// whether the result was kept.
    pub fn commit_identity(&self, ticket: &LaneTicket, name: String, score: f32) -> bool {
        let mut info = self.lock();
        if ticket.is_cancelled() {
            return false;
        }
        info.name = name;
        info.score = score;
        true
    }

    pub fn commit_attributes(&self, ticket: &LaneTicket, attributes: FaceAttributes) -> bool {
        let mut info = self.lock();
        if ticket.is_cancelled() {
            return false;
        }
        info.attributes = Some(attributes);
        true
    }

    pub fn cancel(&self) {
        let _info = self.lock();
        self.identity.cancel();
        self.attributes.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.identity.is_cancelled()
    }

    pub fn reset(&self) {
        *self.lock() = TrackInfo::default();
    }
}

/// One currently visible face.
#[derive(Debug)]
pub struct FaceTrack {
    id: u32,
    region: Region,
    state: Arc<TrackState>,
}

impl FaceTrack {
    pub fn new(id: u32, region: Region) -> Self {
        Self {
            id,
            region,
            state: Arc::new(TrackState::default()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn set_region(&mut self, region: Region) {
        self.region = region;
    }

    pub fn state(&self) -> &Arc<TrackState> {
        &self.state
    }

    pub fn info(&self) -> TrackInfo {
        self.state.info()
    }

    pub fn is_complete(&self) -> bool {
        self.state.info().is_complete()
    }

    /// Eligible for dispatch: big enough, at least one lane free, and not
    /// yet fully resolved.
    pub fn need_update(&self) -> bool {
        self.region.is_large_enough()
            && !(self.state.identity.is_busy() && self.state.attributes.is_busy())
            && !self.is_complete()
    }

    /// Clears all results so the track is enriched again.
    pub fn reset(&self) {
        self.state.reset();
    }

    /// Signals both lanes; in-flight results are discarded.
    pub fn cancel(&self) {
        self.state.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn attrs() -> FaceAttributes {
        FaceAttributes {
            liveness: true,
            age: 29,
            gender: Gender::Female,
        }
    }

    fn track(width: i32, height: i32) -> FaceTrack {
        FaceTrack::new(1, Region::new(0, 0, width, height))
    }

    fn complete(track: &FaceTrack) {
        let state = track.state();
        let ticket = state.lane(LaneKind::Identity).try_acquire().unwrap();
        state.commit_identity(&ticket, "alice".into(), 0.9);
        drop(ticket);
        let ticket = state.lane(LaneKind::Attributes).try_acquire().unwrap();
        state.commit_attributes(&ticket, attrs());
    }

    #[rstest]
    #[case::large(80, 80, true)]
    #[case::exactly_min(50, 50, true)]
    #[case::narrow(49, 80, false)]
    #[case::short(80, 49, false)]
    fn test_need_update_requires_min_size(
        #[case] width: i32,
        #[case] height: i32,
        #[case] expected: bool,
    ) {
        assert_eq!(track(width, height).need_update(), expected);
    }

    #[test]
    fn test_need_update_false_when_both_lanes_busy() {
        let t = track(80, 80);
        let _id = t.state().lane(LaneKind::Identity).try_acquire().unwrap();
        assert!(t.need_update());

        let _attr = t.state().lane(LaneKind::Attributes).try_acquire().unwrap();
        assert!(!t.need_update());
    }

    #[test]
    fn test_complete_track_never_needs_update_until_reset() {
        let mut t = track(80, 80);
        complete(&t);

        assert!(t.is_complete());
        assert!(!t.need_update());
        t.set_region(Region::new(0, 0, 300, 300));
        assert!(!t.need_update());

        t.reset();
        assert!(!t.is_complete());
        assert!(t.need_update());
    }

    #[test]
    fn test_name_alone_is_not_complete() {
        let t = track(80, 80);
        let ticket = t.state().lane(LaneKind::Identity).try_acquire().unwrap();
        t.state().commit_identity(&ticket, "alice".into(), 0.9);
        assert!(!t.is_complete());
        assert!(!t.state().needs(LaneKind::Identity));
        assert!(t.state().needs(LaneKind::Attributes));
    }

    #[test]
    fn test_commit_after_cancel_is_discarded() {
        let t = track(80, 80);
        let ticket = t.state().lane(LaneKind::Identity).try_acquire().unwrap();

        t.cancel();

        assert!(!t.state().commit_identity(&ticket, "alice".into(), 0.9));
        assert_eq!(t.info(), TrackInfo::default());
        assert!(t.state().is_cancelled());
    }

    #[test]
    fn test_attributes_commit_after_cancel_is_discarded() {
        let t = track(80, 80);
        let ticket = t.state().lane(LaneKind::Attributes).try_acquire().unwrap();
        t.cancel();
        assert!(!t.state().commit_attributes(&ticket, attrs()));
        assert!(t.info().attributes.is_none());
    }

    #[rstest]
    #[case::fresh(TrackInfo::default(), "")]
    #[case::named(TrackInfo { name: "bob".into(), score: 0.8712, attributes: None }, "bob,0.87")]
    #[case::attributes_only(
        TrackInfo { attributes: Some(FaceAttributes { liveness: false, age: 34, gender: Gender::Male }), ..TrackInfo::default() },
        "spoof,M,34"
    )]
    #[case::complete(
        TrackInfo { name: "alice".into(), score: 0.9, attributes: Some(FaceAttributes { liveness: true, age: 29, gender: Gender::Female }) },
        "alice,0.90,live,F,29"
    )]
    fn test_status_line(#[case] info: TrackInfo, #[case] expected: &str) {
        assert_eq!(info.status_line(), expected);
    }
}
