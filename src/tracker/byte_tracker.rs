//! ByteTrack association: high-score matching, low-score recovery, then
//! confirmation of fresh tracks.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::detection::{BoundingBox, TrackId};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::strack::STrack;
use crate::tracker::track_state::TrackState;

/// Configuration for the ByteTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score take part in the first association.
    pub track_thresh: f32,
    /// Detections at or below this score are ignored entirely.
    pub low_thresh: f32,
    pub match_thresh: f32,
    /// Frames a lost track is kept for re-identification, at 30 fps.
    pub track_buffer: u32,
    pub frame_rate: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            track_thresh: 0.5,
            low_thresh: 0.1,
            match_thresh: 0.8,
            track_buffer: 30,
            frame_rate: 30.0,
        }
    }
}

const SECOND_MATCH_THRESH: f32 = 0.5;
const UNCONFIRMED_MATCH_THRESH: f32 = 0.7;
const NEW_TRACK_MARGIN: f32 = 0.1;
const DUPLICATE_IOU: f32 = 0.85;

/// Multi-object tracker assigning stable identities across frames.
///
/// Identities come from a counter owned by the tracker, so two trackers
/// never hand out correlated identities.
pub struct ByteTracker {
    tracked: Vec<STrack>,
    lost: Vec<STrack>,
    frame_id: u32,
    last_id: TrackId,
    max_time_lost: u32,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
}

fn boxes<'a>(tracks: impl IntoIterator<Item = &'a STrack>) -> Vec<BoundingBox> {
    tracks.into_iter().map(STrack::bbox).collect()
}

impl ByteTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let max_time_lost = (config.frame_rate / 30.0 * config.track_buffer as f32) as u32;
        Self {
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_id: 0,
            last_id: 0,
            max_time_lost,
            config,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Drop all tracks and restart identity numbering.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.lost.clear();
        self.frame_id = 0;
        self.last_id = 0;
    }

    /// Number of live (tracked or lost) tracklets.
    pub fn len(&self) -> usize {
        self.tracked.len() + self.lost.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_id(&mut self) -> TrackId {
        self.last_id += 1;
        self.last_id
    }

    /// Associate one frame of detections.
    ///
    /// Returns, for every input detection in input order, the identity of the
    /// confirmed track it was assigned to, or `None`.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Option<TrackId>> {
        self.frame_id += 1;
        let frame_id = self.frame_id;
        let kf = self.kalman_filter.clone();

        let mut high = Vec::new();
        let mut low = Vec::new();
        for (i, det) in detections.iter().enumerate() {
            if det.score >= self.config.track_thresh {
                high.push(STrack::new(det.bbox, det.score, i));
            } else if det.score > self.config.low_thresh {
                low.push(STrack::new(det.bbox, det.score, i));
            }
        }

        let (mut unconfirmed, confirmed): (Vec<_>, Vec<_>) =
            self.tracked.drain(..).partition(|t| !t.is_activated);
        let mut pool = join_stracks(confirmed, self.lost.drain(..));
        for track in pool.iter_mut() {
            track.predict(&kf);
        }

        let mut activated = Vec::new();
        let mut lost = Vec::new();

        // First association: every pooled track against high-score detections
        let mut dists = matching::iou_distance(&boxes(&pool), &boxes(&high));
        let high_scores: Vec<f32> = high.iter().map(|t| t.score).collect();
        matching::fuse_score(&mut dists, &high_scores);
        let first = matching::linear_assignment(&dists, self.config.match_thresh);

        let mut pool: Vec<Option<STrack>> = pool.into_iter().map(Some).collect();
        for &(ti, di) in &first.matches {
            if let Some(mut track) = pool[ti].take() {
                if track.state == TrackState::Tracked {
                    track.update(&high[di], &kf, frame_id);
                } else {
                    track.re_activate(&high[di], &kf, frame_id);
                }
                activated.push(track);
            }
        }

        // Second association: still-tracked leftovers against low-score detections
        let (remaining_tracked, still_lost): (Vec<_>, Vec<_>) = first
            .unmatched_tracks
            .iter()
            .filter_map(|&ti| pool[ti].take())
            .partition(|t| t.state == TrackState::Tracked);
        lost.extend(still_lost);

        let dists = matching::iou_distance(&boxes(&remaining_tracked), &boxes(&low));
        let AssignmentResult {
            matches,
            unmatched_tracks,
            ..
        } = matching::linear_assignment(&dists, SECOND_MATCH_THRESH);

        let mut remaining_tracked: Vec<Option<STrack>> =
            remaining_tracked.into_iter().map(Some).collect();
        for (ti, di) in matches {
            if let Some(mut track) = remaining_tracked[ti].take() {
                track.update(&low[di], &kf, frame_id);
                activated.push(track);
            }
        }
        for ti in unmatched_tracks {
            if let Some(mut track) = remaining_tracked[ti].take() {
                track.mark_lost();
                lost.push(track);
            }
        }

        // Unconfirmed tracks only get the high-score detections nobody claimed
        let leftover: Vec<&STrack> = first.unmatched_detections.iter().map(|&di| &high[di]).collect();
        let mut dists = matching::iou_distance(&boxes(unconfirmed.iter()), &boxes(leftover.iter().copied()));
        let leftover_scores: Vec<f32> = leftover.iter().map(|t| t.score).collect();
        matching::fuse_score(&mut dists, &leftover_scores);
        let third = matching::linear_assignment(&dists, UNCONFIRMED_MATCH_THRESH);

        let mut confirmed_now = HashSet::new();
        for &(ti, li) in &third.matches {
            unconfirmed[ti].update(leftover[li], &kf, frame_id);
            confirmed_now.insert(ti);
        }
        activated.extend(
            unconfirmed
                .into_iter()
                .enumerate()
                .filter_map(|(ti, t)| confirmed_now.contains(&ti).then_some(t)),
        );

        // Births
        for li in third.unmatched_detections {
            let mut track = leftover[li].clone();
            if track.score < self.config.track_thresh + NEW_TRACK_MARGIN {
                continue;
            }
            let id = self.next_id();
            track.activate(&kf, frame_id, id);
            trace!(track_id = id, frame_id, "new track");
            activated.push(track);
        }

        let max_time_lost = self.max_time_lost;
        lost.retain(|t| frame_id - t.frame_id <= max_time_lost);

        let (tracked, lost) = remove_duplicate_stracks(activated, lost);
        self.tracked = tracked;
        self.lost = lost;

        let mut assignments = vec![None; detections.len()];
        for track in self.tracked.iter().filter(|t| t.is_activated && t.frame_id == frame_id) {
            if let Some(i) = track.det_index {
                assignments[i] = Some(track.track_id);
            }
        }
        assignments
    }
}

/// Concatenate two track lists, keeping the first occurrence of each identity.
fn join_stracks(first: Vec<STrack>, second: impl IntoIterator<Item = STrack>) -> Vec<STrack> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|t| seen.insert(t.track_id))
        .collect()
}

/// When a tracked and a lost track overlap almost entirely, keep the older one.
fn remove_duplicate_stracks(tracked: Vec<STrack>, lost: Vec<STrack>) -> (Vec<STrack>, Vec<STrack>) {
    if tracked.is_empty() || lost.is_empty() {
        return (tracked, lost);
    }

    let mut drop_tracked = vec![false; tracked.len()];
    let mut drop_lost = vec![false; lost.len()];
    for (i, a) in tracked.iter().enumerate() {
        for (j, b) in lost.iter().enumerate() {
            if a.bbox().iou(&b.bbox()) > DUPLICATE_IOU {
                if a.age() > b.age() {
                    drop_lost[j] = true;
                } else {
                    drop_tracked[i] = true;
                }
            }
        }
    }

    let keep = |tracks: Vec<STrack>, dropped: &[bool]| -> Vec<STrack> {
        tracks
            .into_iter()
            .zip(dropped)
            .filter_map(|(t, &d)| (!d).then_some(t))
            .collect()
    };
    (keep(tracked, &drop_tracked), keep(lost, &drop_lost))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_numbers_from_one() {
        let mut a = ByteTracker::new(TrackerConfig::default());
        let mut b = ByteTracker::new(TrackerConfig::default());
        let dets = [Detection::new(0.0, 0.0, 20.0, 20.0, 0.9)];
        assert_eq!(a.update(&dets), vec![Some(1)]);
        assert_eq!(b.update(&dets), vec![Some(1)]);
    }

    #[test]
    fn test_assignments_follow_input_order() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        let first = tracker.update(&[
            Detection::new(0.0, 0.0, 20.0, 20.0, 0.9),
            Detection::new(200.0, 200.0, 220.0, 220.0, 0.9),
        ]);
        assert_eq!(first, vec![Some(1), Some(2)]);

        // same objects, reversed input order
        let second = tracker.update(&[
            Detection::new(201.0, 201.0, 221.0, 221.0, 0.9),
            Detection::new(1.0, 1.0, 21.0, 21.0, 0.9),
        ]);
        assert_eq!(second, vec![Some(2), Some(1)]);
    }

    #[test]
    fn test_reset_restarts_numbering() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        let dets = [Detection::new(0.0, 0.0, 20.0, 20.0, 0.9)];
        tracker.update(&dets);
        tracker.reset();
        assert!(tracker.is_empty());
        assert_eq!(tracker.update(&dets), vec![Some(1)]);
    }

    #[test]
    fn test_low_score_detection_does_not_start_track() {
        let mut tracker = ByteTracker::new(TrackerConfig::default());
        assert_eq!(tracker.update(&[Detection::new(0.0, 0.0, 20.0, 20.0, 0.3)]), vec![None]);
        assert!(tracker.is_empty());
    }
}
