//! Single tracklet state.

use crate::detection::{BoundingBox, TrackId};
use crate::tracker::kalman_filter::{Covariance, KalmanFilter, Mean, Measurement};
use crate::tracker::track_state::TrackState;

#[derive(Debug, Clone)]
pub struct STrack {
    /// Zero until the track is activated
    pub track_id: TrackId,
    pub state: TrackState,
    /// Whether the track has been confirmed by a second observation
    pub is_activated: bool,
    pub score: f32,
    /// Last frame this track was matched in
    pub frame_id: u32,
    pub start_frame: u32,
    /// Index of the input detection that last updated this track
    pub det_index: Option<usize>,
    kalman: Option<(Mean, Covariance)>,
    observed: BoundingBox,
}

fn measurement(bbox: &BoundingBox) -> Measurement {
    let [cx, cy, a, h] = bbox.to_xyah();
    Measurement::new(cx as f64, cy as f64, a as f64, h as f64)
}

impl STrack {
    pub fn new(bbox: BoundingBox, score: f32, det_index: usize) -> Self {
        Self {
            track_id: 0,
            state: TrackState::New,
            is_activated: false,
            score,
            frame_id: 0,
            start_frame: 0,
            det_index: Some(det_index),
            kalman: None,
            observed: bbox,
        }
    }

    /// Current box estimate: the filter's mean once initiated, else the observation.
    pub fn bbox(&self) -> BoundingBox {
        match &self.kalman {
            Some((mean, _)) => BoundingBox::from_xyah(
                mean[0] as f32,
                mean[1] as f32,
                mean[2] as f32,
                mean[3] as f32,
            ),
            None => self.observed,
        }
    }

    pub fn activate(&mut self, kalman_filter: &KalmanFilter, frame_id: u32, track_id: TrackId) {
        self.track_id = track_id;
        self.kalman = Some(kalman_filter.initiate(&measurement(&self.observed)));
        self.state = TrackState::Tracked;
        // Tracks born on the very first frame are confirmed immediately
        self.is_activated = frame_id == 1;
        self.frame_id = frame_id;
        self.start_frame = frame_id;
    }

    pub fn re_activate(&mut self, detection: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(detection, kalman_filter);
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
    }

    pub fn update(&mut self, detection: &STrack, kalman_filter: &KalmanFilter, frame_id: u32) {
        self.correct(detection, kalman_filter);
        self.state = TrackState::Tracked;
        self.is_activated = true;
        self.frame_id = frame_id;
    }

    fn correct(&mut self, detection: &STrack, kalman_filter: &KalmanFilter) {
        if let Some((mean, cov)) = &self.kalman {
            self.kalman = Some(kalman_filter.update(mean, cov, &measurement(&detection.observed)));
        }
        self.observed = detection.observed;
        self.score = detection.score;
        self.det_index = detection.det_index;
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter) {
        if let Some((mean, cov)) = &self.kalman {
            let mut mean = *mean;
            if self.state != TrackState::Tracked {
                // freeze height velocity while the track is not observed
                mean[7] = 0.0;
            }
            self.kalman = Some(kalman_filter.predict(&mean, cov));
        }
    }

    pub fn mark_lost(&mut self) {
        self.state = TrackState::Lost;
        self.det_index = None;
    }

    /// Frames elapsed since the track started.
    pub fn age(&self) -> u32 {
        self.frame_id - self.start_frame
    }
}
