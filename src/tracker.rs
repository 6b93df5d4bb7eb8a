//! ByteTrack identity assignment used by the `Track` inference task.

mod byte_tracker;
mod kalman_filter;
mod matching;
mod strack;
mod track_state;

pub use byte_tracker::{ByteTracker, TrackerConfig};
pub use matching::Detection;
