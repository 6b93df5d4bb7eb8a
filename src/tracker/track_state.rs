/// Lifecycle of a single tracklet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created this frame, not yet confirmed
    #[default]
    New,
    /// Matched in the most recent frame
    Tracked,
    /// Unmatched, kept for re-identification until the buffer runs out
    Lost,
}
