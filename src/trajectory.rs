//! Bounded per-identity trajectories and their display colors.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::detection::{DetectionRecord, Point, TrackId};

/// Configuration for the TrackIdentityStore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Maximum number of centroids kept per identity.
    pub max_len: usize,
    pub palette_size: usize,
    pub palette_seed: u64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            max_len: 30,
            palette_size: 50,
            palette_seed: 42,
        }
    }
}

/// An RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub [u8; 3]);

impl From<Color> for image::Rgb<u8> {
    fn from(color: Color) -> Self {
        image::Rgb(color.0)
    }
}

/// Fixed list of colors generated once from a seed.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    pub fn seeded(size: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let colors = (0..size.max(1))
            .map(|_| {
                Color([
                    rng.gen_range(0..255),
                    rng.gen_range(0..255),
                    rng.gen_range(0..255),
                ])
            })
            .collect();
        Self { colors }
    }

    pub fn from_config(config: &TrajectoryConfig) -> Self {
        Self::seeded(config.palette_size, config.palette_seed)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// `palette[key mod palette_size]`
    pub fn color_for(&self, key: u64) -> Color {
        self.colors[(key % self.colors.len() as u64) as usize]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::from_config(&TrajectoryConfig::default())
    }
}

/// Ordered centroid history of one identity plus its display color.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    points: VecDeque<Point>,
    color: Color,
}

impl Trajectory {
    fn new(color: Color) -> Self {
        Self {
            points: VecDeque::new(),
            color,
        }
    }

    fn push(&mut self, point: Point, max_len: usize) {
        self.points.push_back(point);
        while self.points.len() > max_len {
            self.points.pop_front();
        }
    }

    /// Centroids from oldest to newest.
    pub fn points(&self) -> impl ExactSizeIterator<Item = &Point> + '_ {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    pub fn latest(&self) -> Option<Point> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn color(&self) -> Color {
        self.color
    }
}

/// Owned copy of every live trajectory, ordered by identity.
pub type TrajectorySnapshot = BTreeMap<TrackId, Trajectory>;

/// Identity → trajectory map with immediate eviction of identities the
/// tracker stopped reporting.
///
/// Single writer; readers only ever see snapshots.
#[derive(Debug, Clone)]
pub struct TrackIdentityStore {
    trajectories: HashMap<TrackId, Trajectory>,
    palette: Palette,
    max_len: usize,
}

impl Default for TrackIdentityStore {
    fn default() -> Self {
        Self::new(&TrajectoryConfig::default())
    }
}

impl TrackIdentityStore {
    pub fn new(config: &TrajectoryConfig) -> Self {
        Self {
            trajectories: HashMap::new(),
            palette: Palette::from_config(config),
            max_len: config.max_len.max(1),
        }
    }

    /// Fold one tick of detections into the store and return a snapshot.
    ///
    /// Records without an identity are ignored. Every identity absent from
    /// `records` is evicted, with no grace period.
    pub fn update(&mut self, records: &[DetectionRecord]) -> TrajectorySnapshot {
        let mut current_ids = HashSet::new();
        for record in records {
            let Some(id) = record.track_id else {
                continue;
            };
            let palette = &self.palette;
            self.trajectories
                .entry(id)
                .or_insert_with(|| Trajectory::new(palette.color_for(id)))
                .push(record.centroid(), self.max_len);
            current_ids.insert(id);
        }
        self.trajectories.retain(|id, _| current_ids.contains(id));
        self.snapshot()
    }

    pub fn snapshot(&self) -> TrajectorySnapshot {
        self.trajectories
            .iter()
            .map(|(id, t)| (*id, t.clone()))
            .collect()
    }

    pub fn get(&self, id: TrackId) -> Option<&Trajectory> {
        self.trajectories.get(&id)
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.trajectories.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn clear(&mut self) {
        self.trajectories.clear();
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Color an identity gets (or got) in this store.
    pub fn color_for(&self, id: TrackId) -> Color {
        self.palette.color_for(id)
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionBuilder;

    fn tracked(id: TrackId, x: f32) -> DetectionRecord {
        DetectionBuilder::new()
            .tlbr(x, 0.0, x + 10.0, 10.0)
            .track_id(id)
            .build()
    }

    #[test]
    fn test_palette_is_deterministic() {
        let a = Palette::seeded(50, 42);
        let b = Palette::seeded(50, 42);
        assert_eq!(a, b);
        assert_eq!(a.color_for(3), a.color_for(53));
    }

    #[test]
    fn test_untracked_records_are_ignored() {
        let mut store = TrackIdentityStore::default();
        let untracked = DetectionBuilder::new().tlbr(0.0, 0.0, 4.0, 4.0).build();
        let snapshot = store.update(&[untracked]);
        assert!(snapshot.is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_centroid_is_box_center() {
        let mut store = TrackIdentityStore::default();
        let snapshot = store.update(&[tracked(7, 20.0)]);
        assert_eq!(snapshot[&7].latest(), Some(Point::new(25.0, 5.0)));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut store = TrackIdentityStore::default();
        let before = store.update(&[tracked(1, 0.0)]);
        store.update(&[tracked(2, 0.0)]);
        assert!(before.contains_key(&1));
        assert!(!store.contains(1));
    }

    #[test]
    fn test_custom_capacity() {
        let config = TrajectoryConfig {
            max_len: 3,
            ..Default::default()
        };
        let mut store = TrackIdentityStore::new(&config);
        for i in 0..5 {
            store.update(&[tracked(1, i as f32)]);
        }
        let points = store.get(1).unwrap().to_vec();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].x, 7.0);
    }
}
