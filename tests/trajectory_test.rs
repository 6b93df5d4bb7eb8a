use trackflow::{DetectionBuilder, DetectionRecord, Point, TrackId, TrackIdentityStore, TrajectoryConfig};

fn at(id: TrackId, cx: f32, cy: f32) -> DetectionRecord {
    DetectionBuilder::new()
        .cxcywh(cx, cy, 10.0, 10.0)
        .confidence(0.9)
        .track_id(id)
        .build()
}

#[test]
fn test_identity_vanishes_and_returns() {
    let mut store = TrackIdentityStore::default();
    let color_before = {
        let mut snapshot = Default::default();
        for tick in 1..=4 {
            snapshot = store.update(&[at(1, tick as f32, 0.0), at(2, 100.0, tick as f32)]);
        }
        assert_eq!(snapshot[&2].len(), 4);
        snapshot[&2].color()
    };

    // tick 5: identity 2 is gone, immediately
    let snapshot = store.update(&[at(1, 5.0, 0.0)]);
    assert!(!snapshot.contains_key(&2));
    assert!(!store.contains(2));

    // tick 6: still gone
    store.update(&[at(1, 6.0, 0.0)]);
    assert!(!store.contains(2));

    // tick 7: back with a fresh history and the same color
    let snapshot = store.update(&[at(1, 7.0, 0.0), at(2, 100.0, 7.0)]);
    assert_eq!(snapshot[&2].len(), 1);
    assert_eq!(snapshot[&2].latest(), Some(Point::new(100.0, 7.0)));
    assert_eq!(snapshot[&2].color(), color_before);
    assert_eq!(snapshot[&1].len(), 7);
}

#[test]
fn test_history_keeps_the_newest_thirty() {
    let mut store = TrackIdentityStore::default();
    let mut snapshot = Default::default();
    for tick in 0..40 {
        snapshot = store.update(&[at(9, tick as f32, 0.0)]);
        assert!(snapshot[&9].len() <= 30);
    }
    let points = snapshot[&9].to_vec();
    assert_eq!(points.len(), 30);
    assert_eq!(points.first().map(|p| p.x), Some(10.0));
    assert_eq!(points.last().map(|p| p.x), Some(39.0));
    assert!(points.windows(2).all(|w| w[0].x < w[1].x));
}

#[test]
fn test_empty_tick_evicts_everything() {
    let mut store = TrackIdentityStore::default();
    store.update(&[at(1, 0.0, 0.0), at(2, 5.0, 5.0), at(3, 9.0, 9.0)]);
    assert_eq!(store.len(), 3);
    assert!(store.update(&[]).is_empty());
    assert!(store.is_empty());
}

#[test]
fn test_live_entries_match_last_tick_exactly() {
    let mut store = TrackIdentityStore::default();
    store.update(&[at(1, 0.0, 0.0), at(2, 0.0, 0.0)]);
    let snapshot = store.update(&[at(2, 1.0, 1.0), at(3, 2.0, 2.0)]);
    assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    assert!(snapshot.values().all(|t| !t.is_empty()));
}

#[test]
fn test_colors_follow_palette_size() {
    let config = TrajectoryConfig {
        palette_size: 5,
        ..Default::default()
    };
    let mut store = TrackIdentityStore::new(&config);
    let snapshot = store.update(&[at(2, 0.0, 0.0), at(7, 0.0, 0.0)]);
    assert_eq!(snapshot[&2].color(), snapshot[&7].color());
    assert_eq!(snapshot[&2].color(), store.color_for(2));

    let other = TrackIdentityStore::new(&config);
    assert_eq!(other.palette(), store.palette());
}
