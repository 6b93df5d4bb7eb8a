//! Cost matrices and linear assignment between tracks and detections.

use ndarray::Array2;

use crate::detection::BoundingBox;

/// Tracker input: one box with its score.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
        }
    }
}

/// `1 - IoU` for every (track, detection) pair.
pub fn iou_distance(track_boxes: &[BoundingBox], det_boxes: &[BoundingBox]) -> Array2<f32> {
    Array2::from_shape_fn((track_boxes.len(), det_boxes.len()), |(i, j)| {
        1.0 - track_boxes[i].iou(&det_boxes[j])
    })
}

/// Weight IoU similarity by detection score.
pub fn fuse_score(cost_matrix: &mut Array2<f32>, scores: &[f32]) {
    for ((_, j), cost) in cost_matrix.indexed_iter_mut() {
        *cost = 1.0 - (1.0 - *cost) * scores[j];
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

const PADDING_COST: f64 = 1e6;

/// Solve the assignment with LAPJV, rejecting pairs whose cost exceeds `thresh`.
pub fn linear_assignment(cost_matrix: &Array2<f32>, thresh: f32) -> AssignmentResult {
    let (rows, cols) = cost_matrix.dim();
    if rows == 0 || cols == 0 {
        return AssignmentResult {
            matches: Vec::new(),
            unmatched_tracks: (0..rows).collect(),
            unmatched_detections: (0..cols).collect(),
        };
    }

    // lapjv wants a square matrix
    let size = rows.max(cols);
    let padded = Array2::from_shape_fn((size, size), |(i, j)| {
        if i < rows && j < cols {
            cost_matrix[[i, j]] as f64
        } else {
            PADDING_COST
        }
    });

    let mut result = AssignmentResult::default();
    let mut detection_taken = vec![false; cols];

    let Ok((row_to_col, _)) = lapjv::lapjv(&padded) else {
        result.unmatched_tracks = (0..rows).collect();
        result.unmatched_detections = (0..cols).collect();
        return result;
    };

    for (row, &col) in row_to_col.iter().enumerate().take(rows) {
        if col < cols && cost_matrix[[row, col]] <= thresh {
            result.matches.push((row, col));
            detection_taken[col] = true;
        } else {
            result.unmatched_tracks.push(row);
        }
    }
    result.unmatched_detections = detection_taken
        .iter()
        .enumerate()
        .filter_map(|(j, &taken)| (!taken).then_some(j))
        .collect();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_picks_overlapping_pairs() {
        let tracks = [
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(100.0, 100.0, 110.0, 110.0),
        ];
        let dets = [
            BoundingBox::new(101.0, 101.0, 111.0, 111.0),
            BoundingBox::new(1.0, 1.0, 11.0, 11.0),
            BoundingBox::new(500.0, 500.0, 510.0, 510.0),
        ];
        let dists = iou_distance(&tracks, &dets);
        let result = linear_assignment(&dists, 0.8);

        let mut matches = result.matches.clone();
        matches.sort();
        assert_eq!(matches, vec![(0, 1), (1, 0)]);
        assert!(result.unmatched_tracks.is_empty());
        assert_eq!(result.unmatched_detections, vec![2]);
    }

    #[test]
    fn test_empty_sides() {
        let empty = Array2::<f32>::zeros((0, 3));
        let result = linear_assignment(&empty, 0.5);
        assert_eq!(result.unmatched_detections, vec![0, 1, 2]);

        let empty = Array2::<f32>::zeros((2, 0));
        let result = linear_assignment(&empty, 0.5);
        assert_eq!(result.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_fuse_score() {
        let mut cost = Array2::from_elem((1, 2), 0.5f32);
        fuse_score(&mut cost, &[1.0, 0.5]);
        assert!((cost[[0, 0]] - 0.5).abs() < 1e-6);
        assert!((cost[[0, 1]] - 0.75).abs() < 1e-6);
    }
}
