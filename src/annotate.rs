//! Drawing of detections and trajectories onto frames.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::detection::{DetectionRecord, Point};
use crate::frame::Frame;
use crate::trajectory::{Palette, TrajectorySnapshot};

const BOX_THICKNESS: i32 = 2;
const TRAIL_THICKNESS: i32 = 5;
const HEAD_RADIUS: i32 = 7;
const KEYPOINT_RADIUS: i32 = 4;

/// Return a copy of `frame` with every record drawn.
///
/// Tracked records use their identity's color, the rest their class color.
pub fn draw_detections(frame: &Frame, records: &[DetectionRecord], palette: &Palette) -> Frame {
    let mut out = frame.clone();
    let image = out.image_mut();
    for record in records {
        let key = record
            .track_id
            .or(record.class_id.map(u64::from))
            .unwrap_or_default();
        let color: Rgb<u8> = palette.color_for(key).into();

        let [x1, y1, x2, y2] = record.bbox.to_array();
        let (x1, y1) = clamp_to(image, x1, y1, BOX_THICKNESS);
        let (x2, y2) = clamp_to(image, x2, y2, BOX_THICKNESS);
        for inset in 0..BOX_THICKNESS {
            let w = x2 - x1 - 2 * inset;
            let h = y2 - y1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(image, rect, color);
        }

        if let Some(polygon) = &record.polygon {
            for (a, b) in polygon.iter().zip(polygon.iter().cycle().skip(1)) {
                draw_line_segment_mut(image, (a.x, a.y), (b.x, b.y), color);
            }
        }
        if let Some(keypoints) = &record.keypoints {
            for p in keypoints {
                let center = clamp_to(image, p.x, p.y, KEYPOINT_RADIUS + 1);
                draw_filled_circle_mut(image, center, KEYPOINT_RADIUS, color);
            }
        }
    }
    out
}

/// Overlay every trajectory: a thick polyline and a dot at the newest point.
pub fn draw_trajectories(frame: &mut Frame, trajectories: &TrajectorySnapshot) {
    let image = frame.image_mut();
    for trajectory in trajectories.values() {
        let color: Rgb<u8> = trajectory.color().into();
        let points = trajectory.to_vec();
        for pair in points.windows(2) {
            draw_thick_segment(image, pair[0], pair[1], color);
        }
        if let Some(head) = trajectory.latest() {
            let center = clamp_to(image, head.x, head.y, HEAD_RADIUS + 1);
            draw_filled_circle_mut(image, center, HEAD_RADIUS, color);
        }
    }
}

/// Pixel position limited to `margin` pixels outside the image, so model
/// coordinates of any magnitude stay clear of integer overflow.
fn clamp_to(image: &RgbImage, x: f32, y: f32, margin: i32) -> (i32, i32) {
    let (w, h) = image.dimensions();
    let x = (x as i32).clamp(-margin, w as i32 + margin);
    let y = (y as i32).clamp(-margin, h as i32 + margin);
    (x, y)
}

fn draw_thick_segment(image: &mut RgbImage, from: Point, to: Point, color: Rgb<u8>) {
    let half = TRAIL_THICKNESS / 2;
    let steep = (to.y - from.y).abs() > (to.x - from.x).abs();
    for offset in -half..=half {
        let (dx, dy) = if steep { (offset as f32, 0.0) } else { (0.0, offset as f32) };
        draw_line_segment_mut(image, (from.x + dx, from.y + dy), (to.x + dx, to.y + dy), color);
    }
}
