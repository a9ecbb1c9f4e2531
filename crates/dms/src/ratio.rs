//! Eye and mouth aspect ratios

use crate::landmarks::Point;

/// Eye aspect ratio: `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)`.
///
/// Returns 0.0 for a degenerate eye whose corners coincide.
pub fn eye_aspect_ratio(points: &[Point; 6]) -> f32 {
    let width = points[0].distance(&points[3]);
    if width == 0.0 {
        return 0.0;
    }
    let vertical = points[1].distance(&points[5]) + points[2].distance(&points[4]);
    vertical / (2.0 * width)
}

/// Mouth aspect ratio: mean of the four inner vertical openings over the
/// corner-to-corner width.
///
/// Returns 0.0 for a degenerate mouth whose corners coincide.
pub fn mouth_aspect_ratio(points: &[Point; 13]) -> f32 {
    let width = points[0].distance(&points[6]);
    if width == 0.0 {
        return 0.0;
    }
    let vertical = points[2].distance(&points[10])
        + points[3].distance(&points[9])
        + points[4].distance(&points[8])
        + points[5].distance(&points[7]);
    vertical / (4.0 * width)
}
