//! Board outlines and the plausibility checks applied to them.
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use serde::Serialize;

/// Four corners in image pixel coordinates, ordered top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quadrilateral {
    pub corners: [(f32, f32); 4],
}

impl Quadrilateral {
    /// Order four arbitrary points: top-left has the smallest x + y, bottom-right the largest,
    /// top-right the smallest y - x and bottom-left the largest.
    ///
    /// Returns `None` when the points are so skewed that one point would fill two corners.
    pub fn from_points(points: &[(f32, f32)]) -> Option<Quadrilateral> {
        if points.len() != 4 {
            return None;
        }
        let pick = |key: &dyn Fn(&(f32, f32)) -> f32, max: bool| {
            let mut best = 0;
            for (i, p) in points.iter().enumerate() {
                let (k, b) = (key(p), key(&points[best]));
                if (max && k > b) || (!max && k < b) {
                    best = i;
                }
            }
            best
        };
        let sum = |p: &(f32, f32)| p.0 + p.1;
        let diff = |p: &(f32, f32)| p.1 - p.0;
        let order = [
            pick(&sum, false),
            pick(&diff, false),
            pick(&sum, true),
            pick(&diff, true),
        ];
        for i in 0..4 {
            if order[i + 1..].contains(&order[i]) {
                return None;
            }
        }
        Some(Quadrilateral {
            corners: order.map(|i| points[i]),
        })
    }

    pub fn axis_aligned(left: f32, top: f32, right: f32, bottom: f32) -> Quadrilateral {
        Quadrilateral {
            corners: [(left, top), (right, top), (right, bottom), (left, bottom)],
        }
    }

    pub fn area(&self) -> f32 {
        polygon_area(&self.corners)
    }

    /// Interior angle at each corner, in degrees
    pub fn corner_angles(&self) -> [f32; 4] {
        let c = &self.corners;
        let mut angles = [0.0; 4];
        for (i, angle) in angles.iter_mut().enumerate() {
            let prev = c[(i + 3) % 4];
            let next = c[(i + 1) % 4];
            let (ax, ay) = (prev.0 - c[i].0, prev.1 - c[i].1);
            let (bx, by) = (next.0 - c[i].0, next.1 - c[i].1);
            let norm = (ax.hypot(ay) * bx.hypot(by)).max(f32::EPSILON);
            let cos = ((ax * bx + ay * by) / norm).clamp(-1.0, 1.0);
            *angle = cos.acos().to_degrees();
        }
        angles
    }

    /// Largest deviation of any corner angle from a right angle
    pub fn max_corner_deviation(&self) -> f32 {
        self.corner_angles()
            .iter()
            .map(|a| (a - 90.0).abs())
            .fold(0.0, f32::max)
    }

    /// Top edge length over left edge length
    pub fn aspect(&self) -> f32 {
        let [tl, tr, _, bl] = self.corners;
        let width = (tr.0 - tl.0).hypot(tr.1 - tl.1);
        let height = (bl.0 - tl.0).hypot(bl.1 - tl.1);
        if height <= f32::EPSILON {
            return f32::INFINITY;
        }
        width / height
    }

    /// True when every turn goes the same way. A convex quadrilateral can not self-intersect.
    pub fn is_convex(&self) -> bool {
        let c = &self.corners;
        let mut sign = 0.0f32;
        for i in 0..4 {
            let (a, b, d) = (c[i], c[(i + 1) % 4], c[(i + 2) % 4]);
            let cross = (b.0 - a.0) * (d.1 - b.1) - (b.1 - a.1) * (d.0 - b.0);
            if cross.abs() <= f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    pub fn scale(&self, factor: f32) -> Quadrilateral {
        Quadrilateral {
            corners: self.corners.map(|(x, y)| (x * factor, y * factor)),
        }
    }
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[(f32, f32)]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        twice += a.0 * b.1 - b.0 * a.1;
    }
    (twice / 2.0).abs()
}

pub(crate) fn to_f32(points: &[Point<i32>]) -> Vec<(f32, f32)> {
    points.iter().map(|p| (p.x as f32, p.y as f32)).collect()
}

/// Bounding box `(left, top, right, bottom)` of a non-empty point set
pub(crate) fn bounds(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
    points.iter().fold(
        (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
        |(l, t, r, b), p| (l.min(p.x), t.min(p.y), r.max(p.x), b.max(p.y)),
    )
}

/// Simplify a closed contour and return it as a quadrilateral if exactly four vertices survive.
///
/// The ring is cut at the start point and at the point farthest from it, and each open half is
/// simplified separately so both cut points are kept as vertices.
pub fn approximate_quad(contour: &[Point<i32>], epsilon_fraction: f64) -> Option<Quadrilateral> {
    if contour.len() < 4 {
        return None;
    }
    let epsilon = (epsilon_fraction * arc_length(contour, true)).max(1.0);
    let start = contour[0];
    let far = contour
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| (p.x - start.x).pow(2) + (p.y - start.y).pow(2))
        .map(|(i, _)| i)?;
    if far == 0 {
        return None;
    }
    let mut vertices = approximate_polygon_dp(&contour[..=far], epsilon, false);
    let mut back = contour[far..].to_vec();
    back.push(start);
    let back = approximate_polygon_dp(&back, epsilon, false);
    // both halves repeat their shared end points
    vertices.pop();
    vertices.extend(back);
    vertices.pop();
    if vertices.len() != 4 {
        return None;
    }
    Quadrilateral::from_points(&to_f32(&vertices))
}
