//! Finds the puzzle board in a photo and warps it into a square.
//!
//! Detection runs a cascade of strategies on a downscaled copy of the image and stops at the
//! first one that returns a plausible quadrilateral. The corners are then scaled back and the
//! full resolution image is rectified.
use crate::config::LocalizerConfig;
use crate::geometry::{approximate_quad, bounds, polygon_area, to_f32, Quadrilateral};
use crate::utils::local_mean_threshold;
use crate::Error;
use image::imageops::{resize, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use imageproc::morphology::dilate;
use log::{debug, info, warn};
use serde::Serialize;

/// One level of the detection cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Largest closed square-ish outline
    OuterContour,
    /// Bounding box of a lattice of similar cell outlines
    CellGrouping,
    /// Outermost of the dominant horizontal and vertical lines
    LineDetection,
    /// Centered square, always available
    CenterCrop,
}

type Detector = fn(&Localizer, &Scene) -> Option<Quadrilateral>;

const CASCADE: [(Strategy, Detector); 4] = [
    (Strategy::OuterContour, Localizer::outer_contour),
    (Strategy::CellGrouping, Localizer::cell_grouping),
    (Strategy::LineDetection, Localizer::line_detection),
    (Strategy::CenterCrop, Localizer::center_crop),
];

/// Which strategy found the board, and where, in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    pub strategy: Strategy,
    pub quad: Quadrilateral,
}

/// The board after perspective correction. The image is always `warp_size` square.
#[derive(Debug, Clone)]
pub struct RectifiedBoard {
    pub image: GrayImage,
    pub detection: Detection,
}

/// Derived images shared by all strategies
struct Scene {
    /// Pixels darker than their surroundings
    ink: GrayImage,
    edges: GrayImage,
    width: u32,
    height: u32,
}

impl Scene {
    fn new(gray: &GrayImage) -> Scene {
        let blurred = gaussian_blur_f32(gray, 1.0);
        Scene {
            ink: local_mean_threshold(&blurred, 5, 2),
            edges: canny(&blurred, 50.0, 150.0),
            width: gray.width(),
            height: gray.height(),
        }
    }

    fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}

pub struct Localizer {
    config: LocalizerConfig,
}

impl Localizer {
    pub fn new(config: LocalizerConfig) -> Self {
        Localizer { config }
    }

    /// Locate the board in `image` and rectify it.
    ///
    /// # Errors
    /// [`Error::DetectionFailed`] when the image is smaller than `min_image_side`, or when no
    /// strategy, the center crop included, yields a usable transform.
    pub fn locate(&self, image: &GrayImage) -> Result<RectifiedBoard, Error> {
        let (width, height) = image.dimensions();
        if width.min(height) < self.config.min_image_side {
            return Err(Error::DetectionFailed {
                width,
                height,
                min_side: self.config.min_image_side,
                attempted: Vec::new(),
            });
        }
        let scale = (self.config.detect_max_side as f32 / width.max(height) as f32).min(1.0);
        let scene = if scale < 1.0 {
            let (w, h) = (
                ((width as f32 * scale).round() as u32).max(1),
                ((height as f32 * scale).round() as u32).max(1),
            );
            debug!("detecting on {}x{} copy", w, h);
            Scene::new(&resize(image, w, h, FilterType::Triangle))
        } else {
            Scene::new(image)
        };

        let mut attempted = Vec::new();
        let found = CASCADE.iter().find_map(|&(strategy, detect)| {
            attempted.push(strategy);
            let quad = detect(self, &scene)?;
            if !self.is_plausible(&quad, scene.area()) {
                debug!("{:?}: implausible outline {:?}", strategy, quad.corners);
                return None;
            }
            let quad = quad.scale(1.0 / scale);
            let image = self.rectify(image, &quad)?;
            Some(RectifiedBoard {
                image,
                detection: Detection { strategy, quad },
            })
        });
        match found {
            Some(board) => {
                info!("board located by {:?}", board.detection.strategy);
                Ok(board)
            }
            None => Err(Error::DetectionFailed {
                width,
                height,
                min_side: self.config.min_image_side,
                attempted,
            }),
        }
    }

    /// Warp the region inside `quad` onto a `warp_size` square.
    pub fn rectify(&self, image: &GrayImage, quad: &Quadrilateral) -> Option<GrayImage> {
        let size = self.config.warp_size as f32;
        let square = [(0.0, 0.0), (size, 0.0), (size, size), (0.0, size)];
        let projection = Projection::from_control_points(quad.corners, square)?;
        let mut out = GrayImage::new(self.config.warp_size, self.config.warp_size);
        warp_into(
            image,
            &projection,
            Interpolation::Bilinear,
            Luma([255]),
            &mut out,
        );
        Some(out)
    }

    /// Minimum area, convex, roughly square with near right angles
    pub fn is_plausible(&self, quad: &Quadrilateral, image_area: f32) -> bool {
        let (lo, hi) = self.config.aspect_range;
        quad.area() >= self.config.min_area_fraction * image_area
            && quad.is_convex()
            && (lo..=hi).contains(&quad.aspect())
            && quad.max_corner_deviation() <= self.config.max_corner_deviation_deg
    }

    fn outer_contour(&self, scene: &Scene) -> Option<Quadrilateral> {
        let min_area = self.config.min_area_fraction * scene.area();
        [&scene.ink, &scene.edges]
            .iter()
            .filter_map(|binary| {
                let closed = dilate(binary, Norm::LInf, 2);
                let contours = find_contours::<i32>(&closed);
                debug!("outer contour: {} contours", contours.len());
                contours
                    .iter()
                    .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
                    .filter(|c| polygon_area(&to_f32(&c.points)) >= min_area)
                    .filter_map(|c| approximate_quad(&c.points, 0.02))
                    .filter(|quad| self.is_plausible(quad, scene.area()))
                    .max_by(|a, b| a.area().total_cmp(&b.area()))
            })
            .max_by(|a, b| a.area().total_cmp(&b.area()))
    }

    fn cell_grouping(&self, scene: &Scene) -> Option<Quadrilateral> {
        let image_area = scene.area();
        let (area_lo, area_hi) = self.config.cell_area_range;
        let (aspect_lo, aspect_hi) = self.config.aspect_range;
        let boxes: Vec<(i32, i32, i32, i32)> = find_contours::<i32>(&scene.ink)
            .iter()
            .filter(|c| c.points.len() >= 4)
            .map(|c| bounds(&c.points))
            .filter(|&(l, t, r, b)| {
                let (w, h) = ((r - l + 1) as f32, (b - t + 1) as f32);
                (area_lo * image_area..=area_hi * image_area).contains(&(w * h))
                    && (aspect_lo..=aspect_hi).contains(&(w / h))
            })
            .collect();
        debug!("cell grouping: {} candidates", boxes.len());
        if boxes.len() < self.config.min_cell_candidates {
            return None;
        }

        let side = |&(l, t, r, b): &(i32, i32, i32, i32)| ((r - l + b - t + 2) as f32) / 2.0;
        let mut sides: Vec<f32> = boxes.iter().map(side).collect();
        sides.sort_by(|a, b| a.total_cmp(b));
        let median = sides[sides.len() / 2];
        // a cell can show up twice, as the outer and the inner border of its outline
        let mut centers: Vec<(f32, f32)> = Vec::new();
        let mut cells = Vec::new();
        for b in boxes.iter().filter(|b| (0.5 * median..=2.0 * median).contains(&side(b))) {
            let center = ((b.0 + b.2) as f32 / 2.0, (b.1 + b.3) as f32 / 2.0);
            let duplicate = centers.iter().any(|c| {
                (c.0 - center.0).abs() < 0.25 * median && (c.1 - center.1).abs() < 0.25 * median
            });
            if !duplicate {
                centers.push(center);
                cells.push(*b);
            }
        }
        let columns = count_clusters(centers.iter().map(|c| c.0).collect(), 0.5 * median);
        let rows = count_clusters(centers.iter().map(|c| c.1).collect(), 0.5 * median);
        debug!(
            "cell grouping: {} cells in {} rows and {} columns",
            cells.len(),
            rows,
            columns
        );
        if cells.len() < self.config.min_cell_candidates / 2 || rows < 3 || columns < 3 {
            return None;
        }

        let (l, t, r, b) = cells.iter().fold(
            (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
            |(l, t, r, b), c| (l.min(c.0), t.min(c.1), r.max(c.2), b.max(c.3)),
        );
        let pad = 0.02 * (r - l).max(b - t) as f32;
        Some(Quadrilateral::axis_aligned(
            (l as f32 - pad).max(0.0),
            (t as f32 - pad).max(0.0),
            (r as f32 + pad).min(scene.width as f32 - 1.0),
            (b as f32 + pad).min(scene.height as f32 - 1.0),
        ))
    }

    fn line_detection(&self, scene: &Scene) -> Option<Quadrilateral> {
        let (w, h) = (scene.width as f32, scene.height as f32);
        let options = LineDetectionOptions {
            vote_threshold: (self.config.hough_vote_fraction * w.min(h)) as u32,
            suppression_radius: 8,
        };
        let lines = detect_lines(&scene.edges, options);
        let (vertical, horizontal) = classify_lines(&lines);
        debug!(
            "line detection: {} vertical, {} horizontal",
            vertical.len(),
            horizontal.len()
        );
        if vertical.len() < 2 || horizontal.len() < 2 {
            return None;
        }
        let by = |pos: &dyn Fn(&PolarLine) -> f32, lines: &[PolarLine]| {
            let min = lines.iter().min_by(|a, b| pos(a).total_cmp(&pos(b))).copied();
            let max = lines.iter().max_by(|a, b| pos(a).total_cmp(&pos(b))).copied();
            min.zip(max)
        };
        let x_mid = |line: &PolarLine| x_at(line, h / 2.0);
        let y_mid = |line: &PolarLine| y_at(line, w / 2.0);
        let (left, right) = by(&x_mid, &vertical)?;
        let (top, bottom) = by(&y_mid, &horizontal)?;
        if x_mid(&right) - x_mid(&left) < 0.2 * w || y_mid(&bottom) - y_mid(&top) < 0.2 * h {
            return None;
        }
        let corners = [
            intersect(&top, &left)?,
            intersect(&top, &right)?,
            intersect(&bottom, &right)?,
            intersect(&bottom, &left)?,
        ];
        Quadrilateral::from_points(&corners)
    }

    fn center_crop(&self, scene: &Scene) -> Option<Quadrilateral> {
        let (w, h) = (scene.width as f32, scene.height as f32);
        let side = self.config.fallback_fraction * w.min(h);
        let (left, top) = ((w - side) / 2.0, (h - side) / 2.0);
        warn!("no board outline found, using centered {:.0}px square", side);
        Some(Quadrilateral::axis_aligned(
            left,
            top,
            left + side,
            top + side,
        ))
    }
}

/// Number of groups in `values` when a gap wider than `gap` starts a new group
fn count_clusters(mut values: Vec<f32>, gap: f32) -> usize {
    if values.is_empty() {
        return 0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    1 + values.windows(2).filter(|w| w[1] - w[0] > gap).count()
}

/// Split into near-vertical and near-horizontal lines, dropping the rest.
///
/// A line at angle θ is the set of points with x·cos θ + y·sin θ = r, so θ near 0 or 180 is
/// vertical.
fn classify_lines(lines: &[PolarLine]) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut vertical = Vec::new();
    let mut horizontal = Vec::new();
    for line in lines {
        let angle = line.angle_in_degrees;
        if angle <= 17 || angle >= 163 {
            vertical.push(*line);
        } else if (73..=107).contains(&angle) {
            horizontal.push(*line);
        }
    }
    (vertical, horizontal)
}

fn x_at(line: &PolarLine, y: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - y * theta.sin()) / theta.cos()
}

fn y_at(line: &PolarLine, x: f32) -> f32 {
    let theta = (line.angle_in_degrees as f32).to_radians();
    (line.r - x * theta.cos()) / theta.sin()
}

fn intersect(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let (ta, tb) = (
        (a.angle_in_degrees as f32).to_radians(),
        (b.angle_in_degrees as f32).to_radians(),
    );
    let det = ta.cos() * tb.sin() - ta.sin() * tb.cos();
    if det.abs() < 1e-6 {
        return None;
    }
    let x = (a.r * tb.sin() - b.r * ta.sin()) / det;
    let y = (ta.cos() * b.r - tb.cos() * a.r) / det;
    Some((x, y))
}
