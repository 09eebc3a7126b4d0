use crate::config::SizerConfig;
use crate::Error;
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::{debug, info};
use serde::Serialize;

/// Supported board sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GridDimension {
    Four = 4,
    Five = 5,
    Six = 6,
}

impl GridDimension {
    pub const ALL: [GridDimension; 3] = [GridDimension::Four, GridDimension::Five, GridDimension::Six];

    /// Cells per side
    pub fn n(self) -> usize {
        self as usize
    }

    pub fn cells(self) -> usize {
        self.n() * self.n()
    }

    pub fn from_n(n: usize) -> Option<GridDimension> {
        GridDimension::ALL.iter().copied().find(|d| d.n() == n)
    }
}

/// Which side of the threshold counts as foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    /// Dark regions on a light board, such as printed tiles or letters
    Dark,
    /// Light regions separated by dark grid lines
    Light,
}

/// Infers the grid dimension of a rectified board by counting cell-sized regions.
pub struct GridSizer {
    config: SizerConfig,
}

impl GridSizer {
    pub fn new(config: SizerConfig) -> Self {
        GridSizer { config }
    }

    /// Count cell-sized components, dark ones first, and map the count to a grid size.
    ///
    /// # Errors
    /// [`Error::DimensionIndeterminate`] with the counts for both polarities when neither
    /// matches 16, 25 or 36 within tolerance.
    pub fn infer_size(&self, board: &GrayImage) -> Result<GridDimension, Error> {
        let mut counts = Vec::new();
        for polarity in [Polarity::Dark, Polarity::Light] {
            let count = self.count_cells(board, polarity);
            debug!("{:?} components: {}", polarity, count);
            counts.push((polarity, count));
            if let Some(dimension) = self.match_count(count) {
                info!("grid is {0}x{0} ({1} {2:?} cells)", dimension.n(), count, polarity);
                return Ok(dimension);
            }
        }
        Err(Error::DimensionIndeterminate { counts })
    }

    /// The grid size whose cell count is within tolerance of `count`, nearest first
    pub fn match_count(&self, count: usize) -> Option<GridDimension> {
        GridDimension::ALL
            .iter()
            .copied()
            .filter(|d| {
                let cells = d.cells() as f32;
                (count as f32 - cells).abs() <= self.config.tolerance * cells
            })
            .min_by_key(|d| (count as i64 - d.cells() as i64).abs())
    }

    /// Number of connected components of the given polarity that look like a single cell: plausible
    /// size and aspect, centered inside the interior margin.
    pub fn count_cells(&self, board: &GrayImage, polarity: Polarity) -> usize {
        let (w, h) = board.dimensions();
        if w == 0 || h == 0 {
            return 0;
        }
        let level = otsu_level(board);
        let mask = GrayImage::from_fn(w, h, |x, y| {
            let dark = board.get_pixel(x, y)[0] <= level;
            if dark == (polarity == Polarity::Dark) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        let mask = if self.config.erode_radius > 0 {
            erode(&mask, Norm::LInf, self.config.erode_radius)
        } else {
            mask
        };
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
        let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
        // (left, top, right, bottom) per label
        let mut boxes = vec![(u32::MAX, u32::MAX, 0u32, 0u32); max_label + 1];
        for (x, y, p) in labels.enumerate_pixels() {
            let label = p[0] as usize;
            if label == 0 {
                continue;
            }
            let b = &mut boxes[label];
            *b = (b.0.min(x), b.1.min(y), b.2.max(x), b.3.max(y));
        }

        let side = w.min(h) as f32;
        let min_area = (self.config.min_component_side * side).powi(2);
        let max_area = (self.config.max_component_side * side).powi(2);
        let (aspect_lo, aspect_hi) = self.config.aspect_range;
        let margin = self.config.margin_fraction;
        boxes
            .iter()
            .skip(1)
            .filter(|b| b.0 <= b.2)
            .filter(|&&(l, t, r, b)| {
                let (bw, bh) = ((r - l + 1) as f32, (b - t + 1) as f32);
                let (cx, cy) = ((l + r) as f32 / 2.0 / w as f32, (t + b) as f32 / 2.0 / h as f32);
                (min_area..=max_area).contains(&(bw * bh))
                    && (aspect_lo..=aspect_hi).contains(&(bw / bh))
                    && (margin..=1.0 - margin).contains(&cx)
                    && (margin..=1.0 - margin).contains(&cy)
            })
            .count()
    }
}
