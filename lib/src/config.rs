//! Tunable thresholds and resolutions for every pipeline stage.
//!
//! The library never reads files or the environment itself. Callers build a [`Config`] from
//! [`Default`], tweak fields, or parse TOML text with [`Config::from_toml_str`].
//! Missing keys in TOML fall back to the defaults.
//!
//! ```
//! # use boggle_ocr::Config;
//! let config = Config::from_toml_str("[solver]\nmax_results = 10\n")?;
//! assert_eq!(config.solver.max_results, 10);
//! assert_eq!(config.solver.min_word_length, 3);
//! # Ok::<(), boggle_ocr::Error>(())
//! ```
use crate::Error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub localizer: LocalizerConfig,
    pub sizer: SizerConfig,
    pub segmenter: SegmenterConfig,
    pub recognizer: RecognizerConfig,
    pub solver: SolverConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Config, Error> {
        Ok(toml::from_str(text)?)
    }
}

/// Board localization cascade settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalizerConfig {
    /// Side length in pixels of the rectified square board
    pub warp_size: u32,
    /// Images with a shorter side than this are rejected outright
    pub min_image_side: u32,
    /// Detection runs on a copy downscaled to at most this side length
    pub detect_max_side: u32,
    /// Minimum board area as a fraction of the image area
    pub min_area_fraction: f32,
    /// Maximum deviation of any board corner angle from 90 degrees
    pub max_corner_deviation_deg: f32,
    /// Accepted width / height ratio of the board outline
    pub aspect_range: (f32, f32),
    /// Accepted area of a single cell contour as a fraction of the image area
    pub cell_area_range: (f32, f32),
    /// Fewest cell contours that count as a grid
    pub min_cell_candidates: usize,
    /// Hough vote threshold as a fraction of the shorter image side
    pub hough_vote_fraction: f32,
    /// Side of the centered fallback square as a fraction of the shorter image side
    pub fallback_fraction: f32,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        LocalizerConfig {
            warp_size: 400,
            min_image_side: 32,
            detect_max_side: 1024,
            min_area_fraction: 0.05,
            max_corner_deviation_deg: 30.0,
            aspect_range: (0.6, 1.6),
            cell_area_range: (0.008, 0.06),
            min_cell_candidates: 12,
            hough_vote_fraction: 0.25,
            fallback_fraction: 0.8,
        }
    }
}

/// Grid dimension inference settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    /// Components centered closer than this fraction of the side to an edge are ignored
    pub margin_fraction: f32,
    /// Relative distance from N² that still counts as a match
    pub tolerance: f32,
    /// Smallest plausible cell side as a fraction of the board side
    pub min_component_side: f32,
    /// Largest plausible cell side as a fraction of the board side
    pub max_component_side: f32,
    pub aspect_range: (f32, f32),
    /// Erosion radius used to separate touching cells
    pub erode_radius: u8,
}

impl Default for SizerConfig {
    fn default() -> Self {
        SizerConfig {
            margin_fraction: 0.04,
            tolerance: 0.15,
            min_component_side: 1.0 / 12.0,
            max_component_side: 1.0 / 3.0,
            aspect_range: (0.5, 2.0),
            erode_radius: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Fraction of the cell size cropped away on every side
    pub inset: f32,
    /// Working resolution of a normalized cell
    pub cell_size: u32,
    /// Cells whose normalized standard deviation is below this are blank
    pub blank_std: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        SegmenterConfig {
            inset: 0.15,
            cell_size: 64,
            blank_std: 0.04,
        }
    }
}

/// Where the learned OCR model looks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelScope {
    /// One pass over the whole rectified board
    Board,
    /// One pass per cell
    Cell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Model readings at or above this confidence win the merge outright
    pub confidence_threshold: f32,
    /// Side of the normalized glyph compared against templates
    pub template_size: u32,
    /// How far below the best score a candidate with the right hole count may be
    pub hole_margin: f32,
    pub model_scope: ModelScope,
    /// Thread count handed to the model's numeric kernels
    pub model_threads: usize,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        RecognizerConfig {
            confidence_threshold: 0.75,
            template_size: 48,
            hole_margin: 0.15,
            model_scope: ModelScope::Board,
            model_threads: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub min_word_length: usize,
    /// Result list cap, 0 means unlimited
    pub max_results: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            min_word_length: 3,
            max_results: 50,
        }
    }
}
