use crate::config::SegmenterConfig;
use crate::utils::{area_stats, binarize, invert, mean};
use image::imageops::{resize, FilterType};
use image::math::Rect;
use image::{GenericImageView, GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level};
use log::debug;

/// A normalized cell image: dark glyph on a white background, `cell_size` square.
#[derive(Debug, Clone)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    pub image: GrayImage,
    /// No glyph was found, the image is plain white
    pub blank: bool,
}

/// Splits a rectified board into normalized cell images.
pub struct CellSegmenter {
    config: SegmenterConfig,
}

impl CellSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        CellSegmenter { config }
    }

    /// Bounding rectangles of the `n x n` cells of a `width x height` board, in row-major order,
    /// each shrunk by the inset fraction on every side.
    pub fn cell_rects(&self, width: u32, height: u32, n: usize) -> Vec<Rect> {
        let mut rects = Vec::with_capacity(n * n);
        if n == 0 {
            return rects;
        }
        let (cell_w, cell_h) = (width as f32 / n as f32, height as f32 / n as f32);
        let (inset_x, inset_y) = (
            (cell_w * self.config.inset) as u32,
            (cell_h * self.config.inset) as u32,
        );
        for row in 0..n {
            for col in 0..n {
                let x0 = (col as f32 * cell_w) as u32 + inset_x;
                let x1 = ((col + 1) as f32 * cell_w) as u32 - inset_x;
                let y0 = (row as f32 * cell_h) as u32 + inset_y;
                let y1 = ((row + 1) as f32 * cell_h) as u32 - inset_y;
                rects.push(Rect {
                    x: x0,
                    y: y0,
                    width: x1.saturating_sub(x0).max(1),
                    height: y1.saturating_sub(y0).max(1),
                });
            }
        }
        rects
    }

    /// Cut the board into `n x n` normalized cells, row-major.
    pub fn segment(&self, board: &GrayImage, n: usize) -> Vec<Cell> {
        let rects = self.cell_rects(board.width(), board.height(), n);
        rects
            .iter()
            .enumerate()
            .map(|(index, rect)| {
                let crop = board
                    .view(rect.x, rect.y, rect.width, rect.height)
                    .to_image();
                let (image, blank) = self.normalize(&crop);
                if blank {
                    debug!("cell ({}, {}) is blank", index / n, index % n);
                }
                Cell {
                    row: index / n,
                    col: index % n,
                    image,
                    blank,
                }
            })
            .collect()
    }

    /// Resize to the working resolution, stretch the contrast and binarize so that the glyph is
    /// dark on white.
    pub fn normalize(&self, crop: &GrayImage) -> (GrayImage, bool) {
        let size = self.config.cell_size;
        let resized = resize(crop, size, size, FilterType::Triangle);
        let (_, std) = area_stats(&resized);
        if std < self.config.blank_std {
            return (GrayImage::from_pixel(size, size, Luma([255])), true);
        }
        let enhanced = equalize_histogram(&resized);
        let binary = binarize(&enhanced, otsu_level(&enhanced));
        // the glyph covers less than half of the cell
        if mean(&binary) < 128. {
            (invert(&binary), false)
        } else {
            (binary, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::draw_glyph;

    fn segmenter() -> CellSegmenter {
        CellSegmenter::new(SegmenterConfig::default())
    }

    #[test]
    fn test_cell_rects() {
        let rects = segmenter().cell_rects(400, 400, 4);
        assert_eq!(rects.len(), 16);
        assert_eq!(
            rects[0],
            Rect {
                x: 15,
                y: 15,
                width: 70,
                height: 70
            }
        );
        assert_eq!(rects[5].x, 115);
        assert_eq!(rects[15].y, 315);
    }

    #[test]
    fn test_segment_is_deterministic() {
        let mut board = GrayImage::from_pixel(300, 300, Luma([255]));
        for i in 0..3 {
            for j in 0..3 {
                let center = (50. + 100. * j as f32, 50. + 100. * i as f32);
                draw_glyph(&mut board, 'E', center, 40.);
            }
        }
        let a = segmenter().segment(&board, 3);
        let b = segmenter().segment(&board, 3);
        assert_eq!(a.len(), 9);
        assert_eq!((a[7].row, a[7].col), (2, 1));
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.image, y.image);
            assert!(!x.blank);
            assert_eq!(x.image.dimensions(), (64, 64));
        }
    }

    #[test]
    fn test_light_glyph_on_dark_tile_is_inverted() {
        let mut tile = GrayImage::from_pixel(80, 80, Luma([255]));
        draw_glyph(&mut tile, 'T', (40., 40.), 44.);
        let dark_tile = invert(&tile);
        let (cell, blank) = segmenter().normalize(&dark_tile);
        assert!(!blank);
        // background is white again, the glyph dark
        assert_eq!(cell.get_pixel(1, 1)[0], 255);
        assert!(mean(&cell) > 128.);
    }

    #[test]
    fn test_blank_cell() {
        let tile = GrayImage::from_pixel(70, 70, Luma([40]));
        let (cell, blank) = segmenter().normalize(&tile);
        assert!(blank);
        assert!(cell.pixels().all(|p| p[0] == 255));
    }
}
