use crate::segmenter::Cell;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};

pub(crate) type IntegralImage = ImageBuffer<Luma<u64>, Vec<u64>>;

/// Tile normalized cells into one image, `n` per row, each scaled to `cell_px` and separated by a
/// one pixel mid-gray line.
pub fn montage(cells: &[Cell], n: usize, cell_px: u32) -> GrayImage {
    if cells.is_empty() || n == 0 {
        return GrayImage::new(0, 0);
    }
    let rows = ((cells.len() + n - 1) / n) as u32;
    let pitch = cell_px + 1;
    let mut montage = GrayImage::from_pixel(pitch * n as u32 + 1, pitch * rows + 1, Luma([128]));
    for cell in cells {
        let tile = if cell.image.width() != cell_px || cell.image.height() != cell_px {
            imageops::resize(&cell.image, cell_px, cell_px, FilterType::Triangle)
        } else {
            cell.image.clone()
        };
        let (x, y) = (
            1 + cell.col as u32 * pitch,
            1 + cell.row as u32 * pitch,
        );
        imageops::replace(&mut montage, &tile, x as i64, y as i64);
    }
    montage
}

/// Mean and standard deviation of all pixels, both scaled to 0..1.
pub fn area_stats(img: &GrayImage) -> (f64, f64) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return (0.0, 0.0);
    }
    let integral: IntegralImage = integral_image::<_, u64>(img);
    let integral_squared: IntegralImage = integral_squared_image::<_, u64>(img);
    let (right, bottom) = (w - 1, h - 1);
    let sum = sum_image_pixels(&integral, 0, 0, right, bottom)[0];
    let var = variance(&integral, &integral_squared, 0, 0, right, bottom);
    let count = (w * h) as f64;
    (sum as f64 / count / 256., var.max(0.0).sqrt() / 256.)
}

/// This is a modified copy of [imageproc::integral_image::variance]()
pub(crate) fn variance(
    integral_image: &IntegralImage,
    integral_squared_image: &IntegralImage,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
) -> f64 {
    let n = (right - left + 1) as f64 * (bottom - top + 1) as f64;
    let sum_sq = sum_image_pixels(integral_squared_image, left, top, right, bottom)[0];
    let sum = sum_image_pixels(integral_image, left, top, right, bottom)[0];
    (sum_sq as f64 - (sum as f64).powi(2) / n) / n
}

/// Mark pixels darker than their local mean by more than `offset` as 255, all others 0.
///
/// The local mean is taken over a `(2 * radius + 1)` square window clipped at the image border.
pub fn local_mean_threshold(img: &GrayImage, radius: u32, offset: u8) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }
    let integral: IntegralImage = integral_image::<_, u64>(img);
    GrayImage::from_fn(w, h, |x, y| {
        let (left, top) = (x.saturating_sub(radius), y.saturating_sub(radius));
        let (right, bottom) = ((x + radius).min(w - 1), (y + radius).min(h - 1));
        let count = ((right - left + 1) * (bottom - top + 1)) as u64;
        let mean = sum_image_pixels(&integral, left, top, right, bottom)[0] / count;
        let value = img.get_pixel(x, y)[0] as u64;
        if value + (offset as u64) < mean {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Two-level image: pixels above `level` become 255, the rest 0.
pub fn binarize(img: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        if img.get_pixel(x, y)[0] > level {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

pub fn invert(img: &GrayImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([255 - img.get_pixel(x, y)[0]])
    })
}

pub fn mean(img: &GrayImage) -> f64 {
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return 0.0;
    }
    img.pixels().map(|p| p[0] as u64).sum::<u64>() as f64 / count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_stats_uniform() {
        let img = GrayImage::from_pixel(10, 10, Luma([128]));
        let (mean, std) = area_stats(&img);
        assert!((mean - 0.5).abs() < 1e-9);
        assert!(std < 1e-9);
    }

    #[test]
    fn test_area_stats_half_black() {
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 255 }]));
        let (mean, std) = area_stats(&img);
        assert!((mean - 127.5 / 256.).abs() < 1e-9);
        assert!((std - 127.5 / 256.).abs() < 1e-9);
    }

    #[test]
    fn test_local_mean_threshold_marks_dark_line() {
        let img = GrayImage::from_fn(21, 21, |x, _| Luma([if x == 10 { 0 } else { 255 }]));
        let ink = local_mean_threshold(&img, 5, 2);
        assert_eq!(ink.get_pixel(10, 10)[0], 255);
        assert_eq!(ink.get_pixel(3, 10)[0], 0);
        let flat = local_mean_threshold(&GrayImage::from_pixel(8, 8, Luma([90])), 5, 2);
        assert!(flat.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_binarize_and_invert() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 80) as u8]));
        let bin = binarize(&img, 100);
        assert_eq!(bin.as_raw(), &vec![0, 0, 255, 255]);
        assert_eq!(invert(&bin).as_raw(), &vec![255, 255, 0, 0]);
        assert!((mean(&bin) - 127.5).abs() < 1e-9);
    }
}
