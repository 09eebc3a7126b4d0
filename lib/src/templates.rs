//! Reference letter images and normalized cross-correlation matching.
//!
//! Cells and templates are both reduced to a glyph signature before matching: the ink is
//! cropped to its bounding box, scaled to a fixed size and centered on a black canvas. This makes
//! the comparison insensitive to where the glyph sits in its cell and how big it is.
use crate::glyphs;
use crate::merge::{canonical_unit, Reading};
use crate::utils::{binarize, invert, mean};
use crate::Error;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::region_labelling::{connected_components, Connectivity};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// Enclosed background regions smaller than this are noise
const MIN_HOLE_PIXELS: u32 = 8;

/// Share of ink in the lower right quadrant above which a P/R glyph is an R
const R_LEG_RATIO: f32 = 0.08;

/// Resolution the built-in font is rendered at, same as a normalized cell
const RENDER_SIZE: u32 = 64;

#[derive(Debug, Clone)]
pub struct Template {
    pub unit: String,
    pub signature: GrayImage,
    /// Enclosed background regions of the glyph
    pub holes: usize,
}

#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    templates: Vec<Template>,
    size: u32,
}

/// A scored template, used while picking the best match
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    unit: String,
    score: f32,
    holes: usize,
}

impl TemplateLibrary {
    /// Templates rendered from the built-in 5x7 font.
    pub fn builtin(size: u32) -> TemplateLibrary {
        let images = glyphs::letters()
            .filter_map(|c| glyphs::render(c, RENDER_SIZE).map(|img| (c.to_string(), img)));
        TemplateLibrary::from_images(images, size)
    }

    /// Build templates from dark-on-light letter images. Images that contain no ink are skipped.
    pub fn from_images<I, S>(images: I, size: u32) -> TemplateLibrary
    where
        I: IntoIterator<Item = (S, GrayImage)>,
        S: AsRef<str>,
    {
        let templates = images
            .into_iter()
            .filter_map(|(unit, img)| {
                let img = normalize_reference(&img);
                let signature = glyph_signature(&img, size)?;
                Some(Template {
                    unit: canonical_unit(unit.as_ref()),
                    signature,
                    holes: count_holes(&img),
                })
            })
            .collect();
        TemplateLibrary { templates, size }
    }

    /// Load `*.png` reference images from `dir`.
    ///
    /// The file stem up to the first `_` names the letter, so `A.png` and `A_2.png` are both
    /// templates for A. Unreadable files are skipped. A missing or empty directory yields the
    /// built-in library.
    pub fn load_dir<P: AsRef<Path>>(dir: P, size: u32) -> TemplateLibrary {
        let dir = dir.as_ref();
        let mut paths = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.extension()
                        .map_or(false, |ext| ext.eq_ignore_ascii_case("png"))
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                warn!("template directory {} unavailable: {}", dir.display(), e);
                return TemplateLibrary::builtin(size);
            }
        };
        paths.sort();

        let mut images = Vec::new();
        for path in paths {
            let unit = match path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.split('_').next())
                .map(|stem| stem.to_ascii_uppercase())
            {
                Some(unit) if is_unit(&unit) => unit,
                _ => {
                    debug!("skipping {}", path.display());
                    continue;
                }
            };
            match image::open(&path) {
                Ok(img) => images.push((unit, img.to_luma8())),
                Err(source) => warn!("{}", Error::TemplateRead { path, source }),
            }
        }
        let library = TemplateLibrary::from_images(images, size);
        if library.is_empty() {
            warn!("no templates in {}, using built-in font", dir.display());
            return TemplateLibrary::builtin(size);
        }
        info!(
            "loaded {} templates from {}",
            library.len(),
            dir.display()
        );
        library
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Best template for a normalized cell (dark glyph on white).
    ///
    /// When the hole count of the best scoring template is off by more than one from the cell's,
    /// the first template within one hole of the cell that scores within `hole_margin` of the
    /// best one is taken instead. A P or R result is then settled by [`r_or_p`].
    /// Returns `None` when the cell has no ink or the library is empty.
    pub fn best_match(&self, cell: &GrayImage, hole_margin: f32) -> Option<Reading> {
        let signature = glyph_signature(cell, self.size)?;
        let mut candidates: Vec<Candidate> = self
            .templates
            .iter()
            .map(|t| Candidate {
                unit: t.unit.clone(),
                score: ncc(&signature, &t.signature),
                holes: t.holes,
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        let holes = count_holes(cell);
        let best = resolve_holes(&candidates, holes, hole_margin)?;
        let mut unit = best.unit.clone();
        if unit == "R" || unit == "P" {
            unit = r_or_p(&signature).to_string();
        }
        debug!(
            "template {} score {:.3} holes {} (top {} {:.3})",
            unit, best.score, holes, candidates[0].unit, candidates[0].score
        );
        Some(Reading {
            letter: unit,
            confidence: best.score.clamp(0.0, 1.0),
        })
    }

    /// Settle a P/R reading from any source by looking at the cell itself.
    pub fn check_r_or_p(&self, cell: &GrayImage) -> Option<&'static str> {
        glyph_signature(cell, self.size).map(|signature| r_or_p(&signature))
    }
}

fn is_unit(s: &str) -> bool {
    s == "QU" || (s.len() == 1 && s.bytes().all(|b| b.is_ascii_uppercase()))
}

/// Make a reference image look like a normalized cell: binary, dark glyph on white.
fn normalize_reference(img: &GrayImage) -> GrayImage {
    let binary = binarize(img, otsu_level(img));
    if mean(&binary) < 128. {
        invert(&binary)
    } else {
        binary
    }
}

/// Template and cell hole counts may differ by at most one
fn holes_compatible(template: usize, cell: usize) -> bool {
    template.abs_diff(cell) <= 1
}

fn resolve_holes(candidates: &[Candidate], holes: usize, margin: f32) -> Option<&Candidate> {
    let best = candidates.first()?;
    if holes_compatible(best.holes, holes) {
        return Some(best);
    }
    let alternative = candidates
        .iter()
        .take_while(|c| c.score >= best.score - margin)
        .find(|c| holes_compatible(c.holes, holes));
    match alternative {
        Some(c) => {
            debug!(
                "hole count {} overrides {} with {}",
                holes, best.unit, c.unit
            );
            Some(c)
        }
        None => Some(best),
    }
}

fn ncc(a: &GrayImage, b: &GrayImage) -> f32 {
    let scores = match_template(a, b, MatchTemplateMethod::CrossCorrelationNormalized);
    let score = find_extremes(&scores).max_value;
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

/// Pixel count, bounding box and border contact of one labelled region
#[derive(Debug, Clone, Copy)]
struct Region {
    count: u32,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
    touches_border: bool,
}

/// Regions indexed by label, index 0 is the background
fn regions(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<Region> {
    let (w, h) = labels.dimensions();
    let max_label = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut regions = vec![
        Region {
            count: 0,
            left: u32::MAX,
            top: u32::MAX,
            right: 0,
            bottom: 0,
            touches_border: false,
        };
        max_label + 1
    ];
    for (x, y, p) in labels.enumerate_pixels() {
        let r = &mut regions[p[0] as usize];
        r.count += 1;
        r.left = r.left.min(x);
        r.top = r.top.min(y);
        r.right = r.right.max(x);
        r.bottom = r.bottom.max(y);
        r.touches_border |= x == 0 || y == 0 || x + 1 == w || y + 1 == h;
    }
    regions
}

/// Number of enclosed light regions in a dark-on-light binary cell.
pub fn count_holes(cell: &GrayImage) -> usize {
    let light = GrayImage::from_fn(cell.width(), cell.height(), |x, y| {
        Luma([if cell.get_pixel(x, y)[0] >= 128 { 255u8 } else { 0 }])
    });
    let labels = connected_components(&light, Connectivity::Four, Luma([0u8]));
    regions(&labels)
        .iter()
        .skip(1)
        .filter(|r| r.count >= MIN_HOLE_PIXELS && !r.touches_border)
        .count()
}

/// Normalized glyph of a dark-on-light cell: white ink on a black `size` square, scaled so the
/// longer side of the ink spans 80% of the square.
///
/// Ink regions smaller than a tenth of the largest one are dropped, and so are regions touching
/// the cell border unless it is the largest.
pub fn glyph_signature(cell: &GrayImage, size: u32) -> Option<GrayImage> {
    let ink = GrayImage::from_fn(cell.width(), cell.height(), |x, y| {
        Luma([if cell.get_pixel(x, y)[0] < 128 { 255u8 } else { 0 }])
    });
    let labels = connected_components(&ink, Connectivity::Eight, Luma([0u8]));
    let regions = regions(&labels);
    let (largest, biggest) = regions
        .iter()
        .enumerate()
        .skip(1)
        .max_by_key(|(_, r)| r.count)
        .map(|(label, r)| (label, r.count))?;
    if biggest == 0 {
        return None;
    }
    let keep: Vec<bool> = regions
        .iter()
        .enumerate()
        .map(|(label, r)| {
            label != 0
                && r.count * 10 >= biggest
                && (label == largest || !r.touches_border)
        })
        .collect();
    let (left, top, right, bottom) = regions
        .iter()
        .zip(keep.iter())
        .filter(|(_, k)| **k)
        .fold((u32::MAX, u32::MAX, 0, 0), |(l, t, r, b), (region, _)| {
            (
                l.min(region.left),
                t.min(region.top),
                r.max(region.right),
                b.max(region.bottom),
            )
        });
    let (w, h) = (right - left + 1, bottom - top + 1);
    let crop = GrayImage::from_fn(w, h, |x, y| {
        let label = labels.get_pixel(left + x, top + y)[0] as usize;
        Luma([if keep[label] { 255u8 } else { 0 }])
    });

    let scale = 0.8 * size as f32 / w.max(h) as f32;
    let (sw, sh) = (
        ((w as f32 * scale).round() as u32).clamp(1, size),
        ((h as f32 * scale).round() as u32).clamp(1, size),
    );
    let scaled = imageops::resize(&crop, sw, sh, FilterType::Triangle);
    let mut signature = GrayImage::new(size, size);
    imageops::replace(
        &mut signature,
        &scaled,
        ((size - sw) / 2) as i64,
        ((size - sh) / 2) as i64,
    );
    Some(signature)
}

/// R has a leg in the lower right quadrant, P is empty there. Decided by the share of the
/// glyph's ink that falls in that quadrant.
pub fn r_or_p(signature: &GrayImage) -> &'static str {
    let (w, h) = signature.dimensions();
    let (x0, y0) = (w / 2, h / 2);
    let ink = |(x, y): (u32, u32)| signature.get_pixel(x, y)[0] as f32 / 255.0;
    let total: f32 = (0..h).flat_map(|y| (0..w).map(move |x| (x, y))).map(ink).sum();
    let lower_right: f32 = (y0..h)
        .flat_map(|y| (x0..w).map(move |x| (x, y)))
        .map(ink)
        .sum();
    if total > 0.0 && lower_right / total > R_LEG_RATIO {
        "R"
    } else {
        "P"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::{draw_glyph, render};

    fn candidate(unit: &str, score: f32, holes: usize) -> Candidate {
        Candidate {
            unit: unit.to_string(),
            score,
            holes,
        }
    }

    #[test]
    fn test_builtin_library() {
        let library = TemplateLibrary::builtin(48);
        assert_eq!(library.len(), 26);
        assert!(library.templates().iter().any(|t| t.unit == "QU"));
        assert!(!library.templates().iter().any(|t| t.unit == "Q"));
    }

    #[test]
    fn test_count_holes() {
        for (letter, holes) in [('A', 1), ('B', 2), ('D', 1), ('O', 1), ('P', 1), ('Q', 1), ('R', 1)]
        {
            assert_eq!(count_holes(&render(letter, 64).unwrap()), holes, "{}", letter);
        }
        for letter in ['C', 'E', 'K', 'M', 'X', 'W'] {
            assert_eq!(count_holes(&render(letter, 64).unwrap()), 0, "{}", letter);
        }
        assert_eq!(count_holes(&GrayImage::from_pixel(64, 64, Luma([255]))), 0);
    }

    #[test]
    fn test_every_rendered_letter_matches_itself() {
        let library = TemplateLibrary::builtin(48);
        for letter in glyphs::letters() {
            let cell = render(letter, 64).unwrap();
            let reading = library.best_match(&cell, 0.15).unwrap();
            assert_eq!(reading.letter, canonical_unit(&letter.to_string()));
            assert!(reading.confidence > 0.99, "{} {}", letter, reading.confidence);
        }
    }

    #[test]
    fn test_offset_glyph_matches() {
        let library = TemplateLibrary::builtin(48);
        for letter in ['B', 'H', 'P', 'R'] {
            let mut cell = GrayImage::from_pixel(64, 64, Luma([255]));
            draw_glyph(&mut cell, letter, (27., 35.), 30.);
            let reading = library.best_match(&cell, 0.15).unwrap();
            assert_eq!(reading.letter, letter.to_string());
        }
    }

    #[test]
    fn test_blank_cell_has_no_match() {
        let library = TemplateLibrary::builtin(48);
        let cell = GrayImage::from_pixel(64, 64, Luma([255]));
        assert!(library.best_match(&cell, 0.15).is_none());
    }

    #[test]
    fn test_border_noise_is_ignored() {
        let clean = glyph_signature(&render('T', 64).unwrap(), 48).unwrap();
        let mut noisy = render('T', 64).unwrap();
        // grid line remnant along the left edge
        for y in 0..64 {
            for x in 0..3 {
                noisy.put_pixel(x, y, Luma([0]));
            }
        }
        let noisy = glyph_signature(&noisy, 48).unwrap();
        assert_eq!(clean, noisy);
    }

    #[test]
    fn test_hole_count_overrides_close_candidate() {
        let candidates = vec![
            candidate("C", 0.81, 0),
            candidate("B", 0.74, 2),
            candidate("D", 0.50, 1),
        ];
        // two holes rule out C, B is close enough behind
        assert_eq!(resolve_holes(&candidates, 2, 0.15).unwrap().unit, "B");
        assert_eq!(resolve_holes(&candidates, 0, 0.15).unwrap().unit, "C");
        // the matching candidate is too far behind
        assert_eq!(resolve_holes(&candidates, 2, 0.05).unwrap().unit, "C");
        assert!(resolve_holes(&[], 1, 0.15).is_none());
    }

    #[test]
    fn test_hole_count_off_by_one_keeps_best() {
        // an A whose hole leaked into the background still reads as A
        let candidates = vec![candidate("A", 0.90, 1), candidate("H", 0.85, 0)];
        assert_eq!(resolve_holes(&candidates, 0, 0.15).unwrap().unit, "A");
        let candidates = vec![candidate("O", 0.88, 1), candidate("B", 0.80, 2)];
        assert_eq!(resolve_holes(&candidates, 2, 0.15).unwrap().unit, "O");
        assert_eq!(resolve_holes(&candidates, 0, 0.15).unwrap().unit, "O");
    }

    #[test]
    fn test_r_or_p_uses_share_of_ink() {
        // 100 ink pixels in a 40x40 signature, some of them in the lower right quadrant
        let signature = |lower_right: u32| {
            let mut img = GrayImage::new(40, 40);
            let mut placed = 0;
            for y in 0..20 {
                for x in 0..20 {
                    if placed < 100 - lower_right {
                        img.put_pixel(x, y, Luma([255]));
                        placed += 1;
                    }
                }
            }
            for i in 0..lower_right {
                img.put_pixel(25 + i % 10, 25 + i / 10, Luma([255]));
            }
            img
        };
        assert_eq!(r_or_p(&signature(9)), "R");
        assert_eq!(r_or_p(&signature(7)), "P");
        assert_eq!(r_or_p(&GrayImage::new(40, 40)), "P");
    }

    #[test]
    fn test_r_or_p() {
        let library = TemplateLibrary::builtin(48);
        assert_eq!(library.check_r_or_p(&render('R', 64).unwrap()), Some("R"));
        assert_eq!(library.check_r_or_p(&render('P', 64).unwrap()), Some("P"));
    }

    #[test]
    fn test_load_missing_dir_falls_back_to_builtin() {
        let library = TemplateLibrary::load_dir("/nonexistent/templates", 48);
        assert_eq!(library.len(), 26);
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        for (name, letter) in [("A", 'A'), ("b_2", 'B'), ("Q", 'Q')] {
            let img = render(letter, 64).unwrap();
            img.save(dir.path().join(format!("{}.png", name))).unwrap();
        }
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        std::fs::write(dir.path().join("Z.png"), b"not a png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"A").unwrap();
        let library = TemplateLibrary::load_dir(dir.path(), 48);
        let units: Vec<&str> = library.templates().iter().map(|t| t.unit.as_str()).collect();
        // sorted by file name, the undecodable Z.png is skipped
        assert_eq!(units, vec!["A", "QU", "B"]);
    }
}
