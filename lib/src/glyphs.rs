//! A 5x7 bitmap font for the letters A-Z.
//!
//! Used to render fallback templates when no reference images are installed, and to draw
//! synthetic boards. Each row is five bits, most significant bit on the left.
use image::{GrayImage, Luma};

pub const GLYPH_COLS: u32 = 5;
pub const GLYPH_ROWS: u32 = 7;

/// Glyph height as a fraction of a normalized cell
pub const GLYPH_HEIGHT: f32 = 0.55;

const FONT: [(char, [u8; 7]); 26] = [
    ('A', [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('B', [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E]),
    ('C', [0x0F, 0x10, 0x10, 0x10, 0x10, 0x10, 0x0F]),
    ('D', [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E]),
    ('E', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F]),
    ('F', [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10]),
    ('G', [0x0F, 0x10, 0x10, 0x13, 0x11, 0x11, 0x0F]),
    ('H', [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('I', [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('J', [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C]),
    ('K', [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('M', [0x11, 0x1B, 0x15, 0x11, 0x11, 0x11, 0x11]),
    ('N', [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('Q', [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E]),
    ('T', [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('V', [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x1B, 0x11]),
    ('X', [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11]),
    ('Y', [0x11, 0x11, 0x0A, 0x04, 0x04, 0x04, 0x04]),
    ('Z', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F]),
];

/// Bit rows for `letter`, case-insensitive
pub fn bitmap(letter: char) -> Option<[u8; 7]> {
    let letter = letter.to_ascii_uppercase();
    FONT.iter().find(|(c, _)| *c == letter).map(|(_, rows)| *rows)
}

pub fn letters() -> impl Iterator<Item = char> {
    FONT.iter().map(|(c, _)| *c)
}

/// Draw `letter` in black, centered at `center`, `height` pixels tall.
///
/// Returns false if the letter has no glyph.
pub fn draw_glyph(img: &mut GrayImage, letter: char, center: (f32, f32), height: f32) -> bool {
    let rows = match bitmap(letter) {
        Some(rows) => rows,
        None => return false,
    };
    let dot = height / GLYPH_ROWS as f32;
    let x0 = center.0 - dot * GLYPH_COLS as f32 / 2.0;
    let y0 = center.1 - height / 2.0;
    for (r, bits) in rows.iter().enumerate() {
        for c in 0..GLYPH_COLS {
            if bits & (0x10 >> c) == 0 {
                continue;
            }
            let left = (x0 + c as f32 * dot).round().max(0.0) as u32;
            let right = (x0 + (c + 1) as f32 * dot).round().max(0.0) as u32;
            let top = (y0 + r as f32 * dot).round().max(0.0) as u32;
            let bottom = (y0 + (r + 1) as f32 * dot).round().max(0.0) as u32;
            for y in top..bottom.min(img.height()) {
                for x in left..right.min(img.width()) {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }
    true
}

/// Render `letter` the way it appears in a normalized cell: black on white, centered,
/// [`GLYPH_HEIGHT`] of the cell tall.
pub fn render(letter: char, size: u32) -> Option<GrayImage> {
    let mut img = GrayImage::from_pixel(size, size, Luma([255]));
    let center = (size as f32 / 2.0, size as f32 / 2.0);
    if draw_glyph(&mut img, letter, center, size as f32 * GLYPH_HEIGHT) {
        Some(img)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_complete() {
        assert_eq!(letters().count(), 26);
        assert!(letters().all(|c| c.is_ascii_uppercase()));
        assert!(bitmap('q').is_some());
        assert!(bitmap('?').is_none());
    }

    #[test]
    fn test_render_centered() {
        let img = render('H', 64).unwrap();
        // left stem of H is dark, center of the top rows is white
        let dot = 64. * GLYPH_HEIGHT / 7.;
        let stem_x = (32. - 2. * dot) as u32;
        assert_eq!(img.get_pixel(stem_x, 32)[0], 0);
        assert_eq!(img.get_pixel(32, 22)[0], 255);
        assert_eq!(img.get_pixel(0, 0)[0], 255);
        assert!(render('#', 64).is_none());
    }
}
