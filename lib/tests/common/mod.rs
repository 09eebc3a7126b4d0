//! Synthetic board photos for the integration tests.
#![allow(dead_code)]

use boggle_ocr::glyphs;
use image::{GrayImage, ImageFormat, Luma};
use std::io::Cursor;

/// How a synthetic board is laid out on its photo
pub struct BoardStyle {
    /// Pixels per cell
    pub cell: u32,
    /// Width of the grid lines and the outer frame
    pub line: u32,
    /// Empty space around the board
    pub margin: u32,
    pub background: u8,
}

impl Default for BoardStyle {
    fn default() -> Self {
        BoardStyle {
            cell: 80,
            line: 2,
            margin: 100,
            background: 200,
        }
    }
}

pub fn fill_rect(img: &mut GrayImage, x: u32, y: u32, w: u32, h: u32, value: u8) {
    for yy in y..(y + h).min(img.height()) {
        for xx in x..(x + w).min(img.width()) {
            img.put_pixel(xx, yy, Luma([value]));
        }
    }
}

/// Draw a white board with black grid lines and one glyph per cell on a square photo. Rows are
/// strings of letters, `Q` stands for the QU cube and a space leaves the cell empty.
pub fn draw_board(rows: &[&str], style: &BoardStyle) -> GrayImage {
    let size = rows.len() as u32 * style.cell + 2 * style.margin;
    let mut img = GrayImage::from_pixel(size, size, Luma([style.background]));
    draw_board_at(&mut img, rows, style, (style.margin, style.margin));
    img
}

/// Draw the board with its top-left corner at `origin`, ignoring `style.margin`.
pub fn draw_board_at(img: &mut GrayImage, rows: &[&str], style: &BoardStyle, origin: (u32, u32)) {
    let n = rows.len() as u32;
    let side = n * style.cell;
    let (x0, y0) = origin;
    fill_rect(img, x0, y0, side, side, 255);

    let half = style.line / 2;
    for k in 0..=n {
        let at = (x0 + k * style.cell).saturating_sub(half);
        fill_rect(img, at, y0.saturating_sub(half), style.line, side + style.line, 0);
        let at = (y0 + k * style.cell).saturating_sub(half);
        fill_rect(img, x0.saturating_sub(half), at, side + style.line, style.line, 0);
    }

    let height = style.cell as f32 * 0.385;
    for (r, row) in rows.iter().enumerate() {
        for (c, letter) in row.chars().enumerate() {
            let center = (
                x0 as f32 + (c as f32 + 0.5) * style.cell as f32,
                y0 as f32 + (r as f32 + 0.5) * style.cell as f32,
            );
            glyphs::draw_glyph(img, letter, center, height);
        }
    }
}

/// Draw a light board face with one dark tile per cell and the letters in light ink, the way
/// a physical Boggle set looks. `style.line` is the face visible on each side of a tile.
pub fn draw_tile_board(rows: &[&str], style: &BoardStyle) -> GrayImage {
    const FACE: u8 = 235;
    const TILE: u8 = 30;
    const LETTER: u8 = 240;
    let n = rows.len() as u32;
    let side = n * style.cell;
    let size = side + 2 * style.margin;
    let mut img = GrayImage::from_pixel(size, size, Luma([style.background]));
    let (x0, y0) = (style.margin, style.margin);
    fill_rect(&mut img, x0, y0, side, side, FACE);

    let height = style.cell as f32 * 0.385;
    let inner = style.cell - 2 * style.line;
    for (r, row) in rows.iter().enumerate() {
        for (c, letter) in row.chars().enumerate() {
            // glyph drawn dark on a white scratch tile, then mapped to tile colors
            let mut tile = GrayImage::from_pixel(inner, inner, Luma([255]));
            let center = (inner as f32 / 2.0, inner as f32 / 2.0);
            glyphs::draw_glyph(&mut tile, letter, center, height);
            let left = x0 + c as u32 * style.cell + style.line;
            let top = y0 + r as u32 * style.cell + style.line;
            for (x, y, p) in tile.enumerate_pixels() {
                let value = if p[0] == 0 { LETTER } else { TILE };
                img.put_pixel(left + x, top + y, Luma([value]));
            }
        }
    }
    img
}

pub fn encode_png(img: &GrayImage) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png)
        .expect("png encoding");
    bytes.into_inner()
}

/// Expected board units for `rows`, as `Letters` would hold them
pub fn units(rows: &[&str]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| {
            row.chars()
                .map(|c| match c {
                    'Q' => "QU".to_string(),
                    ' ' => "?".to_string(),
                    c => c.to_string(),
                })
                .collect()
        })
        .collect()
}
