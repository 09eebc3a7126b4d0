mod common;

use anyhow::{Context, Result};
use boggle_ocr::{Config, GridDimension, GridSizer, Localizer, Strategy};
use common::{draw_board, draw_board_at, BoardStyle};
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

const ROWS: [&str; 4] = ["CATS", "ROPE", "MYLD", "HUNK"];

fn close(a: (f32, f32), b: (f32, f32), tolerance: f32) -> bool {
    (a.0 - b.0).abs() <= tolerance && (a.1 - b.1).abs() <= tolerance
}

#[test]
fn test_large_photo_detected_on_downscaled_copy() -> Result<()> {
    let style = BoardStyle {
        cell: 160,
        line: 4,
        ..BoardStyle::default()
    };
    let mut img = GrayImage::from_pixel(1600, 1200, Luma([style.background]));
    draw_board_at(&mut img, &ROWS, &style, (480, 280));

    let config = Config::default();
    let board = Localizer::new(config.localizer.clone()).locate(&img)?;
    assert_eq!(board.detection.strategy, Strategy::OuterContour);
    let expected = [(480., 280.), (1120., 280.), (1120., 920.), (480., 920.)];
    for (found, expected) in board.detection.quad.corners.iter().zip(expected) {
        assert!(
            close(*found, expected, 12.0),
            "corner {:?} too far from {:?}",
            found,
            expected
        );
    }
    assert_eq!(board.image.dimensions(), (400, 400));

    let dimension = GridSizer::new(config.sizer).infer_size(&board.image)?;
    assert_eq!(dimension, GridDimension::Four);
    Ok(())
}

#[test]
fn test_perspective_board() -> Result<()> {
    let style = BoardStyle::default();
    let flat = draw_board(&ROWS, &style);
    let (w, h) = (flat.width() as f32, flat.height() as f32);
    // the far edge of the table is smaller
    let projection = Projection::from_control_points(
        [(0., 0.), (w, 0.), (w, h), (0., h)],
        [(30., 10.), (w - 30., 10.), (w, h), (0., h)],
    )
    .context("degenerate control points")?;
    let mut photo = GrayImage::new(flat.width(), flat.height());
    warp_into(
        &flat,
        &projection,
        Interpolation::Bilinear,
        Luma([style.background]),
        &mut photo,
    );

    let config = Config::default();
    let board = Localizer::new(config.localizer.clone()).locate(&photo)?;
    assert_eq!(board.detection.strategy, Strategy::OuterContour);
    let [top_left, top_right, bottom_right, bottom_left] = board.detection.quad.corners;
    assert!(top_right.0 - top_left.0 < bottom_right.0 - bottom_left.0);

    let dimension = GridSizer::new(config.sizer).infer_size(&board.image)?;
    assert_eq!(dimension, GridDimension::Four);
    Ok(())
}
