use anyhow::{Context, Result};
use boggle_ocr::{montage, Config, DictionaryIndex, Pipeline, TemplateLibrary};
use std::sync::Arc;

fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("Usage: cells IMAGE [OUTPUT]")?;
    let output = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "cells.png".to_string());

    let gray = image::open(&path)
        .with_context(|| format!("Failed to open {}", path))?
        .into_luma8();
    eprintln!("read image from {}", path);

    let config = Config::default();
    let cell_px = config.segmenter.cell_size;
    let templates = TemplateLibrary::builtin(config.recognizer.template_size);
    let dictionary = DictionaryIndex::from_words(Vec::<String>::new(), 1);
    let pipeline = Pipeline::new(config, Arc::new(dictionary), templates);
    let segmentation = pipeline.segment(&gray)?;
    eprintln!(
        "{:?} found a {}x{} grid",
        segmentation.board.detection.strategy,
        segmentation.dimension.n(),
        segmentation.dimension.n()
    );
    segmentation.board.image.save("board.png")?;
    montage(&segmentation.cells, segmentation.dimension.n(), cell_px).save(&output)?;
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("{:?}", err);
        std::process::exit(1);
    }
}
