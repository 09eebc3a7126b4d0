//! An OCR library that reads a word-grid puzzle from a photo and finds the words on it
//!
//! The photo goes through a fixed sequence of stages:
//! 1. [`Localizer`]: find the board with a cascade of detection strategies and warp it into a square
//! 2. [`GridSizer`]: count cell-sized regions to decide between a 4x4, 5x5 and 6x6 grid
//! 3. [`CellSegmenter`]: cut the square into normalized cell images
//! 4. [`Recognizer`]: read every cell with template matching and, optionally, an OCR engine
//! 5. [`Solver`]: search the letter grid for dictionary words
//!
//! # Basic usage
//! ```no_run
//! # use boggle_ocr::{Config, DictionaryIndex, Pipeline, TemplateLibrary, Error};
//! # use std::sync::Arc;
//! let config = Config::default();
//! let dictionary = Arc::new(DictionaryIndex::from_file("words.txt", config.solver.min_word_length)?);
//! let templates = TemplateLibrary::load_dir("templates", config.recognizer.template_size);
//! let pipeline = Pipeline::new(config, dictionary, templates).with_tesseract();
//! let result = pipeline.process_file("board.jpg")?;
//! println!("{}\n{:?}", result.board, result.words);
//! # Ok::<(), Error>(())
//! ```
//! This would print the recognized board followed by the words, longest first.
//!
//! ```text
//! CATS
//! ROPE
//! MILD
//! HUNT
//! ["CATS", "CROP", "ROPE", "TOP", ...]
//! ```
//!
//! The solver can also be used on its own:
//! ```
//! # use boggle_ocr::{DictionaryIndex, Letters, Solver, SolverConfig};
//! let dictionary = DictionaryIndex::from_words(["CAT", "CATS", "AT", "TA"], 3);
//! let letters = Letters::from_strs(&[&["C", "A"], &["T", "S"]])?;
//! let solution = Solver::new(&dictionary, SolverConfig::default()).solve(&letters);
//! let words: Vec<&str> = solution.words.iter().map(|w| w.word.as_str()).collect();
//! assert_eq!(words, ["CATS", "CAT"]);
//! # Ok::<(), boggle_ocr::Error>(())
//! ```

mod config;
mod dictionary;
mod error;
mod geometry;
pub mod glyphs;
mod localizer;
mod merge;
mod pipeline;
mod recognizer;
mod segmenter;
mod sizer;
mod solver;
mod templates;
mod tesseract;
mod utils;

pub use config::{
    Config, LocalizerConfig, ModelScope, RecognizerConfig, SegmenterConfig, SizerConfig,
    SolverConfig,
};
pub use dictionary::{DictionaryIndex, NodeId};
pub use error::Error;
pub use geometry::{approximate_quad, polygon_area, Quadrilateral};
pub use localizer::{Detection, Localizer, RectifiedBoard, Strategy};
pub use merge::{
    apply_corrections, canonical_unit, clean_text, merge, Reading, RecognizedLetter, Source,
    CONFUSION_TABLE, UNKNOWN,
};
pub use pipeline::{Pipeline, ProcessResult, Segmentation, StageTimings};
pub use recognizer::{Board, CellReading, Letters, Recognizer, MAX_CELLS};
pub use segmenter::{Cell, CellSegmenter};
pub use sizer::{GridDimension, GridSizer, Polarity};
pub use solver::{Solution, Solver, WordResult};
pub use templates::{count_holes, glyph_signature, r_or_p, Template, TemplateLibrary};
pub use tesseract::{parse_tsv, OcrModel, ReadMode, Tesseract, TextRegion};
pub use utils::{area_stats, montage};
