use crate::config::Config;
use crate::dictionary::DictionaryIndex;
use crate::localizer::{Detection, Localizer, RectifiedBoard};
use crate::recognizer::{Board, CellReading, Letters, Recognizer};
use crate::segmenter::{Cell, CellSegmenter};
use crate::sizer::{GridDimension, GridSizer};
use crate::solver::{Solver, WordResult};
use crate::templates::TemplateLibrary;
use crate::tesseract::{OcrModel, Tesseract};
use crate::Error;
use image::GrayImage;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Wall clock milliseconds per stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub decode: f64,
    pub board_detect: f64,
    pub grid_infer: f64,
    pub cell_split: f64,
    pub recognize: f64,
    pub solve: f64,
    pub total: f64,
}

fn timed<T, F: FnOnce() -> T>(ms: &mut f64, f: F) -> T {
    let start = Instant::now();
    let result = f();
    *ms = start.elapsed().as_secs_f64() * 1000.0;
    result
}

/// Everything `process` learned about one photo
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub grid_size: usize,
    pub board: Letters,
    /// Found words, longest first
    pub words: Vec<String>,
    pub paths: Vec<WordResult>,
    /// Distinct words found, before the result cap
    pub word_count: usize,
    pub cell_confidences: Vec<Vec<f32>>,
    /// Per-cell template and model readings
    pub cells: Vec<CellReading>,
    pub stage_timings: StageTimings,
    pub detection: Detection,
}

/// The board, its size and its normalized cells, before recognition
pub struct Segmentation {
    pub board: RectifiedBoard,
    pub dimension: GridDimension,
    pub cells: Vec<Cell>,
}

/// Photo in, words out.
///
/// A `Pipeline` holds only read-only state apart from the OCR model, which is locked for the
/// duration of one recognition. It can be shared between threads behind an `Arc`.
pub struct Pipeline {
    config: Config,
    dictionary: Arc<DictionaryIndex>,
    localizer: Localizer,
    sizer: GridSizer,
    segmenter: CellSegmenter,
    recognizer: Recognizer,
}

impl Pipeline {
    pub fn new(config: Config, dictionary: Arc<DictionaryIndex>, templates: TemplateLibrary) -> Self {
        Pipeline {
            localizer: Localizer::new(config.localizer.clone()),
            sizer: GridSizer::new(config.sizer.clone()),
            segmenter: CellSegmenter::new(config.segmenter.clone()),
            recognizer: Recognizer::new(config.recognizer.clone(), templates),
            dictionary,
            config,
        }
    }

    pub fn with_model(mut self, model: Box<dyn OcrModel>) -> Self {
        self.recognizer = self.recognizer.with_model(model);
        self
    }

    /// Add the `tesseract` engine as model source if it is installed.
    pub fn with_tesseract(self) -> Self {
        let engine = Tesseract::new(self.config.recognizer.model_threads);
        if engine.is_available() {
            self.with_model(Box::new(engine))
        } else {
            warn!("tesseract not found, recognizing with templates only");
            self
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dictionary(&self) -> &DictionaryIndex {
        &self.dictionary
    }

    /// Run the whole pipeline on encoded image bytes.
    ///
    /// # Errors
    /// * The bytes are not a supported image
    /// * The board can not be located or its grid size can not be inferred
    pub fn process(&self, bytes: &[u8]) -> Result<ProcessResult, Error> {
        let start = Instant::now();
        let mut decode = 0.0;
        let gray = timed(&mut decode, || image::load_from_memory(bytes))?.to_luma8();
        let mut result = self.process_image(&gray)?;
        result.stage_timings.decode = decode;
        result.stage_timings.total = start.elapsed().as_secs_f64() * 1000.0;
        Ok(result)
    }

    pub fn process_file<P: AsRef<Path>>(&self, path: P) -> Result<ProcessResult, Error> {
        let start = Instant::now();
        let mut decode = 0.0;
        let gray = timed(&mut decode, || image::open(path))?.to_luma8();
        let mut result = self.process_image(&gray)?;
        result.stage_timings.decode = decode;
        result.stage_timings.total = start.elapsed().as_secs_f64() * 1000.0;
        Ok(result)
    }

    /// Run the pipeline on an already decoded grayscale photo.
    pub fn process_image(&self, gray: &GrayImage) -> Result<ProcessResult, Error> {
        let start = Instant::now();
        let mut timings = StageTimings::default();
        let segmentation = self.segment_timed(gray, &mut timings)?;
        let Segmentation {
            board: rectified,
            dimension,
            cells,
        } = segmentation;
        let n = dimension.n();

        let board: Board = timed(&mut timings.recognize, || {
            self.recognizer.recognize(&rectified.image, &cells, n)
        });
        let letters = board.letters();
        let solution = timed(&mut timings.solve, || {
            Solver::new(&self.dictionary, self.config.solver.clone()).solve(&letters)
        });
        timings.total = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            "{0}x{0} board, {1} words in {2:.0} ms",
            n, solution.total_found, timings.total
        );

        Ok(ProcessResult {
            grid_size: n,
            words: solution.words.iter().map(|w| w.word.clone()).collect(),
            paths: solution.words,
            word_count: solution.total_found,
            cell_confidences: board.confidences(),
            board: letters,
            cells: board.cells,
            stage_timings: timings,
            detection: rectified.detection,
        })
    }

    /// Locate, size and cut the board without recognizing it.
    pub fn segment(&self, gray: &GrayImage) -> Result<Segmentation, Error> {
        self.segment_timed(gray, &mut StageTimings::default())
    }

    fn segment_timed(
        &self,
        gray: &GrayImage,
        timings: &mut StageTimings,
    ) -> Result<Segmentation, Error> {
        let board = timed(&mut timings.board_detect, || self.localizer.locate(gray))?;
        let dimension = timed(&mut timings.grid_infer, || {
            self.sizer.infer_size(&board.image)
        })?;
        let cells = timed(&mut timings.cell_split, || {
            self.segmenter.segment(&board.image, dimension.n())
        });
        Ok(Segmentation {
            board,
            dimension,
            cells,
        })
    }
}
