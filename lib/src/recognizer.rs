use crate::config::{ModelScope, RecognizerConfig};
use crate::merge::{apply_corrections, clean_text, merge, Reading, RecognizedLetter};
use crate::segmenter::Cell;
use crate::templates::TemplateLibrary;
use crate::tesseract::{OcrModel, ReadMode, TextRegion};
use crate::utils::{binarize, invert, mean};
use crate::Error;
use image::GrayImage;
use imageproc::contrast::otsu_level;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

/// Largest grid the solver's visited bitmask can hold
pub const MAX_CELLS: usize = 64;

/// Letter units organized as a square grid, row-major.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Letters(Vec<Vec<String>>);

impl Letters {
    /// # Errors
    /// [`Error::InvalidGrid`] if the rows are not all as long as there are rows, or the grid has
    /// more than 64 cells.
    pub fn new(rows: Vec<Vec<String>>) -> Result<Letters, Error> {
        let n = rows.len();
        if let Some(row) = rows.iter().position(|row| row.len() != n) {
            return Err(Error::InvalidGrid(format!(
                "row {} has {} cells, expected {}",
                row,
                rows[row].len(),
                n
            )));
        }
        if n * n > MAX_CELLS {
            return Err(Error::InvalidGrid(format!(
                "{0}x{0} exceeds {1} cells",
                n, MAX_CELLS
            )));
        }
        Ok(Letters(rows))
    }

    /// Convenience constructor, units are uppercased as given.
    ///
    /// ```
    /// # use boggle_ocr::Letters;
    /// let letters = Letters::from_strs(&[&["c", "a"], &["t", "s"]])?;
    /// assert_eq!(letters.to_string(), "CA\nTS");
    /// # Ok::<(), boggle_ocr::Error>(())
    /// ```
    pub fn from_strs(rows: &[&[&str]]) -> Result<Letters, Error> {
        Letters::new(
            rows.iter()
                .map(|row| row.iter().map(|s| s.to_ascii_uppercase()).collect())
                .collect(),
        )
    }

    /// Cells per side
    pub fn n(&self) -> usize {
        self.0.len()
    }
}

impl Deref for Letters {
    type Target = Vec<Vec<String>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Letters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let grid = self
            .iter()
            .map(|row| row.join(""))
            .collect::<Vec<String>>()
            .join("\n");
        write!(f, "{}", grid)
    }
}

/// Both source readings of one cell next to the merged letter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellReading {
    pub row: usize,
    pub col: usize,
    pub template: Option<Reading>,
    pub model: Option<Reading>,
    pub letter: RecognizedLetter,
}

impl CellReading {
    /// Both sources read something, and not the same letter
    pub fn is_disagreement(&self) -> bool {
        match (&self.template, &self.model) {
            (Some(t), Some(m)) => apply_corrections(&t.letter) != apply_corrections(&m.letter),
            _ => false,
        }
    }
}

/// The recognized N x N board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub n: usize,
    /// Row-major
    pub cells: Vec<CellReading>,
}

impl Board {
    pub fn get(&self, row: usize, col: usize) -> Option<&CellReading> {
        if row < self.n && col < self.n {
            self.cells.get(row * self.n + col)
        } else {
            None
        }
    }

    pub fn letters(&self) -> Letters {
        Letters(self.grid(|cell| cell.letter.unit.clone()))
    }

    pub fn confidences(&self) -> Vec<Vec<f32>> {
        self.grid(|cell| cell.letter.confidence)
    }

    /// Cells where the template and model sources read different letters
    pub fn disagreements(&self) -> Vec<&CellReading> {
        self.cells.iter().filter(|c| c.is_disagreement()).collect()
    }

    fn grid<T, F: Fn(&CellReading) -> T>(&self, f: F) -> Vec<Vec<T>> {
        if self.n == 0 {
            return Vec::new();
        }
        self.cells
            .chunks(self.n)
            .map(|row| row.iter().map(&f).collect())
            .collect()
    }
}

/// Hybrid letter recognizer: template matching plus an optional OCR model.
pub struct Recognizer {
    config: RecognizerConfig,
    templates: TemplateLibrary,
    model: Option<Mutex<Box<dyn OcrModel>>>,
}

impl Recognizer {
    pub fn new(config: RecognizerConfig, templates: TemplateLibrary) -> Recognizer {
        Recognizer {
            config,
            templates,
            model: None,
        }
    }

    pub fn with_model(mut self, model: Box<dyn OcrModel>) -> Recognizer {
        self.model = Some(Mutex::new(model));
        self
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Recognize every cell of an `n x n` board.
    ///
    /// `board` is the rectified image the cells were cut from; the model reads it in board
    /// scope. Never fails: a model error is logged and the template source carries on alone.
    pub fn recognize(&self, board: &GrayImage, cells: &[Cell], n: usize) -> Board {
        let model_readings = self.model_readings(board, cells, n);
        let cells = cells
            .iter()
            .zip(model_readings)
            .map(|(cell, model)| {
                let template = if cell.blank {
                    None
                } else {
                    self.templates.best_match(&cell.image, self.config.hole_margin)
                };
                let mut letter = merge(
                    template.as_ref(),
                    model.as_ref(),
                    self.config.confidence_threshold,
                );
                if !cell.blank && (letter.unit == "R" || letter.unit == "P") {
                    if let Some(unit) = self.templates.check_r_or_p(&cell.image) {
                        letter.unit = unit.to_string();
                    }
                }
                debug!(
                    "cell ({}, {}): {} {:.2} {:?}",
                    cell.row, cell.col, letter.unit, letter.confidence, letter.source
                );
                CellReading {
                    row: cell.row,
                    col: cell.col,
                    template,
                    model,
                    letter,
                }
            })
            .collect();
        let board = Board { n, cells };
        info!(
            "recognized board, {} disagreements",
            board.disagreements().len()
        );
        board
    }

    /// One optional model reading per cell, in cell order
    fn model_readings(&self, board: &GrayImage, cells: &[Cell], n: usize) -> Vec<Option<Reading>> {
        let none = || vec![None; cells.len()];
        let model = match &self.model {
            Some(model) => model,
            None => return none(),
        };
        // exclusive for the whole board
        let mut model = model.lock();
        let readings = match self.config.model_scope {
            ModelScope::Board => model
                .read(&dark_on_light(board), ReadMode::Sparse)
                .map(|regions| assign_regions(&regions, board.width(), board.height(), n, cells)),
            ModelScope::Cell => cells
                .iter()
                .map(|cell| {
                    if cell.blank {
                        return Ok(None);
                    }
                    let regions = model.read(&cell.image, ReadMode::SingleChar)?;
                    Ok(best_region(regions.iter().filter_map(|r| {
                        clean_text(&r.text).map(|text| Reading::new(text, r.confidence))
                    })))
                })
                .collect::<Result<Vec<_>, Error>>(),
        };
        match readings {
            Ok(readings) => readings,
            Err(e) => {
                warn!("{}, using templates only", e);
                none()
            }
        }
    }
}

/// The board with dark letters on a light face, inverted when its Otsu-binarized mean is dark.
fn dark_on_light(board: &GrayImage) -> Cow<'_, GrayImage> {
    let (lo, hi) = board
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if lo >= hi {
        return Cow::Borrowed(board);
    }
    if mean(&binarize(board, otsu_level(board))) < 128. {
        debug!("inverting light-on-dark board for the model");
        Cow::Owned(invert(board))
    } else {
        Cow::Borrowed(board)
    }
}

fn best_region<I: Iterator<Item = Reading>>(readings: I) -> Option<Reading> {
    readings.fold(None, |best: Option<Reading>, r| match best {
        Some(b) if b.confidence >= r.confidence => Some(b),
        _ => Some(r),
    })
}

/// Place board-scope detections in the cell containing their center, keeping the most confident
/// one per cell.
fn assign_regions(
    regions: &[TextRegion],
    width: u32,
    height: u32,
    n: usize,
    cells: &[Cell],
) -> Vec<Option<Reading>> {
    let mut readings: Vec<Option<Reading>> = vec![None; cells.len()];
    if n == 0 || width == 0 || height == 0 {
        return readings;
    }
    for region in regions {
        let text = match clean_text(&region.text) {
            Some(text) => text,
            None => continue,
        };
        let (cx, cy) = region.center();
        let col = (cx * n as f32 / width as f32) as usize;
        let row = (cy * n as f32 / height as f32) as usize;
        if row >= n || col >= n {
            continue;
        }
        let index = match cells.iter().position(|c| c.row == row && c.col == col) {
            Some(index) => index,
            None => continue,
        };
        let slot = &mut readings[index];
        if slot.as_ref().map_or(true, |r| region.confidence > r.confidence) {
            *slot = Some(Reading::new(text, region.confidence));
        }
    }
    readings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::render;
    use crate::merge::Source;
    use image::math::Rect;
    use image::Luma;
    use std::sync::Arc;

    /// Returns canned regions, or fails every call
    struct FakeModel {
        regions: Vec<TextRegion>,
        fail: bool,
    }

    impl OcrModel for FakeModel {
        fn read(&mut self, _: &GrayImage, _: ReadMode) -> Result<Vec<TextRegion>, Error> {
            if self.fail {
                Err(Error::Model(String::from("engine crashed")))
            } else {
                Ok(self.regions.clone())
            }
        }
    }

    fn region(text: &str, confidence: f32, x: u32, y: u32) -> TextRegion {
        TextRegion {
            text: text.to_string(),
            confidence,
            bbox: Rect {
                x,
                y,
                width: 20,
                height: 30,
            },
        }
    }

    /// Records the mean brightness of every image it is asked to read
    struct RecordingModel {
        means: Arc<Mutex<Vec<f64>>>,
    }

    impl OcrModel for RecordingModel {
        fn read(&mut self, image: &GrayImage, _: ReadMode) -> Result<Vec<TextRegion>, Error> {
            self.means.lock().push(mean(image));
            Ok(Vec::new())
        }
    }

    fn cells(letters: &[char]) -> Vec<Cell> {
        letters
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let (image, blank) = match render(c, 64) {
                    Some(image) => (image, false),
                    None => (GrayImage::from_pixel(64, 64, Luma([255])), true),
                };
                Cell {
                    row: i / 2,
                    col: i % 2,
                    image,
                    blank,
                }
            })
            .collect()
    }

    fn recognizer() -> Recognizer {
        Recognizer::new(RecognizerConfig::default(), TemplateLibrary::builtin(48))
    }

    #[test]
    fn test_letters_validation() {
        assert!(Letters::from_strs(&[&["A", "B"], &["C"]]).is_err());
        assert!(Letters::from_strs(&[&["A", "B"]]).is_err());
        let nine = vec![vec![String::from("A"); 9]; 9];
        assert!(matches!(Letters::new(nine), Err(Error::InvalidGrid(_))));
        let empty = Letters::new(Vec::new()).unwrap();
        assert_eq!(empty.n(), 0);
        let grid = Letters::from_strs(&[&["qu", "e"], &["s", "t"]]).unwrap();
        assert_eq!(grid.to_string(), "QUE\nST");
        assert_eq!(grid[0][0], "QU");
    }

    #[test]
    fn test_templates_only() {
        let board_image = GrayImage::from_pixel(128, 128, Luma([255]));
        let board = recognizer().recognize(&board_image, &cells(&['C', 'A', 'T', 'Q']), 2);
        assert_eq!(board.letters().to_string(), "CA\nTQU");
        assert!(board.cells.iter().all(|c| c.letter.source == Source::Template));
        assert!(board.disagreements().is_empty());
        assert_eq!(board.confidences().len(), 2);
    }

    #[test]
    fn test_blank_cell_is_unknown() {
        let board_image = GrayImage::from_pixel(128, 128, Luma([255]));
        let board = recognizer().recognize(&board_image, &cells(&['C', ' ', 'T', 'S']), 2);
        let blank = board.get(0, 1).unwrap();
        assert_eq!(blank.letter, RecognizedLetter::unknown());
        assert_eq!(board.confidences()[0][1], 0.0);
    }

    #[test]
    fn test_board_scope_model_readings() {
        // a confident wrong reading in cell (0, 0) and a weaker second one in the same cell
        let model = FakeModel {
            regions: vec![
                region("O", 0.9, 10, 10),
                region("G", 0.5, 20, 15),
                region("?", 0.99, 70, 70),
                region("S", 0.6, 80, 70),
            ],
            fail: false,
        };
        let recognizer = recognizer().with_model(Box::new(model));
        let board_image = GrayImage::from_pixel(128, 128, Luma([255]));
        let board = recognizer.recognize(&board_image, &cells(&['C', 'A', 'T', 'S']), 2);
        let first = board.get(0, 0).unwrap();
        assert_eq!(first.model, Some(Reading::new("O", 0.9)));
        assert_eq!(first.letter.unit, "O");
        assert_eq!(first.letter.source, Source::Model);
        let last = board.get(1, 1).unwrap();
        assert_eq!(last.letter.source, Source::Agreement);
        assert_eq!(board.disagreements().len(), 1);
        assert_eq!(board.get(0, 1).unwrap().model, None);
    }

    #[test]
    fn test_cell_scope_model_readings() {
        let model = FakeModel {
            regions: vec![region("t", 0.8, 0, 0)],
            fail: false,
        };
        let mut config = RecognizerConfig::default();
        config.model_scope = ModelScope::Cell;
        let recognizer =
            Recognizer::new(config, TemplateLibrary::builtin(48)).with_model(Box::new(model));
        let board_image = GrayImage::from_pixel(128, 128, Luma([255]));
        let board = recognizer.recognize(&board_image, &cells(&['T', 'T', ' ', 'T']), 2);
        assert_eq!(board.letters().to_string(), "TT\n?T");
        assert_eq!(board.get(0, 0).unwrap().letter.source, Source::Agreement);
        assert_eq!(board.get(1, 0).unwrap().model, None);
    }

    #[test]
    fn test_failing_model_degrades_to_templates() {
        let model = FakeModel {
            regions: Vec::new(),
            fail: true,
        };
        let recognizer = recognizer().with_model(Box::new(model));
        assert!(recognizer.has_model());
        let board_image = GrayImage::from_pixel(128, 128, Luma([255]));
        let board = recognizer.recognize(&board_image, &cells(&['D', 'O', 'G', 'S']), 2);
        assert_eq!(board.letters().to_string(), "DO\nGS");
        assert!(board.cells.iter().all(|c| c.model.is_none()));
    }

    #[test]
    fn test_board_scope_model_sees_dark_letters_on_light() {
        let means = Arc::new(Mutex::new(Vec::new()));
        let recognizer = recognizer().with_model(Box::new(RecordingModel {
            means: means.clone(),
        }));
        let letters = cells(&['C', 'A', 'T', 'S']);

        // light letters on dark tiles
        let mut dark = GrayImage::from_pixel(128, 128, Luma([30]));
        for y in 40..60 {
            for x in 20..100 {
                dark.put_pixel(x, y, Luma([240]));
            }
        }
        recognizer.recognize(&dark, &letters, 2);
        // dark letters on a white board
        recognizer.recognize(&invert(&dark), &letters, 2);
        recognizer.recognize(&GrayImage::from_pixel(128, 128, Luma([255])), &letters, 2);

        let means = means.lock();
        assert_eq!(means.len(), 3);
        assert!(means.iter().all(|&m| m > 128.), "{:?}", means);
        assert!((means[0] - means[1]).abs() < 1e-9);
    }
}
