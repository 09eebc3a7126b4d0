//! The learned OCR source.
//!
//! Any engine can be plugged in through [`OcrModel`]. [`Tesseract`] drives the `tesseract`
//! command line program and parses its TSV output.
use crate::Error;
use image::math::Rect;
use image::{GrayImage, ImageFormat};
use log::debug;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// How the engine should segment the image it is given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Find as many scattered letters as possible, used on a whole board
    Sparse,
    /// The image is a single character, used on one cell
    SingleChar,
}

/// A piece of text found by the engine, with its bounding box in image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub text: String,
    /// 0..1
    pub confidence: f32,
    pub bbox: Rect,
}

impl TextRegion {
    pub fn center(&self) -> (f32, f32) {
        (
            self.bbox.x as f32 + self.bbox.width as f32 / 2.0,
            self.bbox.y as f32 + self.bbox.height as f32 / 2.0,
        )
    }
}

/// A general purpose OCR engine.
///
/// Callers serialize access, so implementations may keep mutable state.
pub trait OcrModel: Send {
    fn read(&mut self, image: &GrayImage, mode: ReadMode) -> Result<Vec<TextRegion>, Error>;
}

/// Runs the `tesseract` executable on a temporary PNG file.
#[derive(Debug, Clone)]
pub struct Tesseract {
    program: PathBuf,
    language: String,
    threads: usize,
}

impl Tesseract {
    /// Engine using the `tesseract` found on `PATH` with English data, limited to `threads` OpenMP
    /// threads.
    pub fn new(threads: usize) -> Self {
        Tesseract {
            program: PathBuf::from("tesseract"),
            language: String::from("eng"),
            threads: threads.max(1),
        }
    }

    pub fn with_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = language.into();
        self
    }

    /// True if the executable can be started
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map_or(false, |output| output.status.success())
    }

    fn run_tsv(&self, path: &std::path::Path, mode: ReadMode) -> Result<String, Error> {
        let psm = match mode {
            ReadMode::Sparse => "11",
            ReadMode::SingleChar => "10",
        };
        let output = Command::new(&self.program)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg("1")
            .arg("--psm")
            .arg(psm)
            .arg("-c")
            .arg("tessedit_char_whitelist=ABCDEFGHIJKLMNOPQRSTUVWXYZ")
            .arg("tsv")
            .env("OMP_THREAD_LIMIT", self.threads.to_string())
            .output()
            .map_err(|e| Error::Model(format!("failed to run {}: {}", self.program.display(), e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Model(format!("tesseract failed: {}", stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl OcrModel for Tesseract {
    fn read(&mut self, image: &GrayImage, mode: ReadMode) -> Result<Vec<TextRegion>, Error> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| Error::Model(format!("failed to create temp file: {}", e)))?;
        image.write_to(&mut tmp, ImageFormat::Png)?;
        tmp.flush()
            .map_err(|e| Error::Model(format!("failed to write temp image: {}", e)))?;
        let tsv = self.run_tsv(tmp.path(), mode)?;
        let regions = parse_tsv(&tsv);
        debug!("tesseract: {} regions", regions.len());
        Ok(regions)
    }
}

/// Word level rows of tesseract TSV output. Rows without text or with a negative confidence are
/// skipped.
pub fn parse_tsv(tsv: &str) -> Vec<TextRegion> {
    let mut regions = Vec::new();
    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != 5 {
            continue;
        }
        let left: u32 = cols[6].parse().unwrap_or(0);
        let top: u32 = cols[7].parse().unwrap_or(0);
        let width: u32 = cols[8].parse().unwrap_or(0);
        let height: u32 = cols[9].parse().unwrap_or(0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        regions.push(TextRegion {
            text: text.to_string(),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
            bbox: Rect {
                x: left,
                y: top,
                width,
                height,
            },
        });
    }
    regions
}
