use crate::localizer::Strategy;
use crate::sizer::Polarity;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No cascade level could produce a rectified board
    #[error("Board detection failed on {width}x{height} image (minimum side {min_side}, tried {attempted:?})")]
    DetectionFailed {
        width: u32,
        height: u32,
        min_side: u32,
        attempted: Vec<Strategy>,
    },
    /// The cell count matched none of the supported grid sizes
    #[error("Grid dimension indeterminate, measured cell counts {counts:?}")]
    DimensionIndeterminate { counts: Vec<(Polarity, usize)> },
    #[error("Invalid letter grid: {0}")]
    InvalidGrid(String),
    /// Error reading wordfile
    #[error("Word list {} could not be read", .path.display())]
    DictionaryRead { path: PathBuf, source: io::Error },
    /// Error decoding a reference letter image
    #[error("Template {} could not be decoded", .path.display())]
    TemplateRead {
        path: PathBuf,
        source: image::error::ImageError,
    },
    /// Error decoding the input image
    #[error("Image could not be decoded")]
    Image(#[from] image::error::ImageError),
    #[error("OCR model failed: {0}")]
    Model(String),
    #[error("Invalid configuration")]
    Config(#[from] toml::de::Error),
}
