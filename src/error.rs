use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SealError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF format error (lopdf): {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("Image render error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Resource not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Overlay document has no pages: {}", .0.display())]
    EmptyOverlay(PathBuf),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SealError>;
