//! Remote video fetch and audio conversion
//!
//! Backs the deprecated ingest endpoints. A link is reduced to a video id,
//! the video's metadata is looked up through a [`VideoSource`], the best
//! audio format is downloaded to a temp file and an [`AudioConverter`]
//! turns it into MP3 bytes.

mod convert;
mod link;
mod pipeline;
mod source;

pub use convert::{AudioConverter, FfmpegConverter};
pub use link::extract_video_id;
pub use pipeline::MediaPipeline;
pub use source::{select_audio_format, ByteStream, VideoFormat, VideoInfo, VideoSource, YtDlpSource};

use std::path::PathBuf;
use thiserror::Error;

/// Media pipeline errors
#[derive(Debug, Error)]
pub enum MediaError {
    /// Link has no usable `v=` parameter
    #[error("invalid video link: {0}")]
    InvalidLink(String),

    #[error("video has no downloadable formats")]
    NoFormats,

    /// Metadata lookup or stream download failed
    #[error("video source error: {0}")]
    Source(String),

    #[error("converter binary not found: {}", .0.display())]
    ConverterNotFound(PathBuf),

    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;
