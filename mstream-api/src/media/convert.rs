use super::{MediaError, MediaResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Capability to transcode a downloaded video file into an audio file
#[async_trait]
pub trait AudioConverter: Send + Sync {
    async fn convert(&self, input: &Path, output: &Path) -> MediaResult<()>;
}

/// Converts with the `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary: PathBuf,
}

impl FfmpegConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(&self, input: &Path, output: &Path) -> MediaResult<()> {
        debug!(
            input = %input.display(),
            output = %output.display(),
            "Running ffmpeg"
        );

        let status = Command::new(&self.binary)
            .args(["-y", "-loglevel", "quiet", "-i"])
            .arg(input)
            .arg(output)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::ConverterNotFound(self.binary.clone()),
                _ => MediaError::ConversionFailed(format!("failed to run ffmpeg: {}", e)),
            })?;

        if !status.success() {
            return Err(MediaError::ConversionFailed(format!(
                "ffmpeg exited with {}",
                status
            )));
        }

        Ok(())
    }
}
