use super::{
    extract_video_id, select_audio_format, AudioConverter, MediaResult, VideoFormat, VideoInfo,
    VideoSource,
};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Link to MP3 bytes: lookup, download, convert
///
/// Every call works on its own uniquely named pair of temp files, so
/// concurrent requests never share state on disk. The files are removed
/// when the call finishes or when its future is dropped mid-way.
#[derive(Clone)]
pub struct MediaPipeline {
    source: Arc<dyn VideoSource>,
    converter: Arc<dyn AudioConverter>,
    temp_dir: PathBuf,
}

impl MediaPipeline {
    pub fn new(
        source: Arc<dyn VideoSource>,
        converter: Arc<dyn AudioConverter>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            converter,
            temp_dir: temp_dir.into(),
        }
    }

    /// Metadata for the video a link points at
    pub async fn video_info(&self, link: &str) -> MediaResult<VideoInfo> {
        let video_id = extract_video_id(link)?;
        self.source.video_info(video_id).await
    }

    /// Download the linked video's audio and convert it to MP3
    pub async fn fetch_audio(&self, link: &str) -> MediaResult<Vec<u8>> {
        let video = self.video_info(link).await?;
        let format = select_audio_format(&video.formats)?;

        let video_path = self.temp_file(".mp4")?;
        let audio_path = self.temp_file(".mp3")?;

        let result = self
            .download_and_convert(&video, format, &video_path, &audio_path)
            .await;

        remove_temp_file(video_path);
        remove_temp_file(audio_path);

        if let Ok(bytes) = &result {
            info!(
                video_id = %video.id,
                format_id = %format.id,
                bytes = bytes.len(),
                "Fetched and converted audio"
            );
        }
        result
    }

    fn temp_file(&self, suffix: &str) -> MediaResult<TempPath> {
        let file = tempfile::Builder::new()
            .prefix("mstream-")
            .suffix(suffix)
            .tempfile_in(&self.temp_dir)?;
        Ok(file.into_temp_path())
    }

    async fn download_and_convert(
        &self,
        video: &VideoInfo,
        format: &VideoFormat,
        video_path: &Path,
        audio_path: &Path,
    ) -> MediaResult<Vec<u8>> {
        let mut stream = self.source.open_stream(video, format).await?;
        let mut file = tokio::fs::File::create(video_path).await?;

        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len();
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        debug!(
            path = %video_path.display(),
            bytes = written,
            "Video stream written to temp file"
        );

        self.converter.convert(video_path, audio_path).await?;
        Ok(tokio::fs::read(audio_path).await?)
    }
}

/// Best-effort removal; a file that is already gone is fine
fn remove_temp_file(path: TempPath) {
    let path_display = path.display().to_string();
    match path.close() {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path_display, error = %e, "Failed to delete temp file"),
    }
}
