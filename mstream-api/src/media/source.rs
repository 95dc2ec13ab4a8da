//! Video metadata and stream access

use super::{MediaError, MediaResult};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::debug;

/// Stream of downloaded byte chunks
pub type ByteStream = BoxStream<'static, MediaResult<Vec<u8>>>;

/// Video metadata returned by `POST /video`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Length in seconds
    pub duration: f64,
    pub formats: Vec<VideoFormat>,
}

/// One downloadable encoding of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFormat {
    pub id: String,
    /// e.g. `audio/mp4; codecs="mp4a.40.2"`
    pub mime_type: String,
    pub url: String,
    /// Bits per second, 0 when unknown
    pub bitrate: u64,
}

/// Capability to look up videos and download their streams
#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn video_info(&self, video_id: &str) -> MediaResult<VideoInfo>;

    async fn open_stream(&self, video: &VideoInfo, format: &VideoFormat) -> MediaResult<ByteStream>;
}

/// Pick the format to download: the first `audio/mp4` one, else the first
pub fn select_audio_format(formats: &[VideoFormat]) -> MediaResult<&VideoFormat> {
    formats
        .iter()
        .find(|f| f.mime_type.contains("audio/mp4"))
        .or_else(|| formats.first())
        .ok_or(MediaError::NoFormats)
}

// ========================================
// yt-dlp backed source
// ========================================

/// Subset of `yt-dlp --dump-single-json` output
#[derive(Debug, Deserialize)]
struct YtDlpVideo {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    formats: Vec<YtDlpFormat>,
}

#[derive(Debug, Deserialize)]
struct YtDlpFormat {
    format_id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    vcodec: Option<String>,
    /// Total bitrate in kbit/s
    #[serde(default)]
    tbr: Option<f64>,
}

impl YtDlpFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        matches!(codec.as_deref(), Some(c) if c != "none")
    }

    fn mime_type(&self) -> String {
        let audio_only = Self::has_codec(&self.acodec) && !Self::has_codec(&self.vcodec);
        let kind = if audio_only { "audio" } else { "video" };
        let container = match self.ext.as_deref() {
            Some("m4a") | None => "mp4",
            Some(ext) => ext,
        };

        let codecs: Vec<&str> = [&self.vcodec, &self.acodec]
            .into_iter()
            .filter(|c| Self::has_codec(c))
            .filter_map(|c| c.as_deref())
            .collect();

        if codecs.is_empty() {
            format!("{}/{}", kind, container)
        } else {
            format!("{}/{}; codecs=\"{}\"", kind, container, codecs.join(", "))
        }
    }

    fn into_format(self) -> Option<VideoFormat> {
        let mime_type = self.mime_type();
        let url = self.url?;
        Some(VideoFormat {
            id: self.format_id,
            mime_type,
            url,
            bitrate: self.tbr.map(|kbps| (kbps * 1000.0) as u64).unwrap_or(0),
        })
    }
}

impl From<YtDlpVideo> for VideoInfo {
    fn from(video: YtDlpVideo) -> Self {
        Self {
            id: video.id,
            title: video.title,
            author: video.uploader.or(video.channel).unwrap_or_default(),
            duration: video.duration.unwrap_or(0.0),
            formats: video
                .formats
                .into_iter()
                .filter_map(YtDlpFormat::into_format)
                .collect(),
        }
    }
}

/// Looks up videos with the `yt-dlp` binary and downloads over HTTP
#[derive(Debug, Clone)]
pub struct YtDlpSource {
    binary: PathBuf,
    http_client: Client,
}

impl YtDlpSource {
    pub fn new(binary: impl Into<PathBuf>, http_client: Client) -> Self {
        Self {
            binary: binary.into(),
            http_client,
        }
    }
}

#[async_trait]
impl VideoSource for YtDlpSource {
    async fn video_info(&self, video_id: &str) -> MediaResult<VideoInfo> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        debug!(video_id, binary = %self.binary.display(), "Looking up video metadata");

        let output = Command::new(&self.binary)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings"])
            .arg(&url)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::Source(format!(
                    "yt-dlp binary not found: {}",
                    self.binary.display()
                )),
                _ => MediaError::Source(format!("failed to run yt-dlp: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Source(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let video: YtDlpVideo = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::Source(format!("failed to parse yt-dlp output: {}", e)))?;

        Ok(video.into())
    }

    async fn open_stream(&self, video: &VideoInfo, format: &VideoFormat) -> MediaResult<ByteStream> {
        debug!(
            video_id = %video.id,
            format_id = %format.id,
            mime_type = %format.mime_type,
            "Opening video stream"
        );

        let response = self
            .http_client
            .get(&format.url)
            .send()
            .await?
            .error_for_status()?;

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(MediaError::from)
            .boxed())
    }
}
