use super::{MediaError, MediaResult};

/// Pull the video id out of a watch link
///
/// Takes everything after the first `v=` up to the next `&`.
pub fn extract_video_id(link: &str) -> MediaResult<&str> {
    let (_, rest) = link
        .split_once("v=")
        .ok_or_else(|| MediaError::InvalidLink(link.to_string()))?;

    let id = rest.split('&').next().unwrap_or_default();
    if id.is_empty() {
        return Err(MediaError::InvalidLink(link.to_string()));
    }
    Ok(id)
}
