//! Video link normalization.
//!
//! Lessons store whatever link an administrator pasted. Before playback the link is rewritten into
//! an iframe-embeddable URL with the provider's chrome (titles, share buttons, related videos)
//! switched off. Links from unknown providers pass through unchanged.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

const YOUTUBE_PARAMS: &str = "modestbranding=1&rel=0&showinfo=0&fs=0&disablekb=1";
const VIMEO_PARAMS: &str = "title=0&byline=0&portrait=0&badge=0&autopause=0&player_id=0&app_id=58479";
const LOOM_PARAMS: &str = "hide_owner=true&hide_share=true&hide_title=true&hideEmbedTopBar=true";

/// Hosting service a video link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoProvider {
    Youtube,
    Vimeo,
    Loom,
    GoogleDrive,
    OneDrive,
    Other,
}

impl VideoProvider {
    pub fn detect(url: &str) -> Self {
        if url.contains("youtube.com") || url.contains("youtu.be") {
            VideoProvider::Youtube
        } else if url.contains("vimeo.com") {
            VideoProvider::Vimeo
        } else if url.contains("loom.com") {
            VideoProvider::Loom
        } else if url.contains("drive.google.com") {
            VideoProvider::GoogleDrive
        } else if url.contains("onedrive.live.com") || url.contains("1drv.ms") {
            VideoProvider::OneDrive
        } else {
            VideoProvider::Other
        }
    }
}

/// The non-empty run of `accept` characters right after the first `marker`
fn id_after<'a>(url: &'a str, marker: &str, accept: fn(char) -> bool) -> Option<&'a str> {
    let start = url.find(marker)? + marker.len();
    let rest = &url[start..];
    let end = rest.find(|c: char| !accept(c)).unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

fn is_drive_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn with_params(url: &str, params: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{params}")
}

fn youtube(url: &str) -> Option<String> {
    if url.contains("youtube.com/embed/") {
        return Some(with_params(url, YOUTUBE_PARAMS));
    }

    let video_id = if url.contains("youtube.com/watch?v=") {
        url.split_once("watch?v=").and_then(|(_, rest)| rest.split('&').next())
    } else if url.contains("youtu.be/") {
        url.split_once("youtu.be/").and_then(|(_, rest)| rest.split('?').next())
    } else {
        None
    };

    video_id
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://www.youtube.com/embed/{id}?{YOUTUBE_PARAMS}"))
}

fn vimeo(url: &str) -> Option<String> {
    if url.contains("player.vimeo.com/video/") {
        return Some(with_params(url, VIMEO_PARAMS));
    }
    id_after(url, "vimeo.com/", |c| c.is_ascii_digit())
        .map(|id| format!("https://player.vimeo.com/video/{id}?{VIMEO_PARAMS}"))
}

fn loom(url: &str) -> Option<String> {
    if url.contains("loom.com/embed/") {
        return Some(with_params(url, LOOM_PARAMS));
    }
    id_after(url, "loom.com/share/", |c| c.is_ascii_alphanumeric())
        .map(|id| format!("https://www.loom.com/embed/{id}?{LOOM_PARAMS}"))
}

fn google_drive(url: &str) -> Option<String> {
    if url.contains("/preview") || url.contains("/embed") {
        return Some(url.to_string());
    }
    id_after(url, "/file/d/", is_drive_id_char)
        .or_else(|| id_after(url, "?id=", is_drive_id_char))
        .or_else(|| id_after(url, "&id=", is_drive_id_char))
        .map(|id| format!("https://drive.google.com/file/d/{id}/preview"))
}

fn one_drive(url: &str) -> String {
    if url.contains("embed") {
        url.to_string()
    } else {
        with_params(url, "embed")
    }
}

/// Rewrite a video link into an embeddable iframe source.
///
/// Links that name a known provider but cannot be parsed fall through to the remaining providers
/// and finally come back unchanged.
pub fn embed_url(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let url = input;
    let is_youtube = url.contains("youtube.com") || url.contains("youtu.be");
    let is_one_drive = url.contains("onedrive.live.com") || url.contains("1drv.ms");

    let rewritten = is_youtube
        .then(|| youtube(url))
        .flatten()
        .or_else(|| url.contains("vimeo.com").then(|| vimeo(url)).flatten())
        .or_else(|| url.contains("loom.com").then(|| loom(url)).flatten())
        .or_else(|| url.contains("drive.google.com").then(|| google_drive(url)).flatten())
        .or_else(|| is_one_drive.then(|| one_drive(url)));

    rewritten.unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(embed_url(""), "");
    }

    #[test]
    fn test_youtube_watch_and_share_agree() {
        let watch = embed_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s");
        let share = embed_url("https://youtu.be/dQw4w9WgXcQ?si=abc");
        assert_eq!(watch, share);
        assert_eq!(
            watch,
            "https://www.youtube.com/embed/dQw4w9WgXcQ?modestbranding=1&rel=0&showinfo=0&fs=0&disablekb=1"
        );
    }

    #[test]
    fn test_youtube_embed_gets_params() {
        assert_eq!(
            embed_url("https://www.youtube.com/embed/abc"),
            "https://www.youtube.com/embed/abc?modestbranding=1&rel=0&showinfo=0&fs=0&disablekb=1"
        );
        assert_eq!(
            embed_url("https://www.youtube.com/embed/abc?start=10"),
            "https://www.youtube.com/embed/abc?start=10&modestbranding=1&rel=0&showinfo=0&fs=0&disablekb=1"
        );
    }

    #[test]
    fn test_unparseable_youtube_passes_through() {
        let url = "https://www.youtube.com/shorts/abc";
        assert_eq!(embed_url(url), url);
    }

    #[test]
    fn test_vimeo() {
        assert_eq!(
            embed_url("https://vimeo.com/123456789?share=copy"),
            "https://player.vimeo.com/video/123456789?title=0&byline=0&portrait=0&badge=0&autopause=0&player_id=0&app_id=58479"
        );
        assert_eq!(
            embed_url("https://player.vimeo.com/video/42?h=ff"),
            "https://player.vimeo.com/video/42?h=ff&title=0&byline=0&portrait=0&badge=0&autopause=0&player_id=0&app_id=58479"
        );
    }

    #[test]
    fn test_loom() {
        assert_eq!(
            embed_url("https://www.loom.com/share/a1b2c3"),
            "https://www.loom.com/embed/a1b2c3?hide_owner=true&hide_share=true&hide_title=true&hideEmbedTopBar=true"
        );
        assert_eq!(
            embed_url("https://www.loom.com/embed/a1b2c3"),
            "https://www.loom.com/embed/a1b2c3?hide_owner=true&hide_share=true&hide_title=true&hideEmbedTopBar=true"
        );
    }

    #[test]
    fn test_google_drive() {
        assert_eq!(
            embed_url("https://drive.google.com/file/d/1AbC_d-E/view?usp=sharing"),
            "https://drive.google.com/file/d/1AbC_d-E/preview"
        );
        assert_eq!(
            embed_url("https://drive.google.com/open?id=XYZ_1"),
            "https://drive.google.com/file/d/XYZ_1/preview"
        );
        let preview = "https://drive.google.com/file/d/abc/preview";
        assert_eq!(embed_url(preview), preview);
    }

    #[test]
    fn test_one_drive() {
        assert_eq!(embed_url("https://1drv.ms/v/s!abc"), "https://1drv.ms/v/s!abc?embed");
        assert_eq!(
            embed_url("https://onedrive.live.com/redir?resid=1"),
            "https://onedrive.live.com/redir?resid=1&embed"
        );
        let embedded = "https://onedrive.live.com/embed?resid=1";
        assert_eq!(embed_url(embedded), embedded);
    }

    #[test]
    fn test_unknown_provider_unchanged() {
        let url = "https://cdn.example.com/video.mp4";
        assert_eq!(embed_url(url), url);
        assert_eq!(VideoProvider::detect(url), VideoProvider::Other);
    }

    #[test]
    fn test_detect() {
        assert_eq!(VideoProvider::detect("https://youtu.be/x"), VideoProvider::Youtube);
        assert_eq!(VideoProvider::detect("https://vimeo.com/1"), VideoProvider::Vimeo);
        assert_eq!(VideoProvider::detect("https://1drv.ms/x"), VideoProvider::OneDrive);
    }
}
