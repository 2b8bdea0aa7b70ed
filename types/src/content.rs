//! Content categories: mapping a MIME type to how the content is displayed.

use serde::{Deserialize, Serialize};

/// Coarse category of fetched content, derived from its Content-Type.
///
/// Unknown or missing types fall into [`ContentCategory::Download`], which
/// renders as explicit open/download actions only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Html,
    Text,
    Image,
    Video,
    Audio,
    Pdf,
    Download,
}

impl ContentCategory {
    /// Map a raw Content-Type header value to a category.
    ///
    /// Parameters (`; charset=...`) are stripped and matching is
    /// case-insensitive.
    pub fn from_mime(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Self::Html,
            "application/pdf" => Self::Pdf,
            _ if mime.starts_with("image/") => Self::Image,
            _ if mime.starts_with("video/") => Self::Video,
            _ if mime.starts_with("audio/") => Self::Audio,
            _ if mime.starts_with("text/") || mime == "application/json" => Self::Text,
            _ => Self::Download,
        }
    }

    /// Extension used when synthesizing a download filename.
    pub fn preferred_extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "txt",
            Self::Image => "png",
            Self::Video => "mp4",
            Self::Audio => "mp3",
            Self::Pdf => "pdf",
            Self::Download => "bin",
        }
    }
}

/// Synthesize a download filename from an identifier.
///
/// The category's extension is appended only when the identifier does not
/// already carry one.
pub fn download_filename(identifier: &str, category: ContentCategory) -> String {
    let has_extension = identifier
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty() && ext.len() <= 4);

    if has_extension {
        identifier.to_string()
    } else {
        format!("{identifier}.{}", category.preferred_extension())
    }
}
