//! Mapping verified content onto a display surface.
//!
//! Pure function of the content category. HTML and text render in a
//! sandboxed frame with a deliberately permissive sandbox: the content has
//! already passed verification, and permaweb apps need scripts and
//! same-origin requests to function at all.

use arvex_types::content::download_filename;
use arvex_types::ContentCategory;

/// Sandbox grants for framed HTML/text content.
pub const FRAME_SANDBOX: &[&str] = &[
    "allow-scripts",
    "allow-forms",
    "allow-same-origin",
    "allow-popups",
];

/// The surface a category of content renders on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderSurface {
    /// Sandboxed frame for HTML and text.
    Frame { sandbox: &'static [&'static str] },
    /// Native media element. On a media error the UI falls back to
    /// [`RenderSurface::Actions`].
    Image,
    Video,
    Audio,
    /// Open/download actions only (PDF and unknown types).
    Actions,
}

impl RenderSurface {
    /// Whether this surface degrades to open/download actions on error.
    pub fn has_action_fallback(&self) -> bool {
        matches!(self, Self::Image | Self::Video | Self::Audio | Self::Actions)
    }
}

/// Choose a surface for a content category.
pub fn surface_for(category: ContentCategory) -> RenderSurface {
    match category {
        ContentCategory::Html | ContentCategory::Text => RenderSurface::Frame {
            sandbox: FRAME_SANDBOX,
        },
        ContentCategory::Image => RenderSurface::Image,
        ContentCategory::Video => RenderSurface::Video,
        ContentCategory::Audio => RenderSurface::Audio,
        ContentCategory::Pdf | ContentCategory::Download => RenderSurface::Actions,
    }
}

/// Filename offered by the download action.
pub fn download_name(identifier: &str, category: ContentCategory) -> String {
    download_filename(identifier, category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_and_text_share_the_frame() {
        for category in [ContentCategory::Html, ContentCategory::Text] {
            assert_eq!(
                surface_for(category),
                RenderSurface::Frame {
                    sandbox: FRAME_SANDBOX
                }
            );
        }
    }

    #[test]
    fn media_renders_natively() {
        assert_eq!(surface_for(ContentCategory::Image), RenderSurface::Image);
        assert_eq!(surface_for(ContentCategory::Video), RenderSurface::Video);
        assert_eq!(surface_for(ContentCategory::Audio), RenderSurface::Audio);
    }

    #[test]
    fn pdf_and_unknown_get_actions_only() {
        assert_eq!(surface_for(ContentCategory::Pdf), RenderSurface::Actions);
        assert_eq!(surface_for(ContentCategory::Download), RenderSurface::Actions);
    }

    #[test]
    fn media_surfaces_fall_back_to_actions() {
        assert!(surface_for(ContentCategory::Video).has_action_fallback());
        assert!(!surface_for(ContentCategory::Html).has_action_fallback());
    }

    #[test]
    fn download_name_carries_extension() {
        assert_eq!(download_name("ar-io", ContentCategory::Pdf), "ar-io.pdf");
    }
}
