//! # Preview Sufficiency
//!
//! Decides whether Discord already produced a working preview for a message.
//!
//! A preview counts when any embed or attachment URL is served from the
//! platform's media CDN. Generic video placeholder thumbnails never count, and
//! neither does `abs.twimg.com` (the static-asset host behind broken cards);
//! both are skipped and scanning carries on.

use url::Url;

use crate::models::{Attachment, Embed};

/// Hostname suffixes of first-party media servers
const MEDIA_HOST_SUFFIXES: [&str; 3] = ["pbs.twimg.com", "video.twimg.com", "ton.twimg.com"];

/// Path marker of the generic "video" thumbnail
const PLACEHOLDER_THUMBNAIL_MARKER: &str = "tweet_video_thumb";

/// Where on a message a preview URL was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewSource {
    EmbedUrl,
    EmbedImage,
    EmbedThumbnail,
    Attachment,
}

/// A single URL taken from an embed or attachment
#[derive(Debug, Clone, Copy)]
pub struct PreviewUrl<'a> {
    pub source: PreviewSource,
    pub url: &'a str,
}

impl Embed {
    /// Primary, image and thumbnail URLs, in that order, skipping empty ones
    pub fn preview_urls(&self) -> impl Iterator<Item = PreviewUrl<'_>> {
        [
            (PreviewSource::EmbedUrl, self.url.as_deref()),
            (
                PreviewSource::EmbedImage,
                self.image.as_ref().map(|media| media.url.as_str()),
            ),
            (
                PreviewSource::EmbedThumbnail,
                self.thumbnail.as_ref().map(|media| media.url.as_str()),
            ),
        ]
        .into_iter()
        .filter_map(|(source, url)| {
            url.filter(|url| !url.is_empty())
                .map(|url| PreviewUrl { source, url })
        })
    }
}

impl Attachment {
    pub fn preview_url(&self) -> PreviewUrl<'_> {
        PreviewUrl {
            source: PreviewSource::Attachment,
            url: &self.url,
        }
    }
}

/// Returns `true` when at least one embed or attachment is platform media,
/// meaning a rewritten link would be redundant.
///
/// Embeds are scanned before attachments and the scan stops at the first hit.
pub fn has_sufficient_preview(embeds: &[Embed], attachments: &[Attachment]) -> bool {
    embeds
        .iter()
        .flat_map(Embed::preview_urls)
        .chain(attachments.iter().map(Attachment::preview_url))
        .any(|preview| is_platform_media(&preview))
}

/// Tests one URL against the media host suffixes.
///
/// Unparseable URLs never match.
pub fn is_platform_media(preview: &PreviewUrl<'_>) -> bool {
    let Ok(parsed) = Url::parse(preview.url) else {
        return false;
    };

    if preview.source == PreviewSource::EmbedThumbnail
        && parsed.path().contains(PLACEHOLDER_THUMBNAIL_MARKER)
    {
        return false;
    }

    parsed.host_str().is_some_and(|host| {
        MEDIA_HOST_SUFFIXES
            .iter()
            .any(|suffix| host.ends_with(suffix))
    })
}
