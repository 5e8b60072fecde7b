use serde::Deserialize;

// ── GraphQL response wrappers ────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: T,
}

// ── Media image query ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MediaImagesResponse {
    #[serde(rename = "Media")]
    pub media: Option<MediaImages>,
}

#[derive(Debug, Deserialize)]
pub struct MediaImages {
    #[serde(rename = "bannerImage")]
    pub banner_image: Option<String>,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<CoverImage>,
}

#[derive(Debug, Deserialize)]
pub struct CoverImage {
    pub large: Option<String>,
}

// ── Conversions ──────────────────────────────────────────────────

impl MediaImages {
    /// The banner if AniList has one, otherwise the large cover.
    pub fn banner_or_cover(&self) -> Option<&str> {
        let banner = self.banner_image.as_deref().filter(|url| !url.is_empty());
        banner.or_else(|| {
            self.cover_image
                .as_ref()?
                .large
                .as_deref()
                .filter(|url| !url.is_empty())
        })
    }
}
