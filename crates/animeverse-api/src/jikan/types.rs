use serde::Deserialize;

// ── Anime detail response ───────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JikanAnimeResponse {
    pub data: JikanAnime,
}

#[derive(Debug, Deserialize)]
pub struct JikanAnime {
    pub mal_id: u64,
    pub images: Option<JikanImages>,
}

#[derive(Debug, Deserialize)]
pub struct JikanImages {
    pub jpg: Option<JikanImageUrls>,
}

#[derive(Debug, Deserialize)]
pub struct JikanImageUrls {
    pub large_image_url: Option<String>,
}

// ── Conversions ─────────────────────────────────────────────────

impl JikanAnime {
    /// The large JPEG cover, if Jikan has one.
    pub fn large_cover(&self) -> Option<&str> {
        self.images
            .as_ref()?
            .jpg
            .as_ref()?
            .large_image_url
            .as_deref()
            .filter(|url| !url.is_empty())
    }
}
