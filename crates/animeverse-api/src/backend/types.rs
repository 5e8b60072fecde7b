use serde::{Deserialize, Serialize};

use crate::traits::{CatalogIds, ImageSet};

/// Answer to `GET /api/images/check`.
#[derive(Debug, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub success: bool,
    pub data: Option<ImageSet>,
}

/// Body of `POST /api/images/save`.
#[derive(Debug, Serialize)]
pub struct SaveRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mal_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anilist_id: Option<u64>,
    pub image_url: &'a str,
    pub banner_url: &'a str,
}

/// Acknowledgement returned by mutating endpoints.
#[derive(Debug, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

impl CheckResponse {
    /// The stored pair, if the backend reported a usable one.
    pub fn into_images(self) -> Option<ImageSet> {
        if !self.success {
            return None;
        }
        self.data.filter(|images| !images.is_empty())
    }
}

impl<'a> SaveRequest<'a> {
    pub fn new(ids: CatalogIds, images: &'a ImageSet) -> Self {
        Self {
            mal_id: ids.mal(),
            anilist_id: ids.anilist(),
            image_url: &images.image_url,
            banner_url: &images.banner_url,
        }
    }
}
