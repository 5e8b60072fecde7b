//! Trait definitions for the image sources consulted when resolving artwork.
//!
//! Provider clients (Jikan, AniList) implement [`ImageProvider`]; backend
//! stores (the remote Animeverse API, the local SQLite store) implement
//! [`ImageStore`]. The resolution cache is generic over both.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// The best-known cover/banner pair for one catalog entry.
///
/// A missing image is the empty string, matching the backend wire format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSet {
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub banner_url: String,
}

impl ImageSet {
    pub fn new(image_url: impl Into<String>, banner_url: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            banner_url: banner_url.into(),
        }
    }

    /// True when neither a cover nor a banner is known.
    pub fn is_empty(&self) -> bool {
        self.image_url.is_empty() && self.banner_url.is_empty()
    }
}

/// The two external identifiers of a catalog entry.
///
/// `mal` keys the cover lookup, `anilist` keys the banner lookup. Zero is
/// not a valid ID on either service and is normalized to `None` on
/// construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CatalogIds {
    mal: Option<u64>,
    anilist: Option<u64>,
}

impl CatalogIds {
    pub fn new(mal: Option<u64>, anilist: Option<u64>) -> Self {
        Self {
            mal: mal.filter(|&id| id > 0),
            anilist: anilist.filter(|&id| id > 0),
        }
    }

    /// MyAnimeList ID, keying the cover lookup.
    pub fn mal(&self) -> Option<u64> {
        self.mal
    }

    /// AniList ID, keying the banner lookup.
    pub fn anilist(&self) -> Option<u64> {
        self.anilist
    }

    /// True when neither identifier is present.
    pub fn is_empty(&self) -> bool {
        self.mal.is_none() && self.anilist.is_none()
    }
}

/// A third-party service that maps one identifier to one image URL.
pub trait ImageProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Short service name used in logs.
    fn name(&self) -> &'static str;

    /// Look up the image URL for `id`. An empty string means the service
    /// knows the entry but has no image for it.
    fn fetch_image(&self, id: u64) -> impl Future<Output = Result<String, Self::Error>> + Send;
}

/// A cache-of-record holding previously resolved image pairs.
pub trait ImageStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a stored pair. `Ok(None)` when the store has nothing usable.
    fn check(
        &self,
        ids: CatalogIds,
    ) -> impl Future<Output = Result<Option<ImageSet>, Self::Error>> + Send;

    /// Persist a resolved pair.
    fn save(
        &self,
        ids: CatalogIds,
        images: &ImageSet,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Error for a provider slot that may be switched off in configuration.
#[derive(Debug, thiserror::Error)]
pub enum OptionalProviderError<E: std::error::Error + 'static> {
    #[error("provider disabled")]
    Disabled,

    #[error(transparent)]
    Provider(E),
}

impl<P: ImageProvider> ImageProvider for Option<P> {
    type Error = OptionalProviderError<P::Error>;

    fn name(&self) -> &'static str {
        match self {
            Some(provider) => provider.name(),
            None => "disabled",
        }
    }

    async fn fetch_image(&self, id: u64) -> Result<String, Self::Error> {
        match self {
            Some(provider) => provider
                .fetch_image(id)
                .await
                .map_err(OptionalProviderError::Provider),
            None => Err(OptionalProviderError::Disabled),
        }
    }
}
