use animeverse_api::backend::{BackendClient, BackendError};
use animeverse_api::traits::{CatalogIds, ImageSet, ImageStore};
use animeverse_core::error::AnimeverseError;

use crate::db::DbHandle;

/// The image store selected in configuration.
pub enum StoreBackend {
    /// SQLite database in the user data directory.
    Local(DbHandle),
    /// Animeverse backend over HTTP.
    Remote(BackendClient),
    /// No store: every check misses and saves are dropped.
    Detached,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Local(#[from] AnimeverseError),

    #[error(transparent)]
    Remote(#[from] BackendError),
}

impl ImageStore for StoreBackend {
    type Error = StoreError;

    async fn check(&self, ids: CatalogIds) -> Result<Option<ImageSet>, StoreError> {
        match self {
            Self::Local(db) => Ok(db.check(ids).await?),
            Self::Remote(client) => Ok(client.check(ids).await?),
            Self::Detached => Ok(None),
        }
    }

    async fn save(&self, ids: CatalogIds, images: &ImageSet) -> Result<(), StoreError> {
        match self {
            Self::Local(db) => Ok(db.save(ids, images).await?),
            Self::Remote(client) => Ok(client.save(ids, images).await?),
            Self::Detached => Ok(()),
        }
    }
}
