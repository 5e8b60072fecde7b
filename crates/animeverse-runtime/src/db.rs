use std::path::Path;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};

use animeverse_api::traits::{CatalogIds, ImageSet, ImageStore};
use animeverse_core::error::AnimeverseError;
use animeverse_core::storage::{Storage, StoredImages};

/// Async handle to the SQLite image store.
///
/// `rusqlite::Connection` is blocking, so the storage lives on its own
/// thread and is driven through a command channel.
#[derive(Clone)]
pub struct DbHandle {
    tx: mpsc::UnboundedSender<DbCommand>,
    stale_after: Option<chrono::Duration>,
}

enum DbCommand {
    GetImages {
        ids: CatalogIds,
        reply: oneshot::Sender<Result<Option<StoredImages>, AnimeverseError>>,
    },
    UpsertImages {
        ids: CatalogIds,
        images: ImageSet,
        reply: oneshot::Sender<Result<i64, AnimeverseError>>,
    },
    DeleteStale {
        cutoff: chrono::DateTime<Utc>,
        reply: oneshot::Sender<Result<usize, AnimeverseError>>,
    },
}

impl DbHandle {
    pub fn open(path: &Path) -> Result<Self, AnimeverseError> {
        let storage = Storage::open(path)?;
        Self::spawn(storage)
    }

    /// In-memory store (for tests).
    pub fn open_memory() -> Result<Self, AnimeverseError> {
        Self::spawn(Storage::open_memory()?)
    }

    fn spawn(storage: Storage) -> Result<Self, AnimeverseError> {
        let (tx, rx) = mpsc::unbounded_channel();

        std::thread::Builder::new()
            .name("db-actor".into())
            .spawn(move || actor_loop(storage, rx))?;

        Ok(Self {
            tx,
            stale_after: None,
        })
    }

    /// Treat rows older than `days` as absent in [`ImageStore::check`].
    /// Zero keeps rows forever.
    pub fn with_stale_after_days(mut self, days: u32) -> Self {
        self.stale_after = (days > 0).then(|| chrono::Duration::days(i64::from(days)));
        self
    }

    pub async fn get_images(&self, ids: CatalogIds) -> Result<Option<StoredImages>, AnimeverseError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::GetImages { ids, reply });
        rx.await.unwrap_or(Err(AnimeverseError::ActorClosed))
    }

    pub async fn upsert_images(
        &self,
        ids: CatalogIds,
        images: ImageSet,
    ) -> Result<i64, AnimeverseError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::UpsertImages { ids, images, reply });
        rx.await.unwrap_or(Err(AnimeverseError::ActorClosed))
    }

    pub async fn delete_stale(
        &self,
        cutoff: chrono::DateTime<Utc>,
    ) -> Result<usize, AnimeverseError> {
        let (reply, rx) = oneshot::channel();
        let _ = self.tx.send(DbCommand::DeleteStale { cutoff, reply });
        rx.await.unwrap_or(Err(AnimeverseError::ActorClosed))
    }
}

impl ImageStore for DbHandle {
    type Error = AnimeverseError;

    async fn check(&self, ids: CatalogIds) -> Result<Option<ImageSet>, AnimeverseError> {
        let Some(row) = self.get_images(ids).await? else {
            return Ok(None);
        };

        if let Some(max_age) = self.stale_after {
            if row.is_stale(max_age, Utc::now()) {
                tracing::debug!(id = row.id, last_updated = %row.last_updated, "Stored images are stale");
                return Ok(None);
            }
        }

        let images = ImageSet::new(row.image_url, row.banner_url);
        Ok((!images.is_empty()).then_some(images))
    }

    async fn save(&self, ids: CatalogIds, images: &ImageSet) -> Result<(), AnimeverseError> {
        self.upsert_images(ids, images.clone()).await.map(|_| ())
    }
}

fn actor_loop(storage: Storage, mut rx: mpsc::UnboundedReceiver<DbCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            DbCommand::GetImages { ids, reply } => {
                let _ = reply.send(storage.get_images(ids.mal(), ids.anilist()));
            }
            DbCommand::UpsertImages { ids, images, reply } => {
                let _ = reply.send(storage.upsert_images(
                    ids.mal(),
                    ids.anilist(),
                    &images.image_url,
                    &images.banner_url,
                ));
            }
            DbCommand::DeleteStale { cutoff, reply } => {
                let _ = reply.send(storage.delete_stale(cutoff));
            }
        }
    }
    tracing::debug!("DB actor stopped");
}
