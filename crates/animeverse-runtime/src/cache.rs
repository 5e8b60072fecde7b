//! In-memory image resolution with request coalescing.
//!
//! [`ImageResolutionCache`] answers "which cover and banner belong to this
//! catalog entry?" It consults a backend store first, falls back to two
//! third-party providers queried side by side, and persists what it finds.
//! Concurrent callers for the same entry share one in-flight lookup and are
//! all notified through their own sinks when it settles.
//!
//! Per key the cache moves `Unresolved -> Pending -> Resolved`, or back to
//! `Unresolved` when nothing was found, so a later call retries.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use animeverse_api::traits::{CatalogIds, ImageProvider, ImageSet, ImageStore};

/// Default bound on each store and provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives resolved images, e.g. to update a visual element.
///
/// May be called more than once with the same pair.
pub trait ImageSink: Send + Sync {
    fn apply(&self, images: &ImageSet);
}

impl<F> ImageSink for F
where
    F: Fn(&ImageSet) + Send + Sync,
{
    fn apply(&self, images: &ImageSet) {
        self(images)
    }
}

type SharedSink = Arc<dyn ImageSink>;

/// Cache key derived from both catalog identifiers.
///
/// Rendered as `"{mal}-{anilist}"` with an absent ID left empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `None` when neither identifier is present.
    pub fn from_ids(ids: &CatalogIds) -> Option<Self> {
        if ids.is_empty() {
            return None;
        }
        let part = |id: Option<u64>| id.map(|v| v.to_string()).unwrap_or_default();
        Some(Self(format!("{}-{}", part(ids.mal()), part(ids.anilist()))))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why one step of a resolution produced nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{origin} request failed: {message}")]
    Transport {
        origin: &'static str,
        message: String,
    },

    #[error("{origin} has no image: {reason}")]
    NotFound {
        origin: &'static str,
        reason: &'static str,
    },

    #[error("persisting images failed: {0}")]
    Persist(String),
}

/// Per-step failures absorbed during one resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub store_check: Option<ResolveError>,
    pub cover: Option<ResolveError>,
    pub banner: Option<ResolveError>,
    pub persist: Option<ResolveError>,
}

/// Where a freshly resolved pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrom {
    Store,
    Providers,
}

/// What a call to [`ImageResolutionCache::resolve`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Both identifiers were absent; nothing happened.
    NoIds,
    /// Served from memory.
    CacheHit(ImageSet),
    /// Attached to a lookup already in flight for the same key.
    Joined,
    /// This call ran the lookup and found images.
    Resolved {
        from: ResolvedFrom,
        images: ImageSet,
        report: ResolveReport,
    },
    /// This call ran the lookup and found nothing.
    NotFound { report: ResolveReport },
}

#[derive(Default)]
struct State {
    resolved: HashMap<CacheKey, ImageSet>,
    pending: HashMap<CacheKey, Vec<SharedSink>>,
}

struct Inner<S, A, B> {
    store: S,
    cover: A,
    banner: B,
    state: Mutex<State>,
}

impl<S, A, B> Inner<S, A, B> {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Sinks run outside the lock, so poisoning can only come from a
        // panic inside this module's own short critical sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Coalescing cover/banner cache in front of a store and two providers.
///
/// `A` supplies covers keyed by MyAnimeList ID, `B` supplies banners keyed
/// by AniList ID. Clones share the same cache.
pub struct ImageResolutionCache<S, A, B> {
    inner: Arc<Inner<S, A, B>>,
    request_timeout: Option<Duration>,
}

impl<S, A, B> Clone for ImageResolutionCache<S, A, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            request_timeout: self.request_timeout,
        }
    }
}

impl<S, A, B> ImageResolutionCache<S, A, B>
where
    S: ImageStore,
    A: ImageProvider,
    B: ImageProvider,
{
    pub fn new(store: S, cover: A, banner: B) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                cover,
                banner,
                state: Mutex::new(State::default()),
            }),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Bound each store and provider call. `None` waits indefinitely.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve the images for `ids` and deliver them to `sink`.
    ///
    /// A cache hit is delivered before this returns. If a lookup for the
    /// same key is already running, `sink` is queued on it and this returns
    /// [`Resolution::Joined`] at once. Otherwise this call runs the lookup
    /// and every queued sink is invoked when it finds something. Failures
    /// are logged and reported in the returned value, never raised.
    pub async fn resolve<K>(&self, ids: CatalogIds, sink: K) -> Resolution
    where
        K: ImageSink + 'static,
    {
        let Some(key) = CacheKey::from_ids(&ids) else {
            tracing::debug!("Image resolution skipped: no identifiers");
            return Resolution::NoIds;
        };
        let sink: SharedSink = Arc::new(sink);

        {
            let mut state = self.inner.lock();
            if let Some(images) = state.resolved.get(&key).cloned() {
                drop(state);
                sink.apply(&images);
                return Resolution::CacheHit(images);
            }
            if let Some(waiting) = state.pending.get_mut(&key) {
                waiting.push(sink);
                tracing::debug!(%key, waiting = waiting.len(), "Joined in-flight image lookup");
                return Resolution::Joined;
            }
            state.pending.insert(key.clone(), vec![sink]);
        }

        let pending = PendingGuard {
            inner: &*self.inner,
            key: Some(key.clone()),
        };

        let (found, report) = self.lookup(&key, ids).await;
        let sinks = pending.settle(found.as_ref().map(|(_, images)| images));

        match found {
            Some((from, images)) => {
                tracing::debug!(%key, ?from, sinks = sinks.len(), "Images resolved");
                for sink in &sinks {
                    sink.apply(&images);
                }
                Resolution::Resolved {
                    from,
                    images,
                    report,
                }
            }
            None => {
                tracing::info!(%key, "No images found");
                Resolution::NotFound { report }
            }
        }
    }

    /// Cached images for `key`, without triggering a lookup.
    pub fn cached(&self, key: &CacheKey) -> Option<ImageSet> {
        self.inner.lock().resolved.get(key).cloned()
    }

    /// Whether a lookup for `key` is currently in flight.
    pub fn is_pending(&self, key: &CacheKey) -> bool {
        self.inner.lock().pending.contains_key(key)
    }

    /// Number of resolved entries held in memory.
    pub fn len(&self) -> usize {
        self.inner.lock().resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn lookup(
        &self,
        key: &CacheKey,
        ids: CatalogIds,
    ) -> (Option<(ResolvedFrom, ImageSet)>, ResolveReport) {
        let mut report = ResolveReport::default();

        match self.bounded("store", self.inner.store.check(ids)).await {
            Ok(Some(images)) if !images.is_empty() => {
                return (Some((ResolvedFrom::Store, images)), report);
            }
            Ok(_) => tracing::debug!(%key, "Image store miss"),
            Err(e) => {
                tracing::warn!(%key, error = %e, "Image store check failed");
                report.store_check = Some(e);
            }
        }

        let (cover, banner) = tokio::join!(
            self.fetch(&self.inner.cover, ids.mal()),
            self.fetch(&self.inner.banner, ids.anilist()),
        );

        let image_url = cover.unwrap_or_else(|e| {
            tracing::debug!(%key, error = %e, "Cover lookup produced nothing");
            report.cover = Some(e);
            String::new()
        });
        let banner_url = banner.unwrap_or_else(|e| {
            tracing::debug!(%key, error = %e, "Banner lookup produced nothing");
            report.banner = Some(e);
            String::new()
        });

        let images = ImageSet::new(image_url, banner_url);
        if images.is_empty() {
            return (None, report);
        }

        if let Err(e) = self.bounded("store", self.inner.store.save(ids, &images)).await {
            let e = ResolveError::Persist(e.to_string());
            tracing::warn!(%key, error = %e, "Failed to persist images");
            report.persist = Some(e);
        }

        (Some((ResolvedFrom::Providers, images)), report)
    }

    async fn fetch<P: ImageProvider>(
        &self,
        provider: &P,
        id: Option<u64>,
    ) -> Result<String, ResolveError> {
        let origin = provider.name();
        let Some(id) = id else {
            return Err(ResolveError::NotFound {
                origin,
                reason: "no identifier",
            });
        };

        let url = self.bounded(origin, provider.fetch_image(id)).await?;
        if url.is_empty() {
            return Err(ResolveError::NotFound {
                origin,
                reason: "empty response",
            });
        }
        Ok(url)
    }

    /// Run one collaborator call under the request timeout.
    async fn bounded<T, E, F>(&self, origin: &'static str, call: F) -> Result<T, ResolveError>
    where
        E: std::error::Error,
        F: Future<Output = Result<T, E>>,
    {
        let result = match self.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(ResolveError::Transport {
                        origin,
                        message: format!("timed out after {limit:?}"),
                    })
                }
            },
            None => call.await,
        };
        result.map_err(|e| ResolveError::Transport {
            origin,
            message: e.to_string(),
        })
    }
}

impl<S, A, B> ImageResolutionCache<S, A, B>
where
    S: ImageStore + 'static,
    A: ImageProvider + 'static,
    B: ImageProvider + 'static,
{
    /// Fire-and-forget [`resolve`](Self::resolve) on the current Tokio runtime.
    pub fn spawn_resolve<K>(&self, ids: CatalogIds, sink: K) -> tokio::task::JoinHandle<Resolution>
    where
        K: ImageSink + 'static,
    {
        let cache = self.clone();
        tokio::spawn(async move { cache.resolve(ids, sink).await })
    }
}

/// Owns a key's pending entry until the lookup settles.
///
/// Dropping it unsettled (the resolving future was cancelled) clears the
/// entry without notifying anyone, so the key can be retried.
struct PendingGuard<'a, S, A, B> {
    inner: &'a Inner<S, A, B>,
    key: Option<CacheKey>,
}

impl<S, A, B> PendingGuard<'_, S, A, B> {
    /// Clear the pending entry, caching `found` in the same critical
    /// section, and hand back the sinks to notify.
    fn settle(mut self, found: Option<&ImageSet>) -> Vec<SharedSink> {
        let Some(key) = self.key.take() else {
            return Vec::new();
        };
        let mut state = self.inner.lock();
        let sinks = state.pending.remove(&key).unwrap_or_default();
        if let Some(images) = found {
            state.resolved.insert(key, images.clone());
        }
        sinks
    }
}

impl<S, A, B> Drop for PendingGuard<'_, S, A, B> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            tracing::debug!(%key, "Image lookup abandoned");
            self.inner.lock().pending.remove(&key);
        }
    }
}
