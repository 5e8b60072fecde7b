pub mod cache;
mod db;
mod store;

use std::time::Duration;

use animeverse_api::anilist::AniListClient;
use animeverse_api::backend::{BackendClient, BackendError};
use animeverse_api::jikan::JikanClient;
use animeverse_core::config::{AppConfig, StoreKind};
use animeverse_core::error::AnimeverseError;

pub use cache::{
    CacheKey, ImageResolutionCache, ImageSink, Resolution, ResolveError, ResolveReport,
    ResolvedFrom,
};
pub use db::DbHandle;
pub use store::{StoreBackend, StoreError};

const USER_AGENT: &str = concat!("animeverse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("could not load configuration: {0}")]
    Config(#[source] AnimeverseError),
    #[error("invalid store.base_url: {0}")]
    StoreUrl(#[from] BackendError),
    #[error("database error: {0}")]
    Database(#[from] AnimeverseError),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Image cache wired to the collaborators named in [`AppConfig`].
pub type ConfiguredCache =
    ImageResolutionCache<StoreBackend, Option<JikanClient>, Option<AniListClient>>;

/// Build the resolution cache described by `config`.
pub fn build_cache(config: &AppConfig) -> Result<ConfiguredCache, RuntimeError> {
    let timeout = request_timeout(config);
    let http = http_client(timeout)?;
    let store = build_store(config, &http)?;

    let providers = &config.providers;
    let jikan = providers.jikan.enabled.then(|| {
        let client = JikanClient::with_http(http.clone());
        match &providers.jikan.base_url {
            Some(url) => client.with_base_url(url.as_str()),
            None => client,
        }
    });
    let anilist = providers.anilist.enabled.then(|| {
        let client = AniListClient::with_http(http.clone());
        match &providers.anilist.base_url {
            Some(url) => client.with_api_url(url.as_str()),
            None => client,
        }
    });

    tracing::debug!(
        store = ?config.store.kind,
        jikan = jikan.is_some(),
        anilist = anilist.is_some(),
        ?timeout,
        "Image cache configured"
    );

    Ok(ImageResolutionCache::new(store, jikan, anilist).with_request_timeout(timeout))
}

/// Open the store selected by `config.store.kind`.
pub fn build_store(config: &AppConfig, http: &reqwest::Client) -> Result<StoreBackend, RuntimeError> {
    match config.store.kind {
        StoreKind::Local => open_local_store(config).map(StoreBackend::Local),
        StoreKind::Remote => Ok(StoreBackend::Remote(BackendClient::with_http(
            &config.store.base_url,
            http.clone(),
        )?)),
        StoreKind::None => Ok(StoreBackend::Detached),
    }
}

/// Open the local SQLite store in the user data directory.
pub fn open_local_store(config: &AppConfig) -> Result<DbHandle, RuntimeError> {
    let db_path = AppConfig::ensure_db_path().map_err(RuntimeError::Config)?;
    tracing::debug!(path = %db_path.display(), "Opening image store");
    let db = DbHandle::open(&db_path)?;
    Ok(db.with_stale_after_days(config.store.stale_after_days))
}

fn request_timeout(config: &AppConfig) -> Option<Duration> {
    (config.images.request_timeout_secs > 0).then(|| config.images.request_timeout())
}

fn http_client(timeout: Option<Duration>) -> Result<reqwest::Client, RuntimeError> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
