use reqwest::Client;

use super::error::JikanError;
use super::types::JikanAnimeResponse;
use crate::traits::ImageProvider;

const BASE_URL: &str = "https://api.jikan.moe/v4";

/// Jikan v4 client, used for MyAnimeList cover art.
///
/// Jikan is unauthenticated; no token or client ID is needed.
pub struct JikanClient {
    base_url: String,
    http: Client,
}

impl Default for JikanClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JikanClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    /// Build on a shared HTTP client (timeouts, user agent).
    pub fn with_http(http: Client) -> Self {
        Self {
            base_url: BASE_URL.into(),
            http,
        }
    }

    /// Point the client at a mirror instead of the public API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, JikanError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Jikan API error");
            Err(JikanError::Api {
                status,
                message: body,
            })
        }
    }

    /// Fetch the anime record for a MyAnimeList ID.
    pub async fn get_anime(&self, mal_id: u64) -> Result<JikanAnimeResponse, JikanError> {
        tracing::debug!(mal_id, "Jikan anime request");

        let resp = self
            .http
            .get(format!("{}/anime/{mal_id}", self.base_url))
            .header("Accept", "application/json")
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| JikanError::Parse(e.to_string()))
    }
}

impl ImageProvider for JikanClient {
    type Error = JikanError;

    fn name(&self) -> &'static str {
        "jikan"
    }

    async fn fetch_image(&self, mal_id: u64) -> Result<String, JikanError> {
        let anime = self.get_anime(mal_id).await?;
        match anime.data.large_cover() {
            Some(url) => Ok(url.to_owned()),
            None => {
                tracing::debug!(mal_id = anime.data.mal_id, "Jikan entry has no large cover");
                Ok(String::new())
            }
        }
    }
}
