use reqwest::Client;

use super::error::AniListError;
use super::types::{GraphQLResponse, MediaImagesResponse};
use crate::traits::ImageProvider;

const API_URL: &str = "https://graphql.anilist.co";

const MEDIA_IMAGES_QUERY: &str = r#"
query ($id: Int) {
    Media(id: $id, type: ANIME) {
        bannerImage
        coverImage { large }
    }
}
"#;

/// AniList GraphQL API client, used for banner art.
///
/// The image query is public, so no access token is sent.
pub struct AniListClient {
    api_url: String,
    http: Client,
}

impl Default for AniListClient {
    fn default() -> Self {
        Self::new()
    }
}

impl AniListClient {
    pub fn new() -> Self {
        Self::with_http(Client::new())
    }

    /// Build on a shared HTTP client (timeouts, user agent).
    pub fn with_http(http: Client) -> Self {
        Self {
            api_url: API_URL.into(),
            http,
        }
    }

    /// Point the client at a different GraphQL endpoint.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    async fn graphql_request<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, AniListError> {
        tracing::debug!(operation, "AniList GraphQL request");

        let resp = self
            .http
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let status_code = status.as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(operation, status = status_code, "AniList API error");
            return Err(AniListError::Api {
                status: status_code,
                message: body,
            });
        }

        tracing::debug!(operation, status = %status, "AniList response received");
        resp.json::<T>()
            .await
            .map_err(|e| AniListError::Parse(e.to_string()))
    }

    /// Fetch the banner (or cover fallback) for an AniList media ID.
    ///
    /// Returns `None` when AniList has neither image.
    pub async fn get_banner_or_cover(&self, anilist_id: u64) -> Result<Option<String>, AniListError> {
        let resp: GraphQLResponse<MediaImagesResponse> = self
            .graphql_request(
                "MediaImages",
                MEDIA_IMAGES_QUERY,
                serde_json::json!({ "id": anilist_id }),
            )
            .await?;

        Ok(resp
            .data
            .media
            .as_ref()
            .and_then(|m| m.banner_or_cover())
            .map(str::to_owned))
    }
}

impl ImageProvider for AniListClient {
    type Error = AniListError;

    fn name(&self) -> &'static str {
        "anilist"
    }

    async fn fetch_image(&self, anilist_id: u64) -> Result<String, AniListError> {
        Ok(self
            .get_banner_or_cover(anilist_id)
            .await?
            .unwrap_or_default())
    }
}
