use reqwest::Client;
use url::Url;

use super::error::BackendError;
use super::types::{AckResponse, CheckResponse, SaveRequest};
use crate::traits::{CatalogIds, ImageSet, ImageStore};

/// Client for the Animeverse backend's image cache endpoints.
pub struct BackendClient {
    base_url: Url,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        Self::with_http(base_url, Client::new())
    }

    /// Build on a shared HTTP client (timeouts, user agent).
    pub fn with_http(base_url: &str, http: Client) -> Result<Self, BackendError> {
        // Without a trailing slash `Url::join` would replace the last segment.
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { base_url, http })
    }

    /// URL for the check endpoint with only the present IDs as query parameters.
    pub fn check_url(&self, ids: CatalogIds) -> Result<Url, BackendError> {
        let mut url = self.base_url.join("api/images/check")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(mal_id) = ids.mal() {
                query.append_pair("mal_id", &mal_id.to_string());
            }
            if let Some(anilist_id) = ids.anilist() {
                query.append_pair("anilist_id", &anilist_id.to_string());
            }
        }
        Ok(url)
    }

    fn save_url(&self) -> Result<Url, BackendError> {
        Ok(self.base_url.join("api/images/save")?)
    }

    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Backend API error");
            Err(BackendError::Api {
                status,
                message: body,
            })
        }
    }
}

impl ImageStore for BackendClient {
    type Error = BackendError;

    async fn check(&self, ids: CatalogIds) -> Result<Option<ImageSet>, BackendError> {
        let url = self.check_url(ids)?;
        tracing::debug!(%url, "Backend image check");

        let resp = self.http.get(url).send().await?;
        let resp = Self::check_response(resp).await?;
        let body: CheckResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(body.into_images())
    }

    async fn save(&self, ids: CatalogIds, images: &ImageSet) -> Result<(), BackendError> {
        let url = self.save_url()?;
        tracing::debug!(%url, ?ids, "Backend image save");

        let resp = self
            .http
            .post(url)
            .json(&SaveRequest::new(ids, images))
            .send()
            .await?;
        let resp = Self::check_response(resp).await?;

        // Older deployments answer with an empty body; only an explicit
        // `success: false` counts as a rejection.
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<AckResponse>(&body) {
            Ok(AckResponse { success: false }) => Err(BackendError::Rejected),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve_once;

    #[test]
    fn test_check_url() {
        let client = BackendClient::new("https://animeverse.example/app").unwrap();

        let url = client.check_url(CatalogIds::new(Some(5114), Some(5114))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://animeverse.example/app/api/images/check?mal_id=5114&anilist_id=5114"
        );

        let url = client.check_url(CatalogIds::new(None, Some(21))).unwrap();
        assert_eq!(
            url.as_str(),
            "https://animeverse.example/app/api/images/check?anilist_id=21"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            BackendClient::new("not a url"),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_check_hit() {
        let (base, request) = serve_once(
            200,
            r#"{"success": true, "data": {"image_url": "http://x/a.jpg", "banner_url": ""}}"#,
        )
        .await;

        let client = BackendClient::new(&base).unwrap();
        let images = client
            .check(CatalogIds::new(Some(123), Some(456)))
            .await
            .unwrap();
        assert_eq!(images, Some(ImageSet::new("http://x/a.jpg", "")));

        let request = request.await.unwrap();
        assert!(request.starts_with("GET /api/images/check?mal_id=123&anilist_id=456 "));
    }

    #[tokio::test]
    async fn test_save_posts_json() {
        let (base, request) = serve_once(200, r#"{"success": true}"#).await;

        let client = BackendClient::new(&base).unwrap();
        let images = ImageSet::new("http://x/a.jpg", "http://x/b.jpg");
        client
            .save(CatalogIds::new(Some(123), Some(456)), &images)
            .await
            .unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /api/images/save "));
        assert!(request.contains(r#""mal_id":123"#));
        assert!(request.contains(r#""banner_url":"http://x/b.jpg""#));
    }

    #[tokio::test]
    async fn test_save_rejected() {
        let (base, _request) = serve_once(200, r#"{"success": false}"#).await;
        let client = BackendClient::new(&base).unwrap();
        let result = client
            .save(CatalogIds::new(Some(1), None), &ImageSet::new("http://x/a.jpg", ""))
            .await;
        assert!(matches!(result, Err(BackendError::Rejected)));
    }

    #[tokio::test]
    async fn test_save_server_error() {
        let (base, _request) = serve_once(500, "boom").await;
        let client = BackendClient::new(&base).unwrap();
        let result = client
            .save(CatalogIds::new(Some(1), None), &ImageSet::new("http://x/a.jpg", ""))
            .await;
        assert!(matches!(result, Err(BackendError::Api { status: 500, .. })));
    }
}
