//! HTTP client for the remote content store.
//!
//! One client struct owns the base URL, the credential and a shared reqwest
//! `Client`. The store is consumed through two narrow traits so the pipeline
//! stages can be exercised against in-memory fakes: `MediaStore` for asset
//! existence/upload and `RecordStore` for record creation and taxonomy
//! terms.
//!
//! Endpoints:
//! - `GET  /media/{id}`        existence by identifier; 200 means present
//! - `GET  /media?slug={slug}` existence by slug; first element of a
//!   non-empty array is used
//! - `POST /media`             multipart upload, single `file` field
//! - `POST /{record_route}`    record creation (JSON)
//! - `GET  /tags?search=..`, `POST /tags` resolve-or-create a tag by name
//! - `GET  /categories`, `GET /tags` taxonomy listings
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::MigrateConfig;

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network: {0}")]
    Net(#[from] reqwest::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("other: {0}")]
    Other(String),
}

/// A media asset as known to the remote store.
#[derive(Debug, Clone)]
pub struct RemoteAssetRef {
    pub id: u64,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct CreatedRecord {
    pub id: u64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct TaxonomyTerm {
    pub id: u64,
    pub name: String,
    pub slug: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn media_exists(&self, id: u64) -> Result<bool, ApiError>;
    async fn media_by_slug(&self, slug: &str) -> Result<Option<RemoteAssetRef>, ApiError>;
    /// Upload one asset; returns the newly minted remote identifier.
    async fn upload_media(&self, bytes: Vec<u8>, file_name: &str) -> Result<u64, ApiError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(&self, payload: &Value) -> Result<CreatedRecord, ApiError>;
    async fn find_tag(&self, name: &str) -> Result<Option<TaxonomyTerm>, ApiError>;
    async fn create_tag(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<TaxonomyTerm, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ContentApi {
    base_url: String,
    auth_header: String,
    record_route: String,
    http: Client,
}

impl ContentApi {
    pub fn new(cfg: &MigrateConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("folio-migrate/0.1")
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth_header: cfg.auth_scheme.header_value(&cfg.token),
            record_route: cfg.record_route.clone(),
            http,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }

    fn term_from_value(v: &Value) -> Option<TaxonomyTerm> {
        let id = v.get("id").and_then(Value::as_u64)?;
        let name = v.get("name").and_then(Value::as_str).unwrap_or_default();
        let slug = v.get("slug").and_then(Value::as_str).unwrap_or_default();
        Some(TaxonomyTerm {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }

    /// List taxonomy terms for a route (`categories` or `tags`).
    pub async fn list_terms(&self, route: &str) -> Result<Vec<TaxonomyTerm>, ApiError> {
        let resp = self
            .http
            .get(self.url(route))
            .header("Authorization", &self.auth_header)
            .query(&[("per_page", "100")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        let terms = body
            .as_array()
            .map(|arr| arr.iter().filter_map(Self::term_from_value).collect())
            .unwrap_or_default();
        Ok(terms)
    }
}

#[async_trait]
impl MediaStore for ContentApi {
    async fn media_exists(&self, id: u64) -> Result<bool, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("media/{id}")))
            .header("Authorization", &self.auth_header)
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    async fn media_by_slug(&self, slug: &str) -> Result<Option<RemoteAssetRef>, ApiError> {
        let resp = self
            .http
            .get(self.url("media"))
            .header("Authorization", &self.auth_header)
            .query(&[("slug", slug)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        let Some(first) = body.as_array().and_then(|arr| arr.first()) else {
            return Ok(None);
        };
        let id = first
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::Other("media entry missing numeric id".into()))?;
        let slug = first
            .get("slug")
            .and_then(Value::as_str)
            .unwrap_or(slug)
            .to_string();
        Ok(Some(RemoteAssetRef { id, slug }))
    }

    async fn upload_media(&self, bytes: Vec<u8>, file_name: &str) -> Result<u64, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.url("media"))
            .header("Authorization", &self.auth_header)
            .multipart(form)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        body.get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::Other("upload response missing numeric id".into()))
    }
}

#[async_trait]
impl RecordStore for ContentApi {
    async fn create_record(&self, payload: &Value) -> Result<CreatedRecord, ApiError> {
        let resp = self
            .http
            .post(self.url(&self.record_route))
            .header("Authorization", &self.auth_header)
            .json(payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        let id = body
            .get("id")
            .and_then(Value::as_u64)
            .ok_or_else(|| ApiError::Other("record response missing numeric id".into()))?;
        // Some stores wrap the title as { rendered: "..." }.
        let title = body
            .get("title")
            .map(|t| {
                t.get("rendered")
                    .and_then(Value::as_str)
                    .or_else(|| t.as_str())
                    .unwrap_or_default()
                    .to_string()
            })
            .unwrap_or_default();
        Ok(CreatedRecord { id, title })
    }

    async fn find_tag(&self, name: &str) -> Result<Option<TaxonomyTerm>, ApiError> {
        let resp = self
            .http
            .get(self.url("tags"))
            .header("Authorization", &self.auth_header)
            .query(&[("search", name)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        let found = body.as_array().and_then(|arr| {
            arr.iter()
                .filter_map(Self::term_from_value)
                .find(|t| t.name.eq_ignore_ascii_case(name))
        });
        Ok(found)
    }

    async fn create_tag(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<TaxonomyTerm, ApiError> {
        let mut payload = serde_json::json!({ "name": name });
        if let Some(desc) = description.filter(|d| !d.trim().is_empty()) {
            payload["description"] = serde_json::json!(desc);
        }

        let resp = self
            .http
            .post(self.url("tags"))
            .header("Authorization", &self.auth_header)
            .json(&payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = truncate_for_log(resp.text().await.unwrap_or_default(), 2000);
            return Err(ApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = resp.json().await?;
        Self::term_from_value(&body)
            .ok_or_else(|| ApiError::Other("tag response missing numeric id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthScheme, ExistenceStrategy, MigrateConfig, TagMode};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> MigrateConfig {
        MigrateConfig {
            base_url: base_url.to_string(),
            token: "tkn".into(),
            auth_scheme: AuthScheme::Basic,
            record_route: "projects".into(),
            media_root: "media".into(),
            strategy: ExistenceStrategy::ById,
            tag_mode: TagMode::ById,
            lookup_rps: 10,
            upload_rps: 10,
            submit_rps: 10,
        }
    }

    #[tokio::test]
    async fn media_exists_by_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media/123"))
            .and(header("authorization", "Basic tkn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 123})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/media/999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        assert!(api.media_exists(123).await.unwrap());
        assert!(!api.media_exists(999).await.unwrap());
    }

    #[tokio::test]
    async fn media_by_slug_takes_first_of_many() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media"))
            .and(query_param("slug", "hero-shot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 42, "slug": "hero-shot"},
                {"id": 43, "slug": "hero-shot-2"}
            ])))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        let found = api.media_by_slug("hero-shot").await.unwrap().unwrap();
        assert_eq!(found.id, 42);
        assert_eq!(found.slug, "hero-shot");
    }

    #[tokio::test]
    async fn media_by_slug_empty_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        assert!(api.media_by_slug("nothing-here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_returns_minted_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .and(header("authorization", "Basic tkn"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 456})))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        let id = api
            .upload_media(vec![0xFF, 0xD8], "photo.jpg")
            .await
            .unwrap();
        assert_eq!(id, 456);
    }

    #[tokio::test]
    async fn upload_failure_carries_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/media"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        let err = api
            .upload_media(vec![1, 2, 3], "photo.jpg")
            .await
            .unwrap_err();
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("disk full"));
            }
            other => panic!("expected http error, got {other}"),
        }
    }

    #[tokio::test]
    async fn create_record_unwraps_rendered_title() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 7,
                "title": {"rendered": "Redesign at Acme"}
            })))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        let created = api
            .create_record(&serde_json::json!({"title": "x"}))
            .await
            .unwrap();
        assert_eq!(created.id, 7);
        assert_eq!(created.title, "Redesign at Acme");
    }

    #[tokio::test]
    async fn find_tag_matches_name_case_insensitively() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tags"))
            .and(query_param("search", "Rust"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 3, "name": "rustacean", "slug": "rustacean"},
                {"id": 4, "name": "rust", "slug": "rust"}
            ])))
            .mount(&server)
            .await;

        let api = ContentApi::new(&test_config(&server.uri())).unwrap();
        let tag = api.find_tag("Rust").await.unwrap().unwrap();
        assert_eq!(tag.id, 4);
    }
}
