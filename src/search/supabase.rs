//! PostgREST client for the hosted database: the embeddings table, its
//! similarity-search RPC and the catalog tables behind each content type.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::models::{ContentType, SearchCandidate};
use crate::search::store::{CatalogSource, EmbeddingStore, StoreError, StoredRef};

const REF_COLUMNS: &str = "id,content_type,source_id,metadata";

pub struct SupabaseClient {
    client: reqwest::Client,
    config: StoreConfig,
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
    match_count: usize,
}

impl SupabaseClient {
    pub fn new(client: reqwest::Client, config: StoreConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rest/v1/{path}", self.config.base_url);
        let mut req = self.client.request(method, url);
        if let Some(key) = self.config.api_key.as_deref() {
            req = req
                .header("apikey", key)
                .header("Authorization", format!("Bearer {key}"));
        }
        req
    }

    /// Send and turn a non-2xx answer into [`StoreError::Reported`].
    async fn send(req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let resp = req.send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Reported { status, message });
        }
        Ok(resp)
    }
}

#[async_trait]
impl EmbeddingStore for SupabaseClient {
    async fn match_embeddings(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SearchCandidate>, StoreError> {
        let body = MatchRequest {
            query_embedding,
            match_threshold: threshold,
            match_count: limit,
        };
        let req = self
            .request(Method::POST, &format!("rpc/{}", self.config.match_function))
            .json(&body);
        let rows: Vec<SearchCandidate> = Self::send(req).await?.json().await?;
        Ok(rows)
    }

    async fn sample(&self, limit: usize) -> Result<Vec<StoredRef>, StoreError> {
        let req = self
            .request(Method::GET, &self.config.embeddings_table)
            .query(&[("select", REF_COLUMNS.to_string()), ("limit", limit.to_string())]);
        let rows: Vec<StoredRef> = Self::send(req).await?.json().await?;
        Ok(rows)
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let req = self
            .request(Method::HEAD, &self.config.embeddings_table)
            .query(&[("select", "id")])
            .header("Prefer", "count=estimated");
        let resp = Self::send(req).await?;
        let range = resp
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range)
            .ok_or_else(|| StoreError::Unavailable(format!("Unexpected Content-Range: {range:?}")))
    }
}

#[async_trait]
impl CatalogSource for SupabaseClient {
    async fn fetch_details(
        &self,
        content_type: ContentType,
        source_id: &str,
    ) -> anyhow::Result<Option<Value>> {
        let req = self.request(Method::GET, content_type.table()).query(&[
            ("select", content_type.select().to_string()),
            ("id", format!("eq.{source_id}")),
            ("limit", "1".to_string()),
        ]);

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to fetch {content_type} {source_id}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Catalog lookup on {} returned {status}: {body}", content_type.table());
        }

        let rows: Vec<Value> = resp
            .json()
            .await
            .context("Failed to parse catalog row")?;
        Ok(rows.into_iter().next())
    }
}

/// Total from a PostgREST `Content-Range` header (`0-24/3573` or `*/0`).
fn parse_content_range_total(range: &str) -> Option<usize> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}
