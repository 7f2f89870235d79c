//! Qdrant backend over the REST API.
//!
//! Requests and responses use small serde structs that mirror Qdrant's wire
//! shapes. Responses are decoded into those structs and converted into
//! [`ScoredPoint`] / [`StoredPoint`] right here, so nothing loosely typed
//! leaves this module.

use super::{IndexedPoint, Payload, PointFilter, PointId, ScoredPoint, StoredPoint, VectorBackend};
use crate::config::IndexConfig;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Envelope around every Qdrant response body.
#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    #[serde(default)]
    config: Option<CollectionConfig>,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    /// Either `{size, distance}` or a map of named vectors
    #[serde(default)]
    vectors: Option<Value>,
}

impl CollectionInfo {
    /// Size of the unnamed vector, when the collection has one
    fn vector_size(&self) -> Option<usize> {
        self.config
            .as_ref()?
            .params
            .vectors
            .as_ref()?
            .get("size")?
            .as_u64()
            .map(|size| size as usize)
    }
}

#[derive(Debug, Serialize)]
struct WirePoint<'a> {
    id: PointId,
    vector: &'a [f32],
    payload: &'a Payload,
}

#[derive(Debug, Serialize)]
struct UpsertPoints<'a> {
    points: Vec<WirePoint<'a>>,
}

#[derive(Debug, Deserialize)]
struct UpdateResult {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
struct WireFilter {
    must: Vec<FieldCondition>,
}

#[derive(Debug, Serialize, PartialEq)]
struct FieldCondition {
    key: String,
    #[serde(rename = "match")]
    matches: MatchValue,
}

#[derive(Debug, Serialize, PartialEq)]
struct MatchValue {
    value: String,
}

impl WireFilter {
    fn from_filter(filter: &PointFilter) -> Option<Self> {
        if filter.is_empty() {
            return None;
        }
        let must = filter
            .conditions()
            .into_iter()
            .map(|(key, value)| FieldCondition {
                key: key.to_string(),
                matches: MatchValue {
                    value: value.to_string(),
                },
            })
            .collect();
        Some(Self { must })
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<WireFilter>,
    with_payload: bool,
}

#[derive(Debug, Serialize)]
struct ScrollRequest {
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<WireFilter>,
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Serialize)]
struct DeletePoints<'a> {
    points: &'a [PointId],
}

#[derive(Debug, Serialize)]
struct CountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<WireFilter>,
    exact: bool,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

/// Qdrant accepts unsigned integers and UUID strings as point ids.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePointId {
    Num(u64),
    Uuid(String),
}

impl WirePointId {
    fn into_point_id(self) -> anyhow::Result<PointId> {
        match self {
            Self::Num(id) => Ok(id),
            Self::Uuid(id) => anyhow::bail!("unexpected non-numeric point id {id}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireScoredPoint {
    id: WirePointId,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<WireRecord>,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    id: WirePointId,
    #[serde(default)]
    payload: Option<Payload>,
}

fn convert_scored(points: Vec<WireScoredPoint>) -> anyhow::Result<Vec<ScoredPoint>> {
    points
        .into_iter()
        .map(|p| {
            Ok(ScoredPoint {
                id: p.id.into_point_id()?,
                score: p.score,
                payload: p.payload.unwrap_or_default(),
            })
        })
        .collect()
}

fn convert_records(records: Vec<WireRecord>) -> anyhow::Result<Vec<StoredPoint>> {
    records
        .into_iter()
        .map(|r| {
            Ok(StoredPoint {
                id: r.id.into_point_id()?,
                payload: r.payload.unwrap_or_default(),
            })
        })
        .collect()
}

/// Vector backend talking to a Qdrant server.
#[derive(Clone)]
pub struct QdrantBackend {
    base_url: String,
    collection: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for QdrantBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantBackend")
            .field("base_url", &self.base_url)
            .field("collection", &self.collection)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl QdrantBackend {
    pub fn new(
        url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
    ) -> anyhow::Result<Self> {
        Self::with_client(url, collection, api_key, reqwest::Client::builder().build()?)
    }

    fn with_client(
        url: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> anyhow::Result<Self> {
        let base_url = url.into().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            anyhow::bail!("Qdrant URL must be an http(s) URL: {base_url}");
        }
        let collection = collection.into();
        if collection.is_empty() {
            anyhow::bail!("collection name must not be empty");
        }

        Ok(Self {
            base_url,
            collection,
            api_key,
            client,
        })
    }

    /// Backend for the URL, credential and collection in `config`.
    pub fn from_config(config: &IndexConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Self::with_client(
            &config.url,
            &config.collection,
            config.api_key.clone(),
            builder.build()?,
        )
    }

    /// Name of the collection this backend writes to
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    fn points_url(&self, action: &str) -> String {
        format!("{}/points{}", self.collection_url(), action)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("Qdrant returned {status}: {body}");
        }

        let decoded: QdrantResponse<T> = serde_json::from_str(&body)
            .with_context(|| format!("unexpected Qdrant response body: {body}"))?;
        Ok(decoded.result)
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    fn describe(&self) -> String {
        self.collection_url()
    }

    async fn ensure_collection(&self, dimension: usize) -> anyhow::Result<bool> {
        let response = self
            .request(Method::GET, self.collection_url())
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let body = CreateCollection {
                vectors: VectorParams {
                    size: dimension,
                    distance: "Cosine",
                },
            };
            let _: Value = self
                .send(self.request(Method::PUT, self.collection_url()).json(&body))
                .await
                .context("creating collection")?;
            return Ok(true);
        }

        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Qdrant returned {status}: {body}");
        }

        let info: QdrantResponse<CollectionInfo> = serde_json::from_str(&body)
            .with_context(|| format!("unexpected collection info: {body}"))?;
        if let Some(size) = info.result.vector_size() {
            if size != dimension {
                anyhow::bail!(
                    "collection {} has vector size {size}, expected {dimension}",
                    self.collection
                );
            }
        }
        Ok(false)
    }

    async fn upsert(&self, points: Vec<IndexedPoint>) -> anyhow::Result<()> {
        let body = UpsertPoints {
            points: points
                .iter()
                .map(|p| WirePoint {
                    id: p.id,
                    vector: &p.vector,
                    payload: &p.payload,
                })
                .collect(),
        };

        let result: UpdateResult = self
            .send(
                self.request(Method::PUT, self.points_url("?wait=true"))
                    .json(&body),
            )
            .await?;
        tracing::debug!("Qdrant upsert status: {:?}", result.status);
        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &PointFilter,
        limit: usize,
    ) -> anyhow::Result<Vec<ScoredPoint>> {
        let body = SearchRequest {
            vector,
            limit,
            filter: WireFilter::from_filter(filter),
            with_payload: true,
        };

        let hits: Vec<WireScoredPoint> = self
            .send(self.request(Method::POST, self.points_url("/search")).json(&body))
            .await?;
        convert_scored(hits)
    }

    async fn scroll(&self, filter: &PointFilter, limit: usize) -> anyhow::Result<Vec<StoredPoint>> {
        let body = ScrollRequest {
            limit,
            filter: WireFilter::from_filter(filter),
            with_payload: true,
            with_vector: false,
        };

        let page: ScrollResult = self
            .send(self.request(Method::POST, self.points_url("/scroll")).json(&body))
            .await?;
        convert_records(page.points)
    }

    async fn delete(&self, ids: &[PointId]) -> anyhow::Result<()> {
        let body = DeletePoints { points: ids };

        let result: UpdateResult = self
            .send(
                self.request(Method::POST, self.points_url("/delete?wait=true"))
                    .json(&body),
            )
            .await?;
        tracing::debug!("Qdrant delete status: {:?}", result.status);
        Ok(())
    }

    async fn count(&self, filter: &PointFilter) -> anyhow::Result<usize> {
        let body = CountRequest {
            filter: WireFilter::from_filter(filter),
            exact: true,
        };

        let result: CountResult = self
            .send(self.request(Method::POST, self.points_url("/count")).json(&body))
            .await?;
        Ok(result.count)
    }
}
