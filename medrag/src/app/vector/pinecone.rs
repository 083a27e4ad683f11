use crate::{
    core::{
        model::{Chunk, IndexEntry, ScoredChunk, VectorCollection},
        vector::{
            VectorDb, CHUNK_INDEX_PROPERTY, CONTENT_PROPERTY, HASH_PROPERTY, PAGE_PROPERTY,
            SOURCE_PROPERTY,
        },
    },
    err,
    error::MedragError,
    map_err, upstream_err,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{collections::HashMap, time::Duration};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";

/// Maximum vectors per upsert request.
const UPSERT_BATCH_SIZE: usize = 100;
/// Maximum ids per delete request.
const DELETE_BATCH_SIZE: usize = 1000;
/// Page size when listing vector ids.
const LIST_PAGE_SIZE: u32 = 100;

const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const READY_POLL_ATTEMPTS: usize = 60;

/// Pinecone serverless indexes over the REST API.
///
/// Collections map to indexes. Vector ids are `{source}#{hash}#{index}` so the
/// vectors of a document can be listed by id prefix. Serverless indexes cannot
/// delete by metadata filter.
#[derive(Debug)]
pub struct PineconeDb {
    key: String,
    cloud: String,
    region: String,
    control_plane: String,
    client: reqwest::Client,

    /// Index name -> data plane host.
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeDb {
    pub fn new(key: &str, cloud: &str, region: &str) -> Self {
        Self::with_control_plane(CONTROL_PLANE_URL, key, cloud, region)
    }

    pub fn with_control_plane(url: &str, key: &str, cloud: &str, region: &str) -> Self {
        info!("Using pinecone serverless indexes in {cloud}/{region}");
        Self {
            key: key.to_string(),
            cloud: cloud.to_string(),
            region: region.to_string(),
            control_plane: url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            hosts: RwLock::new(HashMap::new()),
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Fetch the index description, `None` if the index does not exist.
    async fn describe(&self, name: &str) -> Result<Option<IndexDescription>, MedragError> {
        let url = format!("{}/indexes/{name}", self.control_plane);
        let response = map_err!(self.request(Method::GET, &url).send().await);

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check(response).await?;
        Ok(Some(map_err!(response.json().await)))
    }

    /// Obtain the data plane URL of an index.
    async fn host(&self, name: &str) -> Result<String, MedragError> {
        if let Some(host) = self.hosts.read().await.get(name) {
            return Ok(host.clone());
        }

        let Some(description) = self.describe(name).await? else {
            return err!(DoesNotExist, "Pinecone index '{name}'");
        };

        // Pinecone reports bare hosts, local deployments include the scheme
        let host = if description.host.contains("://") {
            description.host
        } else {
            format!("https://{}", description.host)
        };

        self.hosts
            .write()
            .await
            .insert(name.to_string(), host.clone());

        Ok(host)
    }

    async fn wait_until_ready(&self, name: &str) -> Result<(), MedragError> {
        for _ in 0..READY_POLL_ATTEMPTS {
            if let Some(IndexDescription {
                status: IndexStatus { ready: true, .. },
                ..
            }) = self.describe(name).await?
            {
                return Ok(());
            }
            debug!("Waiting for pinecone index '{name}' to become ready");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        warn!("Pinecone index '{name}' not ready after {READY_POLL_ATTEMPTS} attempts");

        Ok(())
    }

    /// Create an index. Returns `false` if it already exists.
    async fn create_index(&self, name: &str, size: usize) -> Result<bool, MedragError> {
        let body = json!({
            "name": name,
            "dimension": size,
            "metric": "cosine",
            "spec": {
                "serverless": {
                    "cloud": self.cloud,
                    "region": self.region,
                }
            }
        });

        let url = format!("{}/indexes", self.control_plane);
        let response = map_err!(self.request(Method::POST, &url).json(&body).send().await);

        if response.status() == StatusCode::CONFLICT {
            return Ok(false);
        }

        check(response).await?;

        info!("Created pinecone index '{name}' ({size})");

        self.wait_until_ready(name).await?;

        Ok(true)
    }

    /// List all vector ids starting with `prefix`.
    async fn list_ids(&self, collection: &str, prefix: &str) -> Result<Vec<String>, MedragError> {
        let host = self.host(collection).await?;
        let url = format!("{host}/vectors/list");

        let mut ids = vec![];
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &url)
                .query(&[("prefix", prefix)])
                .query(&[("limit", LIST_PAGE_SIZE)]);

            if let Some(ref token) = token {
                request = request.query(&[("paginationToken", token)]);
            }

            let response = check(map_err!(request.send().await)).await?;
            let page: ListResponse = map_err!(response.json().await);

            ids.extend(page.vectors.into_iter().map(|v| v.id));

            token = page.pagination.and_then(|p| p.next);

            if token.is_none() {
                break;
            }
        }

        Ok(ids)
    }
}

#[async_trait::async_trait]
impl VectorDb for PineconeDb {
    fn id(&self) -> &'static str {
        "pinecone"
    }

    async fn create_vector_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        if !self.create_index(name, size).await? {
            return err!(AlreadyExists, "Pinecone index '{name}'");
        }
        Ok(())
    }

    async fn get_collection(&self, name: &str) -> Result<VectorCollection, MedragError> {
        match self.describe(name).await? {
            Some(description) => Ok(VectorCollection::new(name, description.dimension)),
            None => err!(DoesNotExist, "Pinecone index '{name}'"),
        }
    }

    async fn delete_vector_collection(&self, name: &str) -> Result<(), MedragError> {
        let url = format!("{}/indexes/{name}", self.control_plane);
        let response = map_err!(self.request(Method::DELETE, &url).send().await);

        if response.status() == StatusCode::NOT_FOUND {
            return err!(DoesNotExist, "Pinecone index '{name}'");
        }

        check(response).await?;

        self.hosts.write().await.remove(name);

        Ok(())
    }

    async fn create_default_collection(&self, name: &str, size: usize) -> Result<(), MedragError> {
        if !self.create_index(name, size).await? {
            debug!("Pinecone index '{name}' already exists");
        }
        Ok(())
    }

    async fn query(
        &self,
        search: Vec<f32>,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, MedragError> {
        let host = self.host(collection).await?;

        let body = QueryRequest {
            vector: search,
            top_k: limit,
            include_metadata: true,
            include_values: false,
        };

        let response = map_err!(
            self.request(Method::POST, &format!("{host}/query"))
                .json(&body)
                .send()
                .await
        );

        let response: QueryResponse = map_err!(check(response).await?.json().await);

        Ok(response
            .matches
            .into_iter()
            .filter_map(|m| {
                let chunk = chunk_from_metadata(m.metadata?)?;
                Some(ScoredChunk {
                    chunk,
                    score: m.score,
                })
            })
            .collect())
    }

    async fn insert_embeddings(
        &self,
        collection: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), MedragError> {
        let host = self.host(collection).await?;
        let url = format!("{host}/vectors/upsert");

        debug!("Inserting {} vectors to {collection}", entries.len());

        let vectors = entries.into_iter().map(PineconeVector::from).collect::<Vec<_>>();

        for batch in vectors.chunks(UPSERT_BATCH_SIZE) {
            let response = map_err!(
                self.request(Method::POST, &url)
                    .json(&json!({ "vectors": batch }))
                    .send()
                    .await
            );
            check(response).await?;
        }

        Ok(())
    }

    async fn delete_embeddings(&self, collection: &str, source: &str) -> Result<(), MedragError> {
        let ids = self.list_ids(collection, &id_prefix(source, None)).await?;

        if ids.is_empty() {
            return Ok(());
        }

        let host = self.host(collection).await?;
        let url = format!("{host}/vectors/delete");

        for batch in ids.chunks(DELETE_BATCH_SIZE) {
            let response = map_err!(
                self.request(Method::POST, &url)
                    .json(&json!({ "ids": batch }))
                    .send()
                    .await
            );
            check(response).await?;
        }

        debug!("Deleted {} vectors of '{source}'", ids.len());

        Ok(())
    }

    async fn count_vectors(
        &self,
        collection: &str,
        source: &str,
        hash: Option<&str>,
    ) -> Result<usize, MedragError> {
        Ok(self
            .list_ids(collection, &id_prefix(source, hash))
            .await?
            .len())
    }
}

/// Errors with an upstream error if the response is not successful.
async fn check(response: Response) -> Result<Response, MedragError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    upstream_err!("pinecone", status.as_u16(), body)
}

/// Escape the id separator in source names.
fn source_key(source: &str) -> String {
    source.replace('%', "%25").replace('#', "%23")
}

fn id_prefix(source: &str, hash: Option<&str>) -> String {
    match hash {
        Some(hash) => format!("{}#{hash}#", source_key(source)),
        None => format!("{}#", source_key(source)),
    }
}

fn chunk_from_metadata(mut metadata: Map<String, Value>) -> Option<Chunk> {
    let Some(Value::String(content)) = metadata.remove(CONTENT_PROPERTY) else {
        warn!("Match is missing '{CONTENT_PROPERTY}'");
        return None;
    };

    let source = match metadata.remove(SOURCE_PROPERTY) {
        Some(Value::String(source)) => source,
        _ => String::new(),
    };

    // Pinecone stores all numbers as floats
    let number = |v: Option<Value>| v.as_ref().and_then(Value::as_f64).map(|n| n as u64);

    Some(Chunk {
        content,
        source,
        page: number(metadata.remove(PAGE_PROPERTY)).map(|p| p as u32),
        index: number(metadata.remove(CHUNK_INDEX_PROPERTY)).unwrap_or_default() as usize,
    })
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    dimension: usize,
    host: String,
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    ready: bool,
}

#[derive(Debug, Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    metadata: Map<String, Value>,
}

impl From<IndexEntry> for PineconeVector {
    fn from(IndexEntry { chunk, vector, hash }: IndexEntry) -> Self {
        let id = format!("{}{}", id_prefix(&chunk.source, Some(&hash)), chunk.index);

        let mut metadata = Map::new();
        metadata.insert(CONTENT_PROPERTY.to_string(), Value::from(chunk.content));
        metadata.insert(SOURCE_PROPERTY.to_string(), Value::from(chunk.source));
        metadata.insert(CHUNK_INDEX_PROPERTY.to_string(), Value::from(chunk.index));
        metadata.insert(HASH_PROPERTY.to_string(), Value::from(hash));
        if let Some(page) = chunk.page {
            metadata.insert(PAGE_PROPERTY.to_string(), Value::from(page));
        }

        Self {
            id,
            values: vector,
            metadata,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: u32,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    score: f32,
    metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedVector>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct ListedVector {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<String>,
}
