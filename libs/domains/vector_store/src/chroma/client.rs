use std::time::Duration;

use async_trait::async_trait;
use observability::OperationTimer;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::ChromaConfig;
use crate::adapter::{Connector, ProviderAdapter};
use crate::error::{StoreError, StoreResult};
use crate::index_modes::{self, HNSW_EF_CONSTRUCTION, HNSW_M, INDEX_HNSW};
use crate::models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexSpec, InsertBatch, Metric,
    Neighbor, Provider,
};
use crate::schema;

// Collection metadata keys
const SPACE_KEY: &str = "hnsw:space";
const M_KEY: &str = "hnsw:M";
const EF_KEY: &str = "hnsw:construction_ef";
const DIMENSION_KEY: &str = "vector_dimension";

#[derive(Debug, Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
}

/// Builds a Chroma HTTP client per call
pub struct ChromaConnector {
    config: ChromaConfig,
}

impl ChromaConnector {
    pub fn new(config: ChromaConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for ChromaConnector {
    fn provider(&self) -> Provider {
        Provider::Chroma
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> StoreResult<Box<dyn ProviderAdapter>> {
        Ok(Box::new(ChromaAdapter::new(&self.config)?))
    }
}

/// Chroma adapter. Only HNSW indexes, configured through collection metadata.
pub struct ChromaAdapter {
    client: Client,
    collections_url: String,
}

impl ChromaAdapter {
    pub fn new(config: &ChromaConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to build Chroma client: {}", e)))?;

        Ok(Self {
            client,
            collections_url: config.collections_url(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> StoreResult<T> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            // add and delete may answer with an empty body
            let body = response.text().await?;
            let body = if body.trim().is_empty() { "null" } else { body.as_str() };
            return Ok(serde_json::from_str(body)?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = format!("Chroma {} failed ({}): {}", what, status, text);
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(message),
            StatusCode::CONFLICT => StoreError::Schema(message),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                StoreError::BackendUnavailable(message)
            }
            _ => StoreError::Backend(message),
        })
    }

    async fn get_collection(&self, name: &str) -> StoreResult<ChromaCollection> {
        let url = format!("{}/{}", self.collections_url, name);
        self.send(self.client.get(&url), "get collection").await
    }

    /// Handles derived from a descriptor carry the name, not the UUID
    async fn collection_id(&self, handle: &CollectionHandle) -> StoreResult<String> {
        if handle.id != handle.name {
            return Ok(handle.id.clone());
        }
        Ok(self.get_collection(&handle.name).await?.id)
    }

    async fn count(&self, collection_id: &str) -> StoreResult<u64> {
        let url = format!("{}/{}/count", self.collections_url, collection_id);
        self.send(self.client.get(&url), "count").await
    }
}

fn space_for(metric: Metric) -> &'static str {
    match metric {
        Metric::Cosine => "cosine",
        Metric::L2 => "l2",
        Metric::Ip => "ip",
    }
}

fn metric_from_space(space: Option<&Value>) -> Metric {
    match space.and_then(Value::as_str) {
        Some("l2") => Metric::L2,
        Some("ip") => Metric::Ip,
        _ => Metric::Cosine,
    }
}

/// Collection metadata carrying the index configuration.
///
/// Non-HNSW index types are built as HNSW with default parameters.
fn collection_metadata(descriptor: &CollectionDescriptor) -> Map<String, Value> {
    let index = index_modes::native_index(Provider::Chroma, &descriptor.index_spec());

    let mut metadata = Map::new();
    metadata.insert(SPACE_KEY.to_string(), json!(space_for(descriptor.metric)));
    metadata.insert(M_KEY.to_string(), json!(index.param_u64("M").unwrap_or(HNSW_M)));
    metadata.insert(
        EF_KEY.to_string(),
        json!(index.param_u64("efConstruction").unwrap_or(HNSW_EF_CONSTRUCTION)),
    );
    metadata.insert(DIMENSION_KEY.to_string(), json!(descriptor.dimension));
    metadata
}

fn hnsw_spec(m: u64, ef_construction: u64) -> IndexSpec {
    let mut params = Map::new();
    params.insert("M".to_string(), json!(m));
    params.insert("efConstruction".to_string(), json!(ef_construction));
    IndexSpec::new(INDEX_HNSW, params)
}

fn index_from_metadata(metadata: &Map<String, Value>) -> IndexSpec {
    hnsw_spec(
        metadata.get(M_KEY).and_then(Value::as_u64).unwrap_or(HNSW_M),
        metadata.get(EF_KEY).and_then(Value::as_u64).unwrap_or(HNSW_EF_CONSTRUCTION),
    )
}

fn query_to_neighbors(response: QueryResponse) -> Vec<Neighbor> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let distances = response.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();
    let documents = response.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
    let metadatas = response.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .map(|(i, id)| {
            let (stored_content, metadata) =
                schema::split_content(metadatas.get(i).cloned().flatten().unwrap_or_default());
            let content = documents.get(i).cloned().flatten().unwrap_or(stored_content);
            Neighbor {
                id,
                content,
                metadata,
                // Chroma cosine space already reports 1 - similarity
                distance: distances.get(i).copied().flatten().unwrap_or(1.0),
            }
        })
        .collect()
}

#[async_trait]
impl ProviderAdapter for ChromaAdapter {
    fn provider(&self) -> Provider {
        Provider::Chroma
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> StoreResult<CollectionHandle> {
        let metadata = collection_metadata(descriptor);

        let timer = OperationTimer::start("chroma", "create_collection");
        let created: ChromaCollection = self
            .send(
                self.client.post(&self.collections_url).json(&json!({
                    "name": descriptor.name,
                    "metadata": metadata,
                    "get_or_create": false,
                })),
                "create collection",
            )
            .await?;
        timer.succeed();

        info!(collection = %created.name, id = %created.id, "Created Chroma collection");
        Ok(descriptor.handle(created.id))
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionDescriptor> {
        let collection = self.get_collection(name).await?;
        let metadata = collection.metadata.unwrap_or_default();

        let dimension = collection
            .dimension
            .or_else(|| metadata.get(DIMENSION_KEY).and_then(Value::as_u64).map(|d| d as usize))
            .ok_or_else(|| {
                StoreError::Backend(format!("Chroma collection '{}' has no dimension", name))
            })?;
        let index = index_from_metadata(&metadata);

        Ok(CollectionDescriptor {
            name: collection.name,
            provider: Provider::Chroma,
            dimension,
            metric: metric_from_space(metadata.get(SPACE_KEY)),
            index_type: index.index_type,
            index_params: index.params,
        })
    }

    async fn list_collections(&self) -> StoreResult<Vec<CollectionSummary>> {
        let collections: Vec<ChromaCollection> = self
            .send(self.client.get(&self.collections_url), "list collections")
            .await?;

        let mut summaries = Vec::with_capacity(collections.len());
        for collection in collections {
            let count = self.count(&collection.id).await?;
            summaries.push(CollectionSummary {
                id: collection.id,
                name: collection.name,
                count,
            });
        }
        summaries.sort();
        Ok(summaries)
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        let url = format!("{}/{}", self.collections_url, name);
        match self.send::<Value>(self.client.delete(&url), "delete collection").await {
            Ok(_) => {
                info!(collection = %name, "Dropped Chroma collection");
                Ok(true)
            }
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn insert_batch(
        &self,
        handle: &CollectionHandle,
        batch: InsertBatch,
    ) -> StoreResult<usize> {
        let mut ids = Vec::with_capacity(batch.len());
        let mut embeddings = Vec::with_capacity(batch.len());
        let mut documents = Vec::with_capacity(batch.len());
        let mut metadatas = Vec::with_capacity(batch.len());

        for (id, record) in batch.entries() {
            let (content, metadata) =
                schema::split_content(schema::record_fields(&batch.document, record));
            ids.push(id.to_string());
            embeddings.push(&record.vector);
            documents.push(content);
            metadatas.push(metadata);
        }
        let inserted = ids.len();

        let url = format!("{}/{}/add", self.collections_url, self.collection_id(handle).await?);
        let timer = OperationTimer::start("chroma", "insert_batch");
        self.send::<Value>(
            self.client.post(&url).json(&json!({
                "ids": ids,
                "embeddings": embeddings,
                "documents": documents,
                "metadatas": metadatas,
            })),
            "add",
        )
        .await?;
        timer.succeed();

        Ok(inserted)
    }

    async fn build_index(
        &self,
        handle: &CollectionHandle,
        index: &IndexSpec,
        metric: Metric,
    ) -> StoreResult<()> {
        let index = index_modes::native_index(Provider::Chroma, index);

        // Chroma builds its HNSW graph on insert; only verify the configuration
        let current = self.describe_collection(&handle.name).await?;
        let requested = hnsw_spec(
            index.param_u64("M").unwrap_or(HNSW_M),
            index.param_u64("efConstruction").unwrap_or(HNSW_EF_CONSTRUCTION),
        );

        if current.index_spec() == requested && current.metric == metric {
            debug!(collection = %handle.name, "Chroma index already matches");
            Ok(())
        } else {
            Err(StoreError::Schema(format!(
                "Collection '{}' was created with a different index configuration",
                handle.name
            )))
        }
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<Neighbor>> {
        let url = format!("{}/{}/query", self.collections_url, self.collection_id(handle).await?);

        let timer = OperationTimer::start("chroma", "search");
        let response: QueryResponse = self
            .send(
                self.client.post(&url).json(&json!({
                    "query_embeddings": [query_vector],
                    "n_results": top_k,
                    "include": ["documents", "metadatas", "distances"],
                })),
                "query",
            )
            .await?;
        timer.succeed();

        Ok(query_to_neighbors(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_modes::resolve;

    fn descriptor(mode: &str) -> CollectionDescriptor {
        let index = resolve(mode);
        CollectionDescriptor {
            name: "manual_openai_20240501123045".to_string(),
            provider: Provider::Chroma,
            dimension: 3,
            metric: Metric::Cosine,
            index_type: index.index_type,
            index_params: index.params,
        }
    }

    #[test]
    fn test_collection_metadata_for_hnsw() {
        let metadata = collection_metadata(&descriptor("hnsw"));
        assert_eq!(metadata[SPACE_KEY], "cosine");
        assert_eq!(metadata[M_KEY], 16);
        assert_eq!(metadata[EF_KEY], 200);
        assert_eq!(metadata[DIMENSION_KEY], 3);

        assert_eq!(index_from_metadata(&metadata), resolve("hnsw"));
    }

    #[test]
    fn test_non_hnsw_modes_map_to_hnsw() {
        for mode in ["flat", "ivf_flat", "ivf_sq8"] {
            let metadata = collection_metadata(&descriptor(mode));
            assert_eq!(metadata[M_KEY], HNSW_M);
            assert_eq!(metadata[EF_KEY], HNSW_EF_CONSTRUCTION);
            assert_eq!(index_from_metadata(&metadata), resolve("hnsw"));
        }
    }

    #[test]
    fn test_query_to_neighbors() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["0", "2"]],
            "distances": [[0.0, 0.0061]],
            "documents": [["first chunk", null]],
            "metadatas": [[{ "page_number": "1" }, { "content": "third chunk" }]]
        }))
        .unwrap();

        let neighbors = query_to_neighbors(response);
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].content, "first chunk");
        assert_eq!(neighbors[0].metadata["page_number"], "1");
        assert_eq!(neighbors[1].content, "third chunk");
        assert!((neighbors[1].similarity() - 0.9939).abs() < 1e-4);
    }
}
