use std::time::Duration;

use async_trait::async_trait;
use observability::OperationTimer;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, error, info};

use super::MilvusConfig;
use crate::adapter::{Connector, ProviderAdapter};
use crate::error::{StoreError, StoreResult};
use crate::index_modes;
use crate::models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexSpec, InsertBatch, Metric,
    Neighbor, Provider,
};
use crate::schema::{self, FieldKind, FieldSpec, ID_FIELD, VECTOR_FIELD};

/// Milvus REST API response wrapper
#[derive(Debug, Deserialize)]
struct MilvusResponse<T> {
    code: i32,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HasCollection {
    has: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertOutcome {
    insert_count: usize,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionStats {
    row_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexInfo {
    #[serde(default)]
    field_name: String,
    #[serde(default)]
    index_type: String,
    #[serde(default)]
    metric_type: String,
    #[serde(default)]
    params: Map<String, Value>,
}

// Milvus is not distributed for Windows hosts
fn supported_on_host() -> bool {
    !cfg!(target_os = "windows")
}

/// Opens a fresh Milvus client for each call
pub struct MilvusConnector {
    config: MilvusConfig,
}

impl MilvusConnector {
    pub fn new(config: MilvusConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MilvusConnector {
    fn provider(&self) -> Provider {
        Provider::Milvus
    }

    fn is_available(&self) -> bool {
        supported_on_host()
    }

    async fn connect(&self) -> StoreResult<Box<dyn ProviderAdapter>> {
        Ok(Box::new(MilvusAdapter::new(&self.config)?))
    }
}

/// Milvus adapter using the REST v2 API
pub struct MilvusAdapter {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl MilvusAdapter {
    pub fn new(config: &MilvusConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to build Milvus client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.uri.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn call<T>(&self, path: &str, body: Value) -> StoreResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let url = format!("{}/v2/vectordb/{}", self.base_url, path);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("Milvus HTTP {} on {}: {}", status, path, text);
            return Err(if status.is_server_error() {
                StoreError::BackendUnavailable(message)
            } else {
                StoreError::Backend(message)
            });
        }

        let milvus_resp: MilvusResponse<T> = response.json().await?;
        if milvus_resp.code != 0 {
            return Err(classify(
                milvus_resp.code,
                milvus_resp.message.unwrap_or_default(),
            ));
        }
        Ok(milvus_resp.data.unwrap_or_default())
    }

    async fn has_collection(&self, name: &str) -> StoreResult<bool> {
        let has: HasCollection = self
            .call("collections/has", json!({ "collectionName": name }))
            .await?;
        Ok(has.has)
    }

    async fn vector_index(&self, name: &str) -> StoreResult<Option<IndexInfo>> {
        let described: StoreResult<Vec<IndexInfo>> = self
            .call(
                "indexes/describe",
                json!({ "collectionName": name, "indexName": VECTOR_FIELD }),
            )
            .await;
        match described {
            Ok(indexes) => Ok(indexes.into_iter().find(|i| i.field_name == VECTOR_FIELD)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn row_count(&self, name: &str) -> StoreResult<u64> {
        let stats: CollectionStats = self
            .call("collections/get_stats", json!({ "collectionName": name }))
            .await?;
        Ok(stats.row_count)
    }
}

fn classify(code: i32, message: String) -> StoreError {
    let lowered = message.to_lowercase();
    if lowered.contains("already exist") {
        StoreError::Schema(message)
    } else if lowered.contains("not found")
        || lowered.contains("not exist")
        || lowered.contains("can't find")
    {
        StoreError::NotFound(message)
    } else {
        StoreError::Backend(format!("Milvus error {}: {}", code, message))
    }
}

fn field_schema(spec: &FieldSpec, dimension: usize) -> Value {
    let data_type = match spec.kind {
        FieldKind::Int64 => "Int64",
        FieldKind::VarChar => "VarChar",
        FieldKind::FloatVector => "FloatVector",
    };
    let mut field = json!({ "fieldName": spec.name, "dataType": data_type });
    if spec.primary {
        field["isPrimary"] = json!(true);
    }
    match spec.kind {
        FieldKind::VarChar => {
            field["elementTypeParams"] = json!({ "max_length": spec.max_length.unwrap_or(65535) });
        }
        FieldKind::FloatVector => {
            field["elementTypeParams"] = json!({ "dim": dimension });
        }
        FieldKind::Int64 => {}
    }
    field
}

fn collection_schema(dimension: usize) -> Value {
    let fields: Vec<Value> = schema::COLLECTION_FIELDS
        .iter()
        .map(|spec| field_schema(spec, dimension))
        .collect();
    json!({ "autoId": false, "enableDynamicField": false, "fields": fields })
}

/// Vector dimension from a `collections/describe` payload
fn described_dimension(described: &Value) -> Option<usize> {
    described["fields"]
        .as_array()?
        .iter()
        .find(|f| f["name"] == VECTOR_FIELD)?["params"]
        .as_array()?
        .iter()
        .find(|p| p["key"] == "dim")
        .and_then(|p| match &p["value"] {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().map(|d| d as usize),
            _ => None,
        })
}

fn hit_to_neighbor(mut hit: Map<String, Value>) -> Neighbor {
    let id = match hit.remove(ID_FIELD) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    };
    // COSINE searches report similarity in `distance`
    let similarity = hit
        .remove("distance")
        .and_then(|d| d.as_f64())
        .unwrap_or(0.0) as f32;
    let (content, metadata) = schema::split_content(hit);
    Neighbor::from_similarity(id, content, metadata, similarity)
}

#[async_trait]
impl ProviderAdapter for MilvusAdapter {
    fn provider(&self) -> Provider {
        Provider::Milvus
    }

    fn is_available(&self) -> bool {
        supported_on_host()
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> StoreResult<CollectionHandle> {
        if self.has_collection(&descriptor.name).await? {
            return Err(StoreError::Schema(format!(
                "Collection '{}' already exists",
                descriptor.name
            )));
        }

        let timer = OperationTimer::start("milvus", "create_collection");
        self.call::<Value>(
            "collections/create",
            json!({
                "collectionName": descriptor.name,
                "schema": collection_schema(descriptor.dimension),
            }),
        )
        .await
        .map_err(|e| match e {
            StoreError::Backend(msg) => StoreError::Schema(msg),
            other => other,
        })?;
        timer.succeed();

        info!(collection = %descriptor.name, dimension = descriptor.dimension, "Created Milvus collection");
        Ok(descriptor.handle(descriptor.name.clone()))
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionDescriptor> {
        let described: Value = self
            .call("collections/describe", json!({ "collectionName": name }))
            .await?;
        if described.is_null() {
            return Err(StoreError::NotFound(format!("Collection '{}' does not exist", name)));
        }

        let dimension = described_dimension(&described).ok_or_else(|| {
            StoreError::Backend(format!("Milvus collection '{}' has no vector field", name))
        })?;
        let index = self.vector_index(name).await?.unwrap_or_default();

        Ok(CollectionDescriptor {
            name: name.to_string(),
            provider: Provider::Milvus,
            dimension,
            metric: Metric::parse(&index.metric_type).unwrap_or_default(),
            index_type: index.index_type,
            index_params: index.params,
        })
    }

    async fn list_collections(&self) -> StoreResult<Vec<CollectionSummary>> {
        let names: Vec<String> = self.call("collections/list", json!({})).await?;

        let mut summaries = Vec::with_capacity(names.len());
        for name in names {
            let count = self.row_count(&name).await?;
            summaries.push(CollectionSummary {
                id: name.clone(),
                name,
                count,
            });
        }
        summaries.sort();
        Ok(summaries)
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        if !self.has_collection(name).await? {
            return Ok(false);
        }
        self.call::<Value>("collections/drop", json!({ "collectionName": name }))
            .await?;
        info!(collection = %name, "Dropped Milvus collection");
        Ok(true)
    }

    async fn insert_batch(
        &self,
        handle: &CollectionHandle,
        batch: InsertBatch,
    ) -> StoreResult<usize> {
        let rows: Vec<Value> = batch
            .entries()
            .map(|(id, record)| {
                let mut row = schema::record_fields(&batch.document, record);
                row.insert(ID_FIELD.to_string(), json!(id));
                row.insert(VECTOR_FIELD.to_string(), json!(record.vector));
                Value::Object(row)
            })
            .collect();
        let expected = rows.len();

        let timer = OperationTimer::start("milvus", "insert_batch");
        let outcome: InsertOutcome = self
            .call(
                "entities/insert",
                json!({ "collectionName": handle.name, "data": rows }),
            )
            .await?;
        timer.succeed();

        if outcome.insert_count != expected {
            error!(
                collection = %handle.name,
                expected,
                inserted = outcome.insert_count,
                "Milvus accepted a partial batch"
            );
            return Err(StoreError::Backend(format!(
                "Milvus inserted {} of {} records",
                outcome.insert_count, expected
            )));
        }
        Ok(outcome.insert_count)
    }

    async fn build_index(
        &self,
        handle: &CollectionHandle,
        index: &IndexSpec,
        metric: Metric,
    ) -> StoreResult<()> {
        if !index_modes::is_supported(Provider::Milvus, &index.index_type) {
            return Err(StoreError::Schema(format!(
                "Milvus does not support index type '{}'",
                index.index_type
            )));
        }

        match self.vector_index(&handle.name).await? {
            Some(existing)
                if existing.index_type.eq_ignore_ascii_case(&index.index_type)
                    && existing.metric_type.eq_ignore_ascii_case(metric.as_str()) =>
            {
                debug!(collection = %handle.name, "Milvus index already present");
            }
            Some(existing) => {
                return Err(StoreError::Schema(format!(
                    "Collection '{}' already has a {} {} index",
                    handle.name, existing.index_type, existing.metric_type
                )));
            }
            None => {
                let timer = OperationTimer::start("milvus", "build_index");
                self.call::<Value>(
                    "indexes/create",
                    json!({
                        "collectionName": handle.name,
                        "indexParams": [{
                            "fieldName": VECTOR_FIELD,
                            "indexName": VECTOR_FIELD,
                            "metricType": metric.as_str(),
                            "indexType": index.index_type,
                            "params": index.params,
                        }],
                    }),
                )
                .await?;
                timer.succeed();
            }
        }

        self.call::<Value>("collections/load", json!({ "collectionName": handle.name }))
            .await?;
        Ok(())
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<Neighbor>> {
        let output_fields: Vec<&str> = schema::metadata_fields().map(|f| f.name).collect();

        let timer = OperationTimer::start("milvus", "search");
        let hits: Vec<Map<String, Value>> = self
            .call(
                "entities/search",
                json!({
                    "collectionName": handle.name,
                    "data": [query_vector],
                    "annsField": VECTOR_FIELD,
                    "limit": top_k,
                    "outputFields": output_fields,
                    "searchParams": { "metricType": Metric::Cosine.as_str() },
                }),
            )
            .await?;
        timer.succeed();

        let mut neighbors: Vec<Neighbor> = hits.into_iter().map(hit_to_neighbor).collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(neighbors)
    }
}
