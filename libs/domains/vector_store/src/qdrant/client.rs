use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use observability::OperationTimer;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    self, CountPointsBuilder, CreateCollectionBuilder, Distance, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::QdrantConfig;
use crate::adapter::{Connector, ProviderAdapter};
use crate::error::{StoreError, StoreResult};
use crate::index_modes::{self, HNSW_EF_CONSTRUCTION, HNSW_M, INDEX_FLAT, INDEX_HNSW};
use crate::models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexSpec, InsertBatch, Metric,
    Neighbor, Provider,
};
use crate::schema;

/// Builds a Qdrant client per call
pub struct QdrantConnector {
    config: QdrantConfig,
}

impl QdrantConnector {
    pub fn new(config: QdrantConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for QdrantConnector {
    fn provider(&self) -> Provider {
        Provider::Qdrant
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn connect(&self) -> StoreResult<Box<dyn ProviderAdapter>> {
        Ok(Box::new(QdrantAdapter::new(&self.config)?))
    }
}

/// Qdrant-backed adapter.
///
/// The HNSW graph is configured at creation time; `FLAT` collections disable it (`m = 0`).
pub struct QdrantAdapter {
    client: Qdrant,
}

impl QdrantAdapter {
    pub fn new(config: &QdrantConfig) -> StoreResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to build Qdrant client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn to_qdrant_distance(metric: Metric) -> Distance {
        match metric {
            Metric::Cosine => Distance::Cosine,
            Metric::L2 => Distance::Euclid,
            Metric::Ip => Distance::Dot,
        }
    }

    fn from_qdrant_distance(distance: Distance) -> Metric {
        match distance {
            Distance::Euclid => Metric::L2,
            Distance::Dot => Metric::Ip,
            _ => Metric::Cosine,
        }
    }

    fn point_id_to_string(point_id: Option<&PointId>) -> String {
        match point_id.and_then(|p| p.point_id_options.as_ref()) {
            Some(qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
            Some(qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid.clone(),
            None => String::new(),
        }
    }

    async fn ensure_exists(&self, name: &str) -> StoreResult<()> {
        if self.client.collection_exists(name).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("Collection '{}' does not exist", name)))
        }
    }

    async fn collection_config(&self, name: &str) -> StoreResult<qdrant::CollectionConfig> {
        self.ensure_exists(name).await?;
        self.client
            .collection_info(name)
            .await?
            .result
            .and_then(|info| info.config)
            .ok_or_else(|| StoreError::Backend(format!("Qdrant returned no config for '{}'", name)))
    }
}

/// HNSW settings for an index spec.
///
/// `FLAT` disables the graph; inverted-file types are built as HNSW.
fn hnsw_for(index: &IndexSpec) -> qdrant::HnswConfigDiff {
    let index = index_modes::native_index(Provider::Qdrant, index);
    let mut hnsw = qdrant::HnswConfigDiff::default();
    if index.index_type.eq_ignore_ascii_case(INDEX_FLAT) {
        hnsw.m = Some(0);
    } else {
        hnsw.m = Some(index.param_u64("M").unwrap_or(HNSW_M));
        hnsw.ef_construct = Some(index.param_u64("efConstruction").unwrap_or(HNSW_EF_CONSTRUCTION));
    }
    hnsw
}

/// Index spec recovered from a collection's HNSW settings
fn index_from_hnsw(hnsw: Option<&qdrant::HnswConfigDiff>) -> IndexSpec {
    match hnsw.and_then(|h| h.m) {
        Some(0) => index_modes::resolve("flat"),
        m => {
            let ef = hnsw.and_then(|h| h.ef_construct).unwrap_or(HNSW_EF_CONSTRUCTION);
            let params = json!({ "M": m.unwrap_or(HNSW_M), "efConstruction": ef });
            let Value::Object(params) = params else {
                return IndexSpec::new(INDEX_HNSW, Map::new());
            };
            IndexSpec::new(INDEX_HNSW, params)
        }
    }
}

fn vector_params(config: &qdrant::CollectionConfig) -> Option<(usize, Metric)> {
    let vectors = config.params.as_ref()?.vectors_config.as_ref()?;
    match vectors.config.as_ref()? {
        qdrant::vectors_config::Config::Params(p) => {
            Some((p.size as usize, QdrantAdapter::from_qdrant_distance(p.distance())))
        }
        qdrant::vectors_config::Config::ParamsMap(map) => map
            .map
            .values()
            .next()
            .map(|p| (p.size as usize, QdrantAdapter::from_qdrant_distance(p.distance()))),
    }
}

fn json_to_qdrant_value(val: Value) -> Option<QdrantValue> {
    match val {
        Value::Null => None,
        Value::Bool(b) => Some(QdrantValue::from(b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(QdrantValue::from(i))
            } else {
                n.as_f64().map(QdrantValue::from)
            }
        }
        Value::String(s) => Some(QdrantValue::from(s)),
        other => Some(QdrantValue::from(other.to_string())),
    }
}

fn qdrant_value_to_json(val: QdrantValue) -> Option<Value> {
    use qdrant::value::Kind;

    match val.kind {
        Some(Kind::NullValue(_)) => Some(Value::Null),
        Some(Kind::BoolValue(b)) => Some(Value::Bool(b)),
        Some(Kind::IntegerValue(i)) => Some(Value::Number(i.into())),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(f).map(Value::Number),
        Some(Kind::StringValue(s)) => Some(Value::String(s)),
        _ => None,
    }
}

fn to_payload(fields: Map<String, Value>) -> HashMap<String, QdrantValue> {
    fields
        .into_iter()
        .filter_map(|(key, val)| json_to_qdrant_value(val).map(|v| (key, v)))
        .collect()
}

fn from_payload(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .filter_map(|(key, val)| qdrant_value_to_json(val).map(|v| (key, v)))
        .collect()
}

#[async_trait]
impl ProviderAdapter for QdrantAdapter {
    fn provider(&self) -> Provider {
        Provider::Qdrant
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> StoreResult<CollectionHandle> {
        let hnsw = hnsw_for(&descriptor.index_spec());

        if self.client.collection_exists(&descriptor.name).await? {
            return Err(StoreError::Schema(format!(
                "Collection '{}' already exists",
                descriptor.name
            )));
        }

        let timer = OperationTimer::start("qdrant", "create_collection");
        let builder = CreateCollectionBuilder::new(&descriptor.name)
            .vectors_config(VectorParamsBuilder::new(
                descriptor.dimension as u64,
                Self::to_qdrant_distance(descriptor.metric),
            ))
            .hnsw_config(hnsw);
        self.client.create_collection(builder).await?;
        timer.succeed();

        info!(collection = %descriptor.name, dimension = descriptor.dimension, "Created Qdrant collection");
        Ok(descriptor.handle(descriptor.name.clone()))
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionDescriptor> {
        let config = self.collection_config(name).await?;
        let (dimension, metric) = vector_params(&config).ok_or_else(|| {
            StoreError::Backend(format!("Qdrant collection '{}' has no vector params", name))
        })?;
        let index = index_from_hnsw(config.hnsw_config.as_ref());

        Ok(CollectionDescriptor {
            name: name.to_string(),
            provider: Provider::Qdrant,
            dimension,
            metric,
            index_type: index.index_type,
            index_params: index.params,
        })
    }

    async fn list_collections(&self) -> StoreResult<Vec<CollectionSummary>> {
        let collections = self.client.list_collections().await?;

        let mut summaries = Vec::with_capacity(collections.collections.len());
        for collection in collections.collections {
            let counted = self
                .client
                .count(CountPointsBuilder::new(&collection.name).exact(true))
                .await?;
            summaries.push(CollectionSummary {
                id: collection.name.clone(),
                count: counted.result.map(|r| r.count).unwrap_or(0),
                name: collection.name,
            });
        }
        summaries.sort();
        Ok(summaries)
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        if !self.client.collection_exists(name).await? {
            return Ok(false);
        }
        let response = self.client.delete_collection(name).await?;
        info!(collection = %name, "Dropped Qdrant collection");
        Ok(response.result)
    }

    async fn insert_batch(
        &self,
        handle: &CollectionHandle,
        batch: InsertBatch,
    ) -> StoreResult<usize> {
        let points: Vec<PointStruct> = batch
            .entries()
            .map(|(id, record)| {
                PointStruct::new(
                    id,
                    record.vector.clone(),
                    to_payload(schema::record_fields(&batch.document, record)),
                )
            })
            .collect();
        let inserted = points.len();

        let timer = OperationTimer::start("qdrant", "insert_batch");
        self.client
            .upsert_points(UpsertPointsBuilder::new(&handle.name, points).wait(true))
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
        let requested = hnsw_for(index);
        let config = self.collection_config(&handle.name).await?;

        let current_metric = vector_params(&config).map(|(_, m)| m);
        let current = config.hnsw_config.unwrap_or_default();
        let same_graph = match requested.m {
            Some(0) => current.m == Some(0),
            _ => current.m == requested.m && current.ef_construct == requested.ef_construct,
        };

        if same_graph && current_metric == Some(metric) {
            debug!(collection = %handle.name, "Qdrant index already matches");
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
        let timer = OperationTimer::start("qdrant", "search");
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(&handle.name, query_vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await?;
        timer.succeed();

        Ok(response
            .result
            .into_iter()
            .map(|point| {
                let (content, metadata) = schema::split_content(from_payload(point.payload));
                Neighbor::from_similarity(
                    Self::point_id_to_string(point.id.as_ref()),
                    content,
                    metadata,
                    point.score,
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_modes::resolve;

    #[test]
    fn test_hnsw_for_modes() {
        let flat = hnsw_for(&resolve("flat"));
        assert_eq!(flat.m, Some(0));

        let hnsw = hnsw_for(&resolve("hnsw"));
        assert_eq!(hnsw.m, Some(16));
        assert_eq!(hnsw.ef_construct, Some(200));

        for mode in ["ivf_flat", "ivf_sq8"] {
            assert_eq!(hnsw_for(&resolve(mode)), hnsw);
        }
    }

    #[test]
    fn test_index_from_hnsw_round_trips_modes() {
        for mode in ["flat", "hnsw"] {
            let spec = resolve(mode);
            assert_eq!(index_from_hnsw(Some(&hnsw_for(&spec))), spec);
        }
        assert_eq!(index_from_hnsw(Some(&hnsw_for(&resolve("ivf_sq8")))), resolve("hnsw"));
    }

    #[test]
    fn test_payload_conversion_keeps_scalars() {
        let mut fields = Map::new();
        fields.insert("content".to_string(), json!("Rinse the filter."));
        fields.insert("chunk_id".to_string(), json!(3));
        fields.insert("missing".to_string(), Value::Null);

        let back = from_payload(to_payload(fields));
        assert_eq!(back["content"], "Rinse the filter.");
        assert_eq!(back["chunk_id"], 3);
        assert!(!back.contains_key("missing"));
    }

    #[test]
    fn test_point_id_to_string() {
        assert_eq!(QdrantAdapter::point_id_to_string(Some(&PointId::from(42u64))), "42");
        assert_eq!(QdrantAdapter::point_id_to_string(None), "");
    }
}
