use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use observability::OperationTimer;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapter::ProviderAdapter;
use crate::error::{StoreError, StoreResult};
use crate::index_modes;
use crate::models::{
    CollectionDescriptor, CollectionHandle, CollectionSummary, IndexSpec, InsertBatch, Metric,
    Neighbor, Provider,
};
use crate::naming;
use crate::schema;

static SHARED: OnceCell<Arc<LocalStore>> = OnceCell::new();

const MANIFEST_FILE: &str = "manifest.json";
const POINTS_FILE: &str = "points.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPoint {
    id: u64,
    vector: Vec<f32>,
    fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BuiltIndex {
    spec: IndexSpec,
    metric: Metric,
}

/// Collection metadata, rewritten whole on create and index build
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    descriptor: CollectionDescriptor,
    index: Option<BuiltIndex>,
}

#[derive(Debug)]
struct StoredCollection {
    manifest: Manifest,
    points: Vec<StoredPoint>,
}

/// Process-wide embedded vector store.
///
/// Each collection lives in its own directory: `manifest.json` holds the
/// descriptor and built index, `points.jsonl` holds one point per line and
/// only ever grows by appending a batch.
#[derive(Debug)]
pub struct LocalStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl LocalStore {
    /// Open a store rooted at `dir`, loading every persisted collection.
    ///
    /// Unreadable collection directories are skipped with a warning.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let mut collections = HashMap::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.join(MANIFEST_FILE).is_file() {
                continue;
            }
            match load_collection(&path) {
                Ok(collection) => {
                    collections.insert(collection.manifest.descriptor.name.clone(), collection);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable collection"),
            }
        }

        info!(dir = %dir.display(), collections = collections.len(), "Opened local vector store");

        Ok(Self {
            dir,
            collections: RwLock::new(collections),
        })
    }

    /// The process-wide store, opened on first use and never torn down.
    ///
    /// Only the first call's `dir` is honored.
    pub fn shared(dir: impl AsRef<Path>) -> StoreResult<Arc<Self>> {
        SHARED
            .get_or_try_init(|| Self::open(dir).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    async fn write_manifest(&self, manifest: &Manifest) -> StoreResult<()> {
        let path = self.collection_dir(&manifest.descriptor.name).join(MANIFEST_FILE);
        let staging = path.with_extension("json.tmp");

        tokio::fs::write(&staging, serde_json::to_vec(manifest)?).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }

    /// Append points as JSON lines, cutting the file back on a failed write
    async fn append_points(&self, name: &str, points: &[StoredPoint]) -> StoreResult<()> {
        let mut lines = Vec::new();
        for point in points {
            serde_json::to_writer(&mut lines, point)?;
            lines.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.collection_dir(name).join(POINTS_FILE))
            .await?;
        let committed = file.metadata().await?.len();

        let written = match file.write_all(&lines).await {
            Ok(()) => file.sync_data().await,
            Err(e) => Err(e),
        };

        if let Err(e) = written {
            if let Err(rollback) = file.set_len(committed).await {
                warn!(collection = %name, error = %rollback, "Failed to roll back partial append");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

fn load_collection(path: &Path) -> StoreResult<StoredCollection> {
    let manifest: Manifest = serde_json::from_slice(&std::fs::read(path.join(MANIFEST_FILE))?)?;

    let mut points = Vec::new();
    match std::fs::File::open(path.join(POINTS_FILE)) {
        Ok(file) => {
            for line in BufReader::new(file).lines() {
                let line = line?;
                if !line.trim().is_empty() {
                    points.push(serde_json::from_str(&line)?);
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    Ok(StoredCollection { manifest, points })
}

fn not_found(name: &str) -> StoreError {
    StoreError::NotFound(format!("Collection '{}' does not exist", name))
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl ProviderAdapter for LocalStore {
    fn provider(&self) -> Provider {
        Provider::Local
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn create_collection(
        &self,
        descriptor: &CollectionDescriptor,
    ) -> StoreResult<CollectionHandle> {
        if !naming::is_legal(&descriptor.name) {
            return Err(StoreError::Validation(format!(
                "Illegal collection name '{}'",
                descriptor.name
            )));
        }
        if descriptor.metric != Metric::Cosine {
            return Err(StoreError::Schema(format!(
                "Local store only supports COSINE, got {}",
                descriptor.metric.as_str()
            )));
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(&descriptor.name) {
            return Err(StoreError::Schema(format!(
                "Collection '{}' already exists",
                descriptor.name
            )));
        }

        let timer = OperationTimer::start("local", "create_collection");
        let manifest = Manifest {
            descriptor: CollectionDescriptor {
                provider: Provider::Local,
                ..descriptor.clone()
            },
            index: None,
        };
        tokio::fs::create_dir_all(self.collection_dir(&descriptor.name)).await?;
        self.write_manifest(&manifest).await?;
        self.append_points(&descriptor.name, &[]).await?;
        timer.succeed();

        collections.insert(
            descriptor.name.clone(),
            StoredCollection {
                manifest,
                points: Vec::new(),
            },
        );

        debug!(collection = %descriptor.name, dimension = descriptor.dimension, "Created local collection");
        Ok(descriptor.handle(descriptor.name.clone()))
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionDescriptor> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|c| c.manifest.descriptor.clone())
            .ok_or_else(|| not_found(name))
    }

    async fn list_collections(&self) -> StoreResult<Vec<CollectionSummary>> {
        let collections = self.collections.read().await;
        let mut summaries: Vec<CollectionSummary> = collections
            .values()
            .map(|c| CollectionSummary {
                id: c.manifest.descriptor.name.clone(),
                name: c.manifest.descriptor.name.clone(),
                count: c.points.len() as u64,
            })
            .collect();
        summaries.sort();
        Ok(summaries)
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<bool> {
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_none() {
            return Ok(false);
        }

        match tokio::fs::remove_dir_all(self.collection_dir(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(collection = %name, "Dropped local collection");
        Ok(true)
    }

    async fn insert_batch(
        &self,
        handle: &CollectionHandle,
        batch: InsertBatch,
    ) -> StoreResult<usize> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&handle.name)
            .ok_or_else(|| not_found(&handle.name))?;

        let dimension = collection.manifest.descriptor.dimension;
        if let Some((id, record)) = batch
            .entries()
            .find(|(_, record)| record.vector.len() != dimension)
        {
            return Err(StoreError::Validation(format!(
                "Record {} has {} dimensions, collection expects {}",
                id,
                record.vector.len(),
                dimension
            )));
        }

        let timer = OperationTimer::start("local", "insert_batch");
        let committed = collection.points.len();
        collection.points.extend(batch.entries().map(|(id, record)| StoredPoint {
            id,
            vector: record.vector.clone(),
            fields: schema::record_fields(&batch.document, record),
        }));

        if let Err(e) = self
            .append_points(&handle.name, &collection.points[committed..])
            .await
        {
            collection.points.truncate(committed);
            return Err(e);
        }
        timer.succeed();

        Ok(collection.points.len() - committed)
    }

    async fn build_index(
        &self,
        handle: &CollectionHandle,
        index: &IndexSpec,
        metric: Metric,
    ) -> StoreResult<()> {
        if !index_modes::is_supported(Provider::Local, &index.index_type) {
            return Err(StoreError::Schema(format!(
                "Unsupported index type '{}'",
                index.index_type
            )));
        }

        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(&handle.name)
            .ok_or_else(|| not_found(&handle.name))?;

        let requested = BuiltIndex {
            spec: index.clone(),
            metric,
        };
        match &collection.manifest.index {
            Some(existing) if *existing == requested => return Ok(()),
            Some(existing) => {
                return Err(StoreError::Schema(format!(
                    "Collection '{}' already has a {} index with different parameters",
                    handle.name, existing.spec.index_type
                )));
            }
            None => {}
        }

        let manifest = Manifest {
            descriptor: collection.manifest.descriptor.clone(),
            index: Some(requested),
        };
        self.write_manifest(&manifest).await?;
        collection.manifest = manifest;

        Ok(())
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query_vector: &[f32],
        top_k: usize,
    ) -> StoreResult<Vec<Neighbor>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(&handle.name)
            .ok_or_else(|| not_found(&handle.name))?;

        let dimension = collection.manifest.descriptor.dimension;
        if query_vector.len() != dimension {
            return Err(StoreError::Validation(format!(
                "Query has {} dimensions, collection expects {}",
                query_vector.len(),
                dimension
            )));
        }

        let timer = OperationTimer::start("local", "search");
        let mut scored: Vec<(f32, &StoredPoint)> = collection
            .points
            .iter()
            .map(|point| (cosine_distance(query_vector, &point.vector), point))
            .collect();
        // Stable sort: ties keep insertion order
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(top_k);
        timer.succeed();

        Ok(scored
            .into_iter()
            .map(|(distance, point)| {
                let (content, metadata) = schema::split_content(point.fields.clone());
                Neighbor {
                    id: point.id.to_string(),
                    content,
                    metadata,
                    distance,
                }
            })
            .collect())
    }
}
