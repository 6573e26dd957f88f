//! End-to-end indexing and search against the embedded store.

use std::sync::Arc;

use async_trait::async_trait;
use domain_vector_store::{
    EmbeddingPayload, LocalStore, Provider, ProviderAdapter, ProviderRegistry, QueryEmbedder,
    SearchQuery, StoreError, StoreResult, VectorStoreService,
};
use tempfile::TempDir;
use test_utils::PayloadBuilder;
use test_utils::assertions::{assert_legal_name, assert_non_increasing, assert_scores_within};

/// Returns the same vector for every query
struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl QueryEmbedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> StoreResult<Vec<f32>> {
        Ok(self.0.clone())
    }
}

fn local_service(dir: &TempDir) -> VectorStoreService {
    let store = LocalStore::open(dir.path().join("local_db")).unwrap();
    VectorStoreService::new(
        ProviderRegistry::new().with_shared(Arc::new(store) as Arc<dyn ProviderAdapter>),
    )
}

fn payload(builder: &PayloadBuilder) -> EmbeddingPayload {
    EmbeddingPayload::from_value(builder.build()).unwrap()
}

fn query(collection: &str, text: &str) -> SearchQuery {
    SearchQuery::new(text, collection, Provider::Local).with_word_count_threshold(0)
}

#[tokio::test]
async fn test_manual_scenario_returns_first_and_third_records() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("manual")
        .filename("manual.pdf")
        .record(&[1.0, 0.0, 0.0], "first record")
        .record(&[0.0, 1.0, 0.0], "second record")
        .record(&[0.9, 0.1, 0.0], "third record");

    let indexed = service
        .index_payload(payload(&builder), Provider::Local, "flat")
        .await
        .unwrap();
    assert_eq!(indexed.index_size, 3);
    assert!(indexed.collection_name.starts_with("manual_openai_"));

    let outcome = service
        .search(
            &query(&indexed.collection_name, "anything")
                .with_top_k(2)
                .with_score_threshold(0.5),
            &FixedEmbedder(vec![1.0, 0.0, 0.0]),
        )
        .await
        .unwrap();

    let contents: Vec<_> = outcome.results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["first record", "third record"]);
    assert!(outcome.saved_filepath.is_none());
}

#[tokio::test]
async fn test_exact_vector_retrieves_its_record() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("self_retrieval")
        .filename("handbook.pdf")
        .dimension(16)
        .random_records(25);
    let indexed = service
        .index_payload(payload(&builder), Provider::Local, "hnsw")
        .await
        .unwrap();

    for index in [0, 12, 24] {
        let vector = builder.vector(index).unwrap().to_vec();
        let outcome = service
            .search(
                &query(&indexed.collection_name, "lookup")
                    .with_top_k(1)
                    .with_score_threshold(0.0),
                &FixedEmbedder(vector),
            )
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(
            outcome.results[0].content,
            format!("passage {} of the test document", index)
        );
    }
}

#[tokio::test]
async fn test_scores_are_ranked_and_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("ranking")
        .filename("ranking.pdf")
        .dimension(8)
        .random_records(40);
    let indexed = service
        .index_payload(payload(&builder), Provider::Local, "flat")
        .await
        .unwrap();

    let threshold = 0.2;
    let outcome = service
        .search(
            &query(&indexed.collection_name, "ranked")
                .with_top_k(10)
                .with_score_threshold(threshold)
                .with_word_count_threshold(6),
            &FixedEmbedder(builder.vector(3).unwrap().to_vec()),
        )
        .await
        .unwrap();

    let scores: Vec<f32> = outcome.results.iter().map(|r| r.score).collect();
    assert!(!scores.is_empty());
    assert!(scores.len() <= 10);
    assert_non_increasing(&scores, "ranking");
    assert_scores_within(&scores, threshold, "ranking");
    for result in &outcome.results {
        assert!(result.content.split_whitespace().count() >= 6);
    }
}

#[tokio::test]
async fn test_101_records_are_all_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("batches")
        .filename("batches.pdf")
        .dimension(4)
        .random_records(101);
    let indexed = service
        .index_payload(payload(&builder), Provider::Local, "flat")
        .await
        .unwrap();

    assert_eq!(indexed.index_size, 101);
    assert_eq!(indexed.total_vectors, 101);

    let collections = service.list_collections(Provider::Local).await;
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].count, 101);
}

#[tokio::test]
async fn test_list_collections_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    for name in ["alpha.pdf", "beta.docx"] {
        let builder = PayloadBuilder::from_test_name(name)
            .filename(name)
            .dimension(4)
            .random_records(3);
        service
            .index_payload(payload(&builder), Provider::Local, "flat")
            .await
            .unwrap();
    }

    let first = service.list_collections(Provider::Local).await;
    let second = service.list_collections(Provider::Local).await;
    assert_eq!(first.len(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_collections_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();

    let builder = PayloadBuilder::from_test_name("reopen")
        .filename("reopen.pdf")
        .dimension(4)
        .random_records(5);
    let indexed = local_service(&dir)
        .index_payload(payload(&builder), Provider::Local, "ivf_flat")
        .await
        .unwrap();

    let reopened = local_service(&dir);
    let descriptor = reopened
        .describe_collection(Provider::Local, &indexed.collection_name)
        .await
        .unwrap();
    assert_eq!(descriptor.dimension, 4);
    assert_eq!(descriptor.index_type, "IVF_FLAT");

    assert!(
        reopened
            .drop_collection(Provider::Local, &indexed.collection_name)
            .await
            .unwrap()
    );
    assert!(reopened.list_collections(Provider::Local).await.is_empty());
}

#[tokio::test]
async fn test_non_ascii_filename_indexes_under_legal_name() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("non_ascii")
        .filename("黑神话.pdf")
        .record(&[0.3, 0.4, 0.5], "only record");
    let indexed = service
        .index_payload(payload(&builder), Provider::Local, "flat")
        .await
        .unwrap();

    assert_legal_name(&indexed.collection_name);
    assert!(indexed.collection_name.starts_with("doc_openai_"));
}

#[tokio::test]
async fn test_index_file_reads_export_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let path = PayloadBuilder::from_test_name("from_disk")
        .filename("guide.pdf")
        .dimension(6)
        .random_records(7)
        .write_to(dir.path());

    let indexed = service
        .index_file(&path, Provider::Local, "flat")
        .await
        .unwrap();
    assert_eq!(indexed.index_size, 7);
}

#[tokio::test]
async fn test_search_unknown_collection_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let result = service
        .search(
            &query("missing_openai_20240501123045", "anything"),
            &FixedEmbedder(vec![1.0, 0.0, 0.0]),
        )
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_unregistered_provider_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = local_service(&dir);

    let builder = PayloadBuilder::from_test_name("unregistered")
        .record(&[1.0, 0.0], "text");
    let result = service
        .index_payload(payload(&builder), Provider::Milvus, "flat")
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}
