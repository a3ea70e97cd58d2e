//! End-to-end pipeline tests against a mock listings endpoint.
//!
//! The embedding provider is the deterministic hash provider, so results are
//! stable across runs and no network or model weights are involved.

use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use url::Url;

use tripsmith::config::PipelineConfig;
use tripsmith::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
use tripsmith::pipeline::IngestionPipeline;
use tripsmith::query::Retriever;
use tripsmith::types::PipelineError;

const KOCHI_TEXT: &str =
    "Kochi Adventure Co. offers rafting services in Kochi. Visit: http://example.com";

fn kochi_listing() -> serde_json::Value {
    json!({
        "city": "Kochi",
        "providerName": "Kochi Adventure Co.",
        "serviceType": "rafting",
        "contactInfo": "http://example.com",
    })
}

fn test_config(server: &MockServer, dir: &TempDir) -> PipelineConfig {
    PipelineConfig::default()
        .with_source_url(Url::parse(&server.url("/services")).unwrap())
        .with_index_path(dir.path().join("listing_index.sqlite"))
}

fn provider() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashEmbeddingProvider::new(32))
}

#[tokio::test]
async fn single_listing_is_ingested_and_found() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([kochi_listing()]));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);
    let provider = provider();

    let pipeline = IngestionPipeline::new(config.clone(), Arc::clone(&provider)).unwrap();
    let (index, report) = pipeline.run().await.unwrap();

    mock.assert_async().await;
    assert_eq!(report.listings, 1);
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 1);
    assert!(config.index_path.exists());

    let retriever = Retriever::new(provider, Arc::new(index));
    let hits = retriever
        .search("Where is Kochi Adventure Co.?", 1)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, KOCHI_TEXT);
    assert_eq!(hits[0].city, "Kochi");
}

#[tokio::test]
async fn server_error_aborts_without_creating_an_artifact() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(500);
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    let pipeline = IngestionPipeline::new(config.clone(), provider()).unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(_)));
    assert!(!config.index_path.exists(), "no partial index on failure");
}

#[tokio::test]
async fn non_json_body_is_a_parse_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200).body("<pre>service dump</pre>");
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    let pipeline = IngestionPipeline::new(config.clone(), provider()).unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
    assert!(!config.index_path.exists());
}

#[tokio::test]
async fn json_object_body_is_a_parse_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"services": []}));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    let pipeline = IngestionPipeline::new(config.clone(), provider()).unwrap();
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
}

#[tokio::test]
async fn persisted_index_round_trips_through_open() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([
                    kochi_listing(),
                    {
                        "city": "Munnar",
                        "providerName": "Tea Trails",
                        "serviceType": "trekking",
                        "contactInfo": "https://teatrails.example",
                    },
                    {
                        "city": "Alleppey",
                        "providerName": "Backwater Cruises",
                        "serviceType": "houseboat",
                        "contactInfo": "https://backwater.example",
                    },
                ]));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);
    let provider = provider();

    let pipeline = IngestionPipeline::new(config.clone(), Arc::clone(&provider)).unwrap();
    let (index, report) = pipeline.run().await.unwrap();
    assert_eq!(report.chunks, 3);

    let query = "Where is Kochi Adventure Co.?";
    let fresh = Retriever::new(Arc::clone(&provider), Arc::new(index));
    let before = fresh.search(query, 3).await.unwrap();
    drop(fresh);

    let reloaded = Retriever::open(&config.index_path, Arc::clone(&provider))
        .await
        .unwrap();
    let after = reloaded.search(query, 3).await.unwrap();

    assert_eq!(before.len(), after.len());
    for (lhs, rhs) in before.iter().zip(after.iter()) {
        assert_eq!(lhs.content, rhs.content);
        assert!((lhs.score - rhs.score).abs() < 1e-6);
    }
}

#[tokio::test]
async fn k_beyond_index_size_is_capped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([kochi_listing()]));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);
    let provider = provider();

    let pipeline = IngestionPipeline::new(config, Arc::clone(&provider)).unwrap();
    let (index, _) = pipeline.run().await.unwrap();

    let retriever = Retriever::new(provider, Arc::new(index));
    let hits = retriever.search("anything at all", 50).await.unwrap();
    assert_eq!(hits.len(), 1);

    let err = retriever.search("anything at all", 0).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidArgument(_)));
}

#[tokio::test]
async fn opening_a_missing_index_fails_cleanly() {
    let dir = TempDir::new().unwrap();
    let err = Retriever::open(dir.path().join("nope.sqlite"), provider())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::IndexNotFound(_)));
}

#[tokio::test]
async fn cached_feed_skips_the_network_on_the_second_run() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/services");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([kochi_listing()]));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir).with_cache_dir(dir.path().join("cache"));
    let provider = provider();

    let pipeline = IngestionPipeline::new(config, Arc::clone(&provider)).unwrap();
    let (_, first) = pipeline.run().await.unwrap();
    assert!(!first.from_cache);

    let (_, second) = pipeline.run().await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.chunks, first.chunks);

    mock.assert_hits_async(1).await;
}
