//! Builds the listing index from the configured feed, then runs a smoke
//! query against the fresh artifact.

use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;
use tripsmith::config::PipelineConfig;
use tripsmith::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
use tripsmith::pipeline::IngestionPipeline;
use tripsmith::query::Retriever;
use tripsmith::types::PipelineError;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();

    let config = PipelineConfig::from_env()?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::default());

    println!("→ Ingesting {}", config.source_url);
    let pipeline = IngestionPipeline::new(config.clone(), Arc::clone(&provider))?;
    let (index, report) = pipeline.run().await?;

    println!("\n✅ Index build complete!");
    println!("  listings fetched : {}", report.listings);
    println!("  documents        : {}", report.documents);
    println!("  chunks indexed   : {}", report.chunks);
    println!("  from cache       : {}", report.from_cache);
    println!("  duration         : {:.2}s", report.duration.as_secs_f64());
    println!("  index artifact   : {}", config.index_path.display());

    if report.chunks > 0 {
        let query = std::env::var("TRIPSMITH_SMOKE_QUERY")
            .unwrap_or_else(|_| "Where is Kochi Adventure Co.?".to_string());
        println!("\nSmoke query: {query}");

        let retriever = Retriever::new(provider, Arc::new(index));
        let hits = retriever.search(&query, 2).await?;
        for (rank, hit) in hits.iter().enumerate() {
            println!(
                "  {}. [{:.4}] {}",
                rank + 1,
                hit.score,
                hit.content
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
