//! Queries a previously built listing index.
//!
//! ```bash
//! tripsmith-search "river rafting near Kochi"
//! TRIPSMITH_TOP_K=5 TRIPSMITH_CITY=Kochi tripsmith-search "rafting"
//! ```

use std::sync::Arc;

use tracing_subscriber::FmtSubscriber;
use tripsmith::config::PipelineConfig;
use tripsmith::embeddings::{EmbeddingProvider, HashEmbeddingProvider};
use tripsmith::query::Retriever;
use tripsmith::types::PipelineError;

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    init_tracing();

    let query: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        return Err(PipelineError::InvalidArgument(
            "usage: tripsmith-search <query text>".to_string(),
        ));
    }

    let top_k = match std::env::var("TRIPSMITH_TOP_K") {
        Ok(raw) => raw
            .parse::<usize>()
            .map_err(|err| PipelineError::InvalidArgument(format!("TRIPSMITH_TOP_K: {err}")))?,
        Err(_) => 3,
    };
    let city = std::env::var("TRIPSMITH_CITY").ok();

    let config = PipelineConfig::from_env()?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::default());
    let retriever = Retriever::open(&config.index_path, provider).await?;

    let hits = match city.as_deref() {
        Some(city) => retriever.search_in_city(&query, top_k, city).await?,
        None => retriever.search(&query, top_k).await?,
    };

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!("Result {} (score {:.4})", rank + 1, hit.score);
        println!("  {}", hit.content);
        if !hit.city.is_empty() {
            println!("  city: {}", hit.city);
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
