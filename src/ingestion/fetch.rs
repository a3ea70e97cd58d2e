//! Fetching the listings feed, with an optional on-disk body cache.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::fs;
use tracing::debug;
use url::Url;

use crate::ingestion::normalize::RawListing;
use crate::types::PipelineError;

/// Filesystem-backed cache for the raw listings body.
///
/// URLs are normalized into deterministic file names so repeated ingestion
/// runs can reuse a previously downloaded feed instead of hitting the
/// network.
#[derive(Clone, Debug)]
pub struct ListingCache {
    root: PathBuf,
}

impl ListingCache {
    /// Creates a cache rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the cache root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Computes the cache file path for a specific URL.
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        let mut components: Vec<String> = url
            .path()
            .trim_start_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(sanitize_component)
            .collect();

        if components.is_empty() {
            components.push("index".to_string());
        }

        let mut file_name = components.join("_");

        if let Some(query) = url.query() {
            file_name.push('_');
            file_name.push_str(&sanitize_component(query));
        }

        file_name.push_str(".json");
        self.root.join(file_name)
    }
}

/// Result of fetching the listings feed.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: Url,
    /// Parsed listing objects, in response order.
    pub listings: Vec<RawListing>,
    /// Size of the raw body in bytes.
    pub bytes: usize,
    pub cache_path: Option<PathBuf>,
    pub from_cache: bool,
}

/// Fetches and parses the listings behind `url`.
///
/// Network failures and non-2xx statuses surface as
/// [`PipelineError::Fetch`]; a body that is not a JSON array of objects
/// surfaces as [`PipelineError::Parse`]. When a cache entry already exists
/// the body is loaded from disk and no network request is performed; the
/// body is only written to the cache after it has parsed successfully.
pub async fn fetch_listings(
    client: &Client,
    url: &Url,
    cache: Option<&ListingCache>,
) -> Result<FetchOutcome, PipelineError> {
    if let Some(cache) = cache {
        let cache_path = cache.cache_path(url);
        if cache_path.exists() {
            let body = fs::read_to_string(&cache_path).await?;
            debug!(path = %cache_path.display(), bytes = body.len(), "listings loaded from cache");
            let listings = parse_listings(&body)?;
            return Ok(FetchOutcome {
                url: url.clone(),
                listings,
                bytes: body.len(),
                cache_path: Some(cache_path),
                from_cache: true,
            });
        }

        let body = fetch_body(client, url).await?;
        let listings = parse_listings(&body)?;
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&cache_path, &body).await?;

        return Ok(FetchOutcome {
            url: url.clone(),
            listings,
            bytes: body.len(),
            cache_path: Some(cache_path),
            from_cache: false,
        });
    }

    let body = fetch_body(client, url).await?;
    let listings = parse_listings(&body)?;
    Ok(FetchOutcome {
        url: url.clone(),
        listings,
        bytes: body.len(),
        cache_path: None,
        from_cache: false,
    })
}

async fn fetch_body(client: &Client, url: &Url) -> Result<String, PipelineError> {
    let response = client.get(url.clone()).send().await?.error_for_status()?;
    Ok(response.text().await?)
}

/// Parses a response body into listing objects.
///
/// The feed contract is a JSON array whose elements are objects; anything
/// else is a [`PipelineError::Parse`].
pub fn parse_listings(body: &str) -> Result<Vec<RawListing>, PipelineError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|err| PipelineError::Parse(err.to_string()))?;

    let serde_json::Value::Array(items) = value else {
        return Err(PipelineError::Parse(
            "expected a JSON array of listings".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(PipelineError::Parse(format!(
                "listing {idx} is not an object (found {})",
                json_kind(&other)
            ))),
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

fn sanitize_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cache_path_sanitizes_segments() {
        let cache = ListingCache::new("tmp");
        let url = Url::parse("https://example.com/services?type=adventure&city=kochi").unwrap();
        let path = cache.cache_path(&url);
        assert!(path.ends_with("services_type_adventure_city_kochi.json"));
    }

    #[test]
    fn parse_rejects_non_array_bodies() {
        let err = parse_listings("{\"city\": \"Kochi\"}").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));

        let err = parse_listings("<pre>not json</pre>").unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }

    #[test]
    fn parse_rejects_non_object_elements() {
        let err = parse_listings("[{\"city\": \"Kochi\"}, 42]").unwrap_err();
        match err {
            PipelineError::Parse(message) => assert!(message.contains("listing 1")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_accepts_an_empty_array() {
        assert!(parse_listings("[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_uses_cache_when_available() {
        let dir = tempdir().unwrap();
        let cache = ListingCache::new(dir.path());
        let url = Url::parse("https://example.com/services").unwrap();
        let cache_path = cache.cache_path(&url);
        tokio::fs::create_dir_all(cache_path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&cache_path, "[{\"city\": \"Kochi\"}]")
            .await
            .unwrap();

        let client = Client::builder().use_rustls_tls().build().unwrap();
        let outcome = fetch_listings(&client, &url, Some(&cache)).await.unwrap();
        assert!(outcome.from_cache);
        assert_eq!(outcome.listings.len(), 1);
    }
}
