//! Catalog loading and hot reload.
//!
//! The catalog is a JSON document: either a bare list of products or an
//! object with a `products` array. The local file named by `catalog.path`
//! must parse at startup. When `catalog.remote_url` is set, the remote copy
//! is preferred; any remote failure falls back to the local file.
//!
//! Searches run against an `Arc<CatalogIndex>` snapshot. [`CatalogStore::reload`]
//! builds a fresh index and swaps the pointer, so in-flight searches finish
//! on the snapshot they started with.

use anyhow::{bail, Context, Result};
use catalog_assistant_core::index::CatalogIndex;
use catalog_assistant_core::models::Product;
use catalog_assistant_core::search::MatchEngine;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::config::CatalogConfig;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    List(Vec<Product>),
    Wrapped { products: Vec<Product> },
}

/// Parse a catalog document.
pub fn parse_catalog(json: &str) -> Result<Vec<Product>> {
    let doc: CatalogDocument =
        serde_json::from_str(json).with_context(|| "Failed to parse catalog JSON")?;
    Ok(match doc {
        CatalogDocument::List(products) => products,
        CatalogDocument::Wrapped { products } => products,
    })
}

pub fn read_catalog_file(path: &Path) -> Result<Vec<Product>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    parse_catalog(&content).with_context(|| format!("Invalid catalog file: {}", path.display()))
}

async fn fetch_remote(client: &reqwest::Client, url: &str) -> Result<Vec<Product>> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("remote catalog returned {}", status);
    }
    let body = response.text().await?;
    let products = parse_catalog(&body)?;
    if products.is_empty() {
        bail!("remote catalog is empty");
    }
    Ok(products)
}

/// Holds the current catalog snapshot.
pub struct CatalogStore {
    config: CatalogConfig,
    engine: Arc<MatchEngine>,
    client: reqwest::Client,
    current: RwLock<Arc<CatalogIndex>>,
}

impl CatalogStore {
    /// Load the catalog for startup. Fails only when the local file is
    /// missing or unparseable.
    pub async fn load(config: &CatalogConfig, engine: Arc<MatchEngine>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.remote_timeout_secs))
            .build()?;
        let products = load_products(config, &client).await?;
        let index = engine.index(products);
        tracing::info!(products = index.len(), "catalog loaded");

        Ok(Self {
            config: config.clone(),
            engine,
            client,
            current: RwLock::new(Arc::new(index)),
        })
    }

    /// A store over a fixed product list. `reload` re-reads `config.path`.
    pub fn from_products(
        products: Vec<Product>,
        config: CatalogConfig,
        engine: Arc<MatchEngine>,
    ) -> Self {
        let index = engine.index(products);
        Self {
            config,
            engine,
            client: reqwest::Client::new(),
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<CatalogIndex> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn engine(&self) -> &Arc<MatchEngine> {
        &self.engine
    }

    pub fn base_url(&self) -> Option<&str> {
        self.config.base_url.as_deref()
    }

    /// Rebuild the index from the configured sources and swap it in.
    /// On error the previous snapshot stays active.
    pub async fn reload(&self) -> Result<usize> {
        let products = load_products(&self.config, &self.client).await?;
        let index = Arc::new(self.engine.index(products));
        let count = index.len();
        match self.current.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }
        tracing::info!(products = count, "catalog reloaded");
        Ok(count)
    }
}

async fn load_products(config: &CatalogConfig, client: &reqwest::Client) -> Result<Vec<Product>> {
    let local = read_catalog_file(&config.path)?;

    let Some(url) = config.remote_url.as_deref() else {
        return Ok(local);
    };

    match fetch_remote(client, url).await {
        Ok(remote) => {
            tracing::debug!(url, products = remote.len(), "using remote catalog");
            Ok(remote)
        }
        Err(e) => {
            tracing::warn!(
                url,
                error = %e,
                fallback = local.len(),
                "remote catalog unavailable, using local file"
            );
            Ok(local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_assistant_core::search::SearchParams;
    use catalog_assistant_core::vocabulary::Vocabulary;

    fn engine() -> Arc<MatchEngine> {
        Arc::new(MatchEngine::new(
            &Vocabulary {
                version: 1,
                ..Default::default()
            },
            SearchParams::default(),
        ))
    }

    #[test]
    fn test_parse_list_and_wrapped() {
        let list = parse_catalog(r#"[{"name": "Graphene Oxide"}]"#).unwrap();
        assert_eq!(list[0].name, "Graphene Oxide");

        let wrapped = parse_catalog(
            r#"{"lastUpdated": "2024-01-01", "products": [{"name": "A"}, {"name": "B", "price": 120}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].price.as_deref(), Some("120"));

        assert!(parse_catalog("{\"items\": []}").is_err());
        assert!(parse_catalog("not json").is_err());
    }

    #[tokio::test]
    async fn test_load_requires_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = CatalogConfig {
            path: dir.path().join("missing.json"),
            ..Default::default()
        };
        assert!(CatalogStore::load(&config, engine()).await.is_err());

        std::fs::write(&config.path, "{ broken").unwrap();
        assert!(CatalogStore::load(&config, engine()).await.is_err());
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, r#"[{"name": "Nano Silver Powder"}]"#).unwrap();

        let config = CatalogConfig {
            path,
            remote_url: Some("http://127.0.0.1:9/products.json".into()),
            remote_timeout_secs: 2,
            ..Default::default()
        };
        let store = CatalogStore::load(&config, engine()).await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("products.json");
        std::fs::write(&path, r#"[{"name": "A"}]"#).unwrap();
        let config = CatalogConfig {
            path: path.clone(),
            ..Default::default()
        };
        let store = CatalogStore::load(&config, engine()).await.unwrap();
        let before = store.snapshot();

        std::fs::write(&path, r#"{"products": [{"name": "A"}, {"name": "B"}]}"#).unwrap();
        assert_eq!(store.reload().await.unwrap(), 2);
        assert_eq!(before.len(), 1);
        assert_eq!(store.len(), 2);

        std::fs::write(&path, "garbage").unwrap();
        assert!(store.reload().await.is_err());
        assert_eq!(store.len(), 2);
    }
}
