//! `assistant enrich`: fill in the descriptive corpus of a catalog.
//!
//! Each product name is sent to the configured [`TextExtractor`] with
//! [`ENRICHMENT_INSTRUCTION`]. The output is decoded strictly with
//! [`decode_enrichment`] and merged into the product. A failed call or an
//! undecodable answer leaves the product unchanged and records its name.
//!
//! Progress is checkpointed to a JSON file every few products. A rerun over
//! a catalog of the same size resumes after the last checkpoint. The file
//! is removed once the enriched catalog has been written.

use anyhow::{bail, Context, Result};
use catalog_assistant_core::enrichment::{decode_enrichment, Enrichment};
use catalog_assistant_core::models::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::read_catalog_file;
use crate::config::Config;
use crate::llm::create_text_extractor;
use crate::traits::TextExtractor;

pub const ENRICHMENT_INSTRUCTION: &str = "You are a product data specialist for a nanomaterials and chemicals store. \
Given a product name, describe the product for a search index. \
Respond ONLY with a JSON object with these keys: \
\"category\" (string), \"subcategory\" (string), \
\"applications\" (list of short phrases), \"benefits\" (list), \
\"project_types\" (list), \"technical_notes\" (string), \
\"search_keywords\" (list, include Turkish and English synonyms). \
Do not invent prices or stock information.";

pub const DEFAULT_CHECKPOINT_EVERY: usize = 10;
pub const DEFAULT_DELAY_MS: u64 = 400;

const DEFAULT_OUTPUT_FILE: &str = "products_enriched.json";
const DEFAULT_PROGRESS_FILE: &str = "enrichment_progress.json";

/// Checkpoint written while enrichment runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichProgress {
    /// Catalog size when the run started.
    pub total: usize,
    pub processed: usize,
    pub last_update: DateTime<Utc>,
    /// Names of products left unchanged.
    #[serde(default)]
    pub failed: Vec<String>,
    /// The first `processed` products, already merged.
    pub products: Vec<Product>,
}

impl EnrichProgress {
    fn start(total: usize) -> Self {
        Self {
            total,
            processed: 0,
            last_update: Utc::now(),
            failed: Vec::new(),
            products: Vec::with_capacity(total),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichReport {
    pub total: usize,
    /// Products enriched during this run.
    pub enriched: usize,
    /// Products skipped because a checkpoint already covered them.
    pub resumed_from: usize,
    pub failed: Vec<String>,
}

pub struct Enricher {
    extractor: Arc<dyn TextExtractor>,
    progress_path: PathBuf,
    checkpoint_every: usize,
    delay: Duration,
}

impl Enricher {
    pub fn new(extractor: Arc<dyn TextExtractor>, progress_path: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            progress_path: progress_path.into(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }

    /// Pause between collaborator calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every.max(1);
        self
    }

    /// Enrich `catalog` in order, resuming from the progress file when it
    /// matches the catalog size.
    pub async fn enrich(&self, catalog: Vec<Product>) -> Result<(Vec<Product>, EnrichReport)> {
        let total = catalog.len();
        let mut progress = self
            .resume(total)
            .unwrap_or_else(|| EnrichProgress::start(total));
        let resumed_from = progress.processed;
        if resumed_from > 0 {
            tracing::info!(resumed_from, total, "resuming enrichment");
        }

        let mut enriched = 0;
        for (i, mut product) in catalog.into_iter().enumerate().skip(resumed_from) {
            if i > resumed_from && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.enrich_one(&product).await {
                Ok(enrichment) => {
                    enrichment.apply_to(&mut product);
                    enriched += 1;
                }
                Err(e) => {
                    tracing::warn!(product = %product.name, error = %e, "enrichment failed, product kept unchanged");
                    progress.failed.push(product.name.clone());
                }
            }
            progress.products.push(product);
            progress.processed += 1;

            if progress.processed % self.checkpoint_every == 0 {
                self.save(&mut progress)?;
                eprintln!("enrich  {} / {} products", progress.processed, total);
            }
        }
        self.save(&mut progress)?;

        let report = EnrichReport {
            total,
            enriched,
            resumed_from,
            failed: progress.failed,
        };
        Ok((progress.products, report))
    }

    async fn enrich_one(&self, product: &Product) -> Result<Enrichment> {
        let raw = self
            .extractor
            .extract(ENRICHMENT_INSTRUCTION, &product.name)
            .await?;
        Ok(decode_enrichment(&raw)?)
    }

    fn resume(&self, total: usize) -> Option<EnrichProgress> {
        let content = std::fs::read_to_string(&self.progress_path).ok()?;
        let progress: EnrichProgress = match serde_json::from_str(&content) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %self.progress_path.display(), error = %e, "ignoring unreadable progress file");
                return None;
            }
        };
        if progress.total != total
            || progress.processed != progress.products.len()
            || progress.processed > total
        {
            tracing::warn!(
                path = %self.progress_path.display(),
                "progress file does not match this catalog, starting over"
            );
            return None;
        }
        Some(progress)
    }

    fn save(&self, progress: &mut EnrichProgress) -> Result<()> {
        progress.last_update = Utc::now();
        let json = serde_json::to_string_pretty(progress)?;
        std::fs::write(&self.progress_path, json).with_context(|| {
            format!(
                "Failed to write progress file: {}",
                self.progress_path.display()
            )
        })
    }
}

/// Product counts per category. Products without one count as `(none)`.
pub fn category_counts(products: &[Product]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for product in products {
        let category = product
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("(none)");
        *counts.entry(category.to_string()).or_insert(0) += 1;
    }
    counts
}

fn sibling(catalog_path: &Path, file_name: &str) -> PathBuf {
    catalog_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(file_name)
}

pub async fn run_enrich(
    config: &Config,
    output: Option<PathBuf>,
    progress: Option<PathBuf>,
    delay_ms: u64,
) -> Result<()> {
    if !config.llm.is_enabled() {
        bail!("Catalog enrichment needs an LLM provider. Set [llm].provider in the config.");
    }

    let catalog = read_catalog_file(&config.catalog.path)?;
    let output = output.unwrap_or_else(|| sibling(&config.catalog.path, DEFAULT_OUTPUT_FILE));
    let progress =
        progress.unwrap_or_else(|| sibling(&config.catalog.path, DEFAULT_PROGRESS_FILE));

    let gate = config.matching.phone_gate()?;
    let extractor = create_text_extractor(&config.llm, &gate)?;
    let name = extractor.name().to_string();
    let enricher = Enricher::new(extractor, &progress).with_delay(Duration::from_millis(delay_ms));

    println!("enriching {} products with {}", catalog.len(), name);
    let (products, report) = enricher.enrich(catalog).await?;

    let json = serde_json::to_string_pretty(&products)?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write enriched catalog: {}", output.display()))?;
    if let Err(e) = std::fs::remove_file(&progress) {
        tracing::warn!(path = %progress.display(), error = %e, "could not remove progress file");
    }

    println!("wrote {}", output.display());
    println!(
        "    enriched: {} / {}",
        report.total - report.failed.len(),
        report.total
    );
    if report.resumed_from > 0 {
        println!("    resumed after: {}", report.resumed_from);
    }
    if !report.failed.is_empty() {
        println!("    unchanged: {}", report.failed.len());
        for name in &report.failed {
            println!("        {}", name);
        }
    }
    println!("categories:");
    for (category, count) in category_counts(&products) {
        println!("    {}: {}", category, count);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SILVER: &str = r#"{"category": "Metal Nanoparticles", "applications": ["conductive ink"], "search_keywords": ["gümüş", "silver"]}"#;
    const ZINC: &str = r#"Here you go: {"category": "Metal Oxides", "applications": "uv protection, sunscreen"}"#;

    /// Answers by product name. Unknown names are a transport error.
    struct ByName {
        outputs: HashMap<String, String>,
        calls: AtomicUsize,
        watch: Option<PathBuf>,
        seen: Mutex<Vec<Option<usize>>>,
    }

    impl ByName {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self {
                outputs: pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: AtomicUsize::new(0),
                watch: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        /// Record the checkpointed `processed` count at every call.
        fn watching(mut self, path: &Path) -> Self {
            self.watch = Some(path.to_path_buf());
            self
        }
    }

    #[async_trait]
    impl TextExtractor for ByName {
        fn name(&self) -> &str {
            "by-name"
        }

        async fn extract(&self, instruction: &str, text: &str) -> Result<String> {
            assert_eq!(instruction, ENRICHMENT_INSTRUCTION);
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(path) = &self.watch {
                let processed = std::fs::read_to_string(path)
                    .ok()
                    .and_then(|s| serde_json::from_str::<EnrichProgress>(&s).ok())
                    .map(|p| p.processed);
                self.seen.lock().unwrap().push(processed);
            }
            match self.outputs.get(text) {
                Some(out) => Ok(out.clone()),
                None => bail!("upstream timeout"),
            }
        }
    }

    fn catalog() -> Vec<Product> {
        let mut graphene = Product::named("Graphene Oxide");
        graphene.technical_notes = Some("Single layer dispersion".into());
        vec![
            Product::named("Nano Silver Powder"),
            graphene,
            Product::named("Zinc Oxide Nanopowder"),
        ]
    }

    fn enricher(extractor: Arc<ByName>, progress: &Path) -> Enricher {
        Enricher::new(extractor, progress).with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_enrich_merges_and_keeps_failures_unchanged() {
        let tmp = TempDir::new().unwrap();
        let progress = tmp.path().join("progress.json");
        let mock = Arc::new(ByName::new(&[
            ("Nano Silver Powder", SILVER),
            ("Graphene Oxide", "I don't know this product."),
            ("Zinc Oxide Nanopowder", ZINC),
        ]));

        let (products, report) = enricher(mock.clone(), &progress)
            .enrich(catalog())
            .await
            .unwrap();

        assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
        assert_eq!(products.len(), 3);
        assert_eq!(products[0].category.as_deref(), Some("Metal Nanoparticles"));
        assert_eq!(products[0].search_keywords, vec!["gümüş", "silver"]);
        assert_eq!(products[1], catalog()[1]);
        assert_eq!(products[2].applications, vec!["uv protection", "sunscreen"]);
        assert_eq!(report.enriched, 2);
        assert_eq!(report.resumed_from, 0);
        assert_eq!(report.failed, vec!["Graphene Oxide"]);
    }

    #[tokio::test]
    async fn test_transport_error_keeps_product() {
        let tmp = TempDir::new().unwrap();
        let mock = Arc::new(ByName::new(&[("Nano Silver Powder", SILVER)]));

        let (products, report) = enricher(mock, &tmp.path().join("p.json"))
            .enrich(catalog())
            .await
            .unwrap();

        assert_eq!(products[2], Product::named("Zinc Oxide Nanopowder"));
        assert_eq!(report.failed, vec!["Graphene Oxide", "Zinc Oxide Nanopowder"]);
    }

    #[tokio::test]
    async fn test_progress_checkpointed_during_run() {
        let tmp = TempDir::new().unwrap();
        let progress = tmp.path().join("progress.json");
        let mock = Arc::new(
            ByName::new(&[("Nano Silver Powder", SILVER), ("Zinc Oxide Nanopowder", ZINC)])
                .watching(&progress),
        );

        enricher(mock.clone(), &progress)
            .with_checkpoint_every(2)
            .enrich(catalog())
            .await
            .unwrap();

        assert_eq!(*mock.seen.lock().unwrap(), vec![None, None, Some(2)]);

        let saved: EnrichProgress =
            serde_json::from_str(&std::fs::read_to_string(&progress).unwrap()).unwrap();
        assert_eq!(saved.total, 3);
        assert_eq!(saved.processed, 3);
        assert_eq!(saved.products.len(), 3);
        assert_eq!(saved.failed, vec!["Graphene Oxide"]);
    }

    #[tokio::test]
    async fn test_resume_skips_checkpointed_products() {
        let tmp = TempDir::new().unwrap();
        let progress = tmp.path().join("progress.json");
        let mut done = Product::named("Nano Silver Powder");
        done.category = Some("From checkpoint".into());
        let checkpoint = EnrichProgress {
            total: 3,
            processed: 2,
            last_update: Utc::now(),
            failed: vec!["Graphene Oxide".into()],
            products: vec![done.clone(), catalog()[1].clone()],
        };
        std::fs::write(&progress, serde_json::to_string(&checkpoint).unwrap()).unwrap();

        let mock = Arc::new(ByName::new(&[("Zinc Oxide Nanopowder", ZINC)]));
        let (products, report) = enricher(mock.clone(), &progress)
            .enrich(catalog())
            .await
            .unwrap();

        assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
        assert_eq!(products[0], done);
        assert_eq!(products[2].category.as_deref(), Some("Metal Oxides"));
        assert_eq!(report.resumed_from, 2);
        assert_eq!(report.enriched, 1);
        assert_eq!(report.failed, vec!["Graphene Oxide"]);
    }

    #[tokio::test]
    async fn test_mismatched_progress_starts_over() {
        let tmp = TempDir::new().unwrap();
        let progress = tmp.path().join("progress.json");
        let stale = EnrichProgress {
            total: 40,
            processed: 1,
            last_update: Utc::now(),
            failed: Vec::new(),
            products: vec![Product::named("Old Product")],
        };
        std::fs::write(&progress, serde_json::to_string(&stale).unwrap()).unwrap();

        let mock = Arc::new(ByName::new(&[("Nano Silver Powder", SILVER)]));
        let (products, _) = enricher(mock.clone(), &progress)
            .enrich(catalog())
            .await
            .unwrap();

        assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
        assert_eq!(products[0].name, "Nano Silver Powder");
    }

    #[test]
    fn test_category_counts() {
        let mut a = Product::named("A");
        a.category = Some("Metals".into());
        let mut b = Product::named("B");
        b.category = Some(" ".into());
        let counts = category_counts(&[a.clone(), a, b, Product::named("C")]);
        assert_eq!(counts.get("Metals"), Some(&2));
        assert_eq!(counts.get("(none)"), Some(&2));
    }
}
