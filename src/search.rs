//! `assistant search`: run the match engine from the command line.
//!
//! Prints each match with its score and the strategy that produced it,
//! plus the normalized query, which makes vocabulary tuning practical.

use anyhow::Result;
use catalog_assistant_core::links::product_link;
use catalog_assistant_core::search::MatchEngine;
use std::sync::Arc;

use crate::catalog::CatalogStore;
use crate::config::{load_vocabulary, Config};

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let vocabulary = load_vocabulary(&config.matching)?;
    let mut params = config.matching.search_params();
    if let Some(limit) = limit.filter(|l| *l > 0) {
        params.max_results = limit;
    }
    let engine = Arc::new(MatchEngine::new(&vocabulary, params));
    let catalog = CatalogStore::load(&config.catalog, engine.clone()).await?;

    let analyzed = engine.normalizer().analyze(query);
    println!("normalized: \"{}\"", analyzed.text());
    if !analyzed.additions.is_empty() {
        println!("dictionary: {}", analyzed.additions.join(", "));
    }
    println!();

    let results = engine.search(query, &catalog.snapshot());
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, m) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            m.score,
            m.product.name,
            serde_json::to_value(m.strategy)?
                .as_str()
                .unwrap_or_default()
        );
        if let Some(category) = &m.product.category {
            println!("    category: {}", category);
        }
        if let Some(link) = product_link(&m.product, catalog.base_url()) {
            println!("    link: {}", link);
        }
        println!();
    }

    Ok(())
}
