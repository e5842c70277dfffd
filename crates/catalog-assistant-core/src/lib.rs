//! # Catalog Assistant Core
//!
//! Pure logic for Catalog Assistant: product models, matching vocabulary,
//! query normalization, the multi-strategy match engine, lead detection
//! and strict extraction decoding, catalog enrichment records, session
//! state, and reply link annotation.
//!
//! This crate contains no tokio, HTTP, filesystem I/O, or other runtime
//! dependencies. Everything that talks to the outside world lives in the
//! `catalog-assistant` app crate.

pub mod enrichment;
pub mod index;
pub mod lead;
pub mod links;
pub mod models;
pub mod normalize;
pub mod search;
pub mod session;
pub mod vocabulary;
