//! # askdocs
//!
//! A document Q&A service: ingest text, websites, and PDFs into per-user
//! vector collections, then answer questions grounded in the indexed
//! content.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────┐
//! │   Loaders    │──▶│   Pipeline     │──▶│  Qdrant   │
//! │ text/web/pdf │   │ Chunk + Embed │   │ per user  │
//! └──────────────┘   └───────┬───────┘   └─────┬─────┘
//!                            │                 │
//!                      ┌─────▼─────┐     ┌─────▼─────┐
//!                      │  SQLite   │     │ Retrieval │
//!                      │ metadata  │     │ + Answer  │
//!                      └───────────┘     └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration and model constants |
//! | [`models`] | Core data types |
//! | [`chunk`] | Sliding-window text chunking |
//! | [`loader`] | Text, website, and PDF loaders |
//! | [`embedding`] | OpenAI embedding client with retry |
//! | [`collection`] | Per-user Qdrant collection lifecycle |
//! | [`ingest`] | Ingestion pipeline |
//! | [`search`] | Retrieval and document-scoped filtering |
//! | [`answer`] | Context assembly and answer generation |
//! | [`store`] | Relational metadata store |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod collection;
pub mod config;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
