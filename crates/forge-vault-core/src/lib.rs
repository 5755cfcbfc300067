//! # Forge Vault Core
//!
//! Shared, WASM-safe logic for Forge Vault: note models, front-matter
//! parsing, folder-type detection, chunking, query strategy classification,
//! hybrid ranking, context assembly, and the vector-index and embedding
//! traits.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. The application crate supplies file contents
//! and concrete [`store::VectorIndex`] / [`embedding::Embedder`]
//! implementations.
//!
//! ## Data flow
//!
//! ```text
//! text ──▶ frontmatter ──▶ Document ──▶ chunk ──▶ VectorIndex   (write path)
//! query ──▶ strategy ──▶ VectorIndex ──▶ rank ──▶ context       (read path)
//! ```

pub mod cache;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod folder;
pub mod frontmatter;
pub mod models;
pub mod rank;
pub mod store;
pub mod strategy;

pub use error::RagError;
pub use models::{Chunk, ChunkMeta, Document, Metadata, ScoreBreakdown, ScoredResult};
