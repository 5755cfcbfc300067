//! # Forge Vault
//!
//! Local retrieval and ranking over a folder of markdown notes.
//!
//! Forge Vault walks a vault, splits each note into heading- and
//! checklist-aware chunks, embeds them, and answers queries with a hybrid
//! ranker that blends vector similarity with filename, folder, recency,
//! front-matter and task signals. The pure logic lives in
//! [`forge_vault_core`]; this crate owns configuration, the SQLite index,
//! embedding providers, the incremental indexer and the `forge` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌───────────────┐   ┌──────────────┐
//! │  Vault  │──▶│    Indexer    │──▶│ SQLite index │
//! │  *.md   │   │ chunk + embed │   │   vectors    │
//! └─────────┘   └───────────────┘   └──────┬───────┘
//!                                          │
//!                              ┌───────────▼──────────┐
//!                              │ Hybrid ranker + mix  │
//!                              │  context assembly    │
//!                              └───────────┬──────────┘
//!                                          ▼
//!                                   ┌────────────┐
//!                                   │ CLI (forge)│
//!                                   └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Vault walk and front-matter parsing |
//! | [`indexer`] | Incremental reindex with writer lock and cancellation |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | SQLite-backed vector index |
//! | [`rag`] | `VaultRag` facade: search, context, browse, verify |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod browse;
pub mod config;
pub mod db;
pub mod embedding;
pub mod indexer;
pub mod loader;
pub mod migrate;
pub mod progress;
pub mod rag;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use forge_vault_core;
pub use indexer::{IndexReport, Indexer, ReindexMode};
pub use rag::{ClaimVerification, DocumentSummary, VaultRag};
