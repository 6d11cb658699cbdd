//! # ziri
//!
//! A local, per-repository semantic code index and retrieval engine: walks a
//! source tree, chunks and embeds it through a pluggable provider, and
//! answers nearest-neighbor queries enriched with code metadata.
//!
//! ## Architecture
//!
//! The crate is organized following Domain-Driven Design principles:
//!
//! - `domain`: Core business models, pure algorithms (chunking, metadata
//!   extraction, change detection), and error types
//! - `application`: Use cases, streaming pipeline, and orchestration logic
//! - `connector`: External integrations (embedding providers, file-based
//!   vector/record/manifest storage, the repository walker)

pub mod application;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use connector::*;
pub use domain::*;
