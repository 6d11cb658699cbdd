//! # Connector Layer
//!
//! External integrations implementing the application layer's ports:
//! embedding providers (mock + HTTP), file-based vector/record/manifest
//! storage, the exclusion-filtering file walker, and the per-repository
//! storage manager (spec §4.P).

pub mod adapter;
pub mod storage_manager;
pub mod walker;

pub use adapter::*;
pub use storage_manager::*;
pub use walker::{glob_to_regex, Walker, DEFAULT_EXCLUDES};
