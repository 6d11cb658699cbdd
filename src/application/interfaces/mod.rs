mod chunk_store;
mod embedding_provider;
mod file_manifest_store;
mod repository_store;
mod vector_index;

pub use chunk_store::*;
pub use embedding_provider::*;
pub use file_manifest_store::*;
pub use repository_store::*;
pub use vector_index::*;
