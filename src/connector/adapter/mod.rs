mod chunk_store;
mod file_manifest_store;
mod http_embedding;
mod mock_embedding;
mod repository_metadata_store;
mod vector_index;

pub use chunk_store::*;
pub use file_manifest_store::*;
pub use http_embedding::*;
pub use mock_embedding::*;
pub use repository_metadata_store::*;
pub use vector_index::*;
