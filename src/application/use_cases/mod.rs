mod delete_repository;
mod index_repository;
mod query_code;
pub(crate) mod support;
mod update_repository;

pub use delete_repository::*;
pub use index_repository::*;
pub use query_code::*;
pub use update_repository::*;
