//! Integration tests exercising the indexing/query/update/delete pipeline
//! end-to-end against an isolated, temp-directory-backed storage manager.

use std::sync::Arc;

use tempfile::tempdir;

use ziri::application::use_cases::{
    DeleteRepositoryUseCase, IndexRepositoryUseCase, QueryCodeUseCase, UpdateRepositoryUseCase,
};
use ziri::connector::adapter::MockEmbeddingProvider;
use ziri::connector::storage_manager::StorageManager;
use ziri::domain::config::OrchestratorConfig;
use ziri::domain::error::ZiriError;
use ziri::domain::models::{QueryScope, SearchQuery};

fn config(home: &std::path::Path) -> OrchestratorConfig {
    OrchestratorConfig {
        home: home.to_path_buf(),
        default_provider: "mock".to_string(),
        concurrency: 2,
        batch_size: 4,
        memory_limit_mb: 100_000,
        exclude: Vec::new(),
        force_full: false,
    }
}

/// S1 — index, query, boost.
#[tokio::test]
async fn index_query_applies_function_name_boost() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());

    IndexRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &cfg)
        .await
        .unwrap();

    let use_case = QueryCodeUseCase::new(storage, provider);
    let scope = QueryScope::CurrentRepo(repo.path().canonicalize().unwrap().to_string_lossy().to_string());
    let hits = use_case.execute(&SearchQuery::new("multiply", 1), &scope).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_path(), "math.py");
    assert_eq!(hits[0].line_span(), Some("1-2".to_string()));
}

/// S2 — incremental update: adding a function re-embeds the file and the
/// new symbol becomes queryable.
#[tokio::test]
async fn update_after_modification_makes_new_function_queryable() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());

    IndexRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &cfg)
        .await
        .unwrap();

    std::fs::write(
        repo.path().join("math.py"),
        "def multiply(x, y):\n    return x * y\n\ndef divide(x, y):\n    return x / y\n",
    )
    .unwrap();

    UpdateRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &["math.py".to_string()], &[], &cfg)
        .await
        .unwrap();

    let use_case = QueryCodeUseCase::new(storage, provider);
    let scope = QueryScope::CurrentRepo(repo.path().canonicalize().unwrap().to_string_lossy().to_string());
    let hits = use_case.execute(&SearchQuery::new("divide", 1), &scope).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file_path(), "math.py");
    // Both functions fit under one chunking window, so the whole file is a
    // single chunk; only its presence/position is asserted here, not a
    // per-function split.
    assert_eq!(hits[0].line_span(), Some("1-5".to_string()));
}

/// S3 — deletion: removing a file clears its chunks/vectors and zeroes
/// out query results for content unique to it.
#[tokio::test]
async fn deleting_a_file_removes_its_chunks_from_the_index() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());

    IndexRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &cfg)
        .await
        .unwrap();

    std::fs::remove_file(repo.path().join("math.py")).unwrap();
    UpdateRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &[], &["math.py".to_string()], &cfg)
        .await
        .unwrap();

    let use_case = QueryCodeUseCase::new(storage.clone(), provider);
    let scope = QueryScope::CurrentRepo(repo.path().canonicalize().unwrap().to_string_lossy().to_string());
    let hits = use_case.execute(&SearchQuery::new("multiply", 5), &scope).await.unwrap();
    assert!(hits.is_empty());

    let repository = storage.list().await.unwrap().into_iter().next().unwrap();
    let vector_index = storage.open_vector_index(&repository).unwrap();
    assert_eq!(vector_index.ntotal().await.unwrap(), 0);
}

/// S4 — exclusion: default excludes keep `node_modules` out of the manifest.
#[tokio::test]
async fn node_modules_is_excluded_by_default() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::create_dir_all(repo.path().join("src")).unwrap();
    std::fs::create_dir_all(repo.path().join("node_modules")).unwrap();
    std::fs::write(repo.path().join("src/main.js"), "function main() {}\n").unwrap();
    std::fs::write(repo.path().join("node_modules/x.js"), "function vendored() {}\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());

    let report = IndexRepositoryUseCase::new(storage.clone(), provider.clone())
        .execute(repo.path(), &cfg)
        .await
        .unwrap();
    assert_eq!(report.files_processed, 1);

    let repository = storage.find_by_id(&report.repository_id).await.unwrap().unwrap();
    let manifest = storage.load_manifest(&repository).await.unwrap();
    assert!(manifest.contains_key("src/main.js"));
    assert!(!manifest.contains_key("node_modules/x.js"));
}

/// S5 — dimension mismatch: switching providers after indexing fails fast.
#[tokio::test]
async fn querying_with_a_mismatched_provider_dimension_fails_fast() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let cfg = config(home.path());
    IndexRepositoryUseCase::new(storage.clone(), Arc::new(MockEmbeddingProvider::with_dimensions(8)))
        .execute(repo.path(), &cfg)
        .await
        .unwrap();

    let mismatched_provider = Arc::new(MockEmbeddingProvider::with_dimensions(16));
    let use_case = QueryCodeUseCase::new(storage, mismatched_provider);
    let scope = QueryScope::CurrentRepo(repo.path().canonicalize().unwrap().to_string_lossy().to_string());
    let err = use_case.execute(&SearchQuery::new("multiply", 1), &scope).await.unwrap_err();

    assert!(matches!(err, ZiriError::ProviderMismatch { indexed: 8, queried: 16 }));
}

/// Re-indexing an unchanged tree performs zero embedding calls (spec §8 scenario 4).
#[tokio::test]
async fn reindexing_an_unchanged_tree_embeds_nothing() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());
    let use_case = IndexRepositoryUseCase::new(storage, provider);

    use_case.execute(repo.path(), &cfg).await.unwrap();
    let second = use_case.execute(repo.path(), &cfg).await.unwrap();
    assert_eq!(second.chunks_generated, 0);
}

/// Deleting a repository removes all of its on-disk state.
#[tokio::test]
async fn delete_repository_removes_all_state() {
    let home = tempdir().unwrap();
    let repo = tempdir().unwrap();
    std::fs::write(repo.path().join("math.py"), "def multiply(x, y):\n    return x * y\n").unwrap();

    let storage = Arc::new(StorageManager::new(home.path().to_path_buf()).unwrap());
    let provider = Arc::new(MockEmbeddingProvider::with_dimensions(8));
    let cfg = config(home.path());

    let report = IndexRepositoryUseCase::new(storage.clone(), provider)
        .execute(repo.path(), &cfg)
        .await
        .unwrap();

    DeleteRepositoryUseCase::new(storage.clone())
        .execute(&report.repository_id)
        .await
        .unwrap();

    assert!(!storage.exists(&report.repository_id).await.unwrap());
}
