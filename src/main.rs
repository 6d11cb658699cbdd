//! ziri CLI - local, per-repository semantic code index and retrieval engine.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ziri::application::interfaces::EmbeddingProvider;
use ziri::application::use_cases::{
    DeleteRepositoryUseCase, IndexRepositoryUseCase, QueryCodeUseCase, UpdateRepositoryUseCase,
};
use ziri::connector::adapter::{HttpEmbeddingProvider, HttpProviderSpec, MockEmbeddingProvider};
use ziri::connector::storage_manager::StorageManager;
use ziri::domain::config::OrchestratorConfig;
use ziri::domain::error::ZiriError;
use ziri::domain::models::{QueryScope, SearchQuery};

/// ziri - local, per-repository semantic code index and retrieval
#[derive(Parser)]
#[command(name = "ziri")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the ziri home directory (default: $ZIRI_HOME or ~/.ziri)
    #[arg(long, global = true)]
    home: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a repository, full or incremental
    Index {
        /// Path to the repository to index
        path: String,

        /// Embedding provider (mock|openai|ollama|huggingface|cohere)
        #[arg(long)]
        provider: Option<String>,

        /// Max in-flight embedding batches
        #[arg(long)]
        concurrency: Option<usize>,

        /// Initial adaptive batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Memory budget in megabytes
        #[arg(long)]
        memory_limit: Option<u64>,

        /// Re-index from scratch, ignoring the existing manifest
        #[arg(long)]
        force: bool,

        /// Additional exclusion globs (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Query an indexed repository
    Query {
        /// The query text
        text: String,

        /// Number of results to return
        #[arg(long, default_value = "10")]
        k: usize,

        /// Search scope: repo|all|set:id1,id2
        #[arg(long, default_value = "repo")]
        scope: String,

        /// Embedding provider (must match the one used to index)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Re-index an explicit set of changed/deleted paths
    Update {
        /// Path to the repository to update
        path: String,

        /// Repository-relative paths that changed
        #[arg(long)]
        changed: Vec<String>,

        /// Repository-relative paths that were deleted
        #[arg(long)]
        deleted: Vec<String>,

        /// Embedding provider (must match the one used to index)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Remove all on-disk state for a repository
    Delete {
        /// Repository id or filesystem path
        id_or_path: String,
    },

    /// List indexed repositories
    List,

    /// Show aggregate stats for a repository
    Stats {
        /// Repository id
        repository_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            let code = err.downcast_ref::<ZiriError>().map(ZiriError::exit_code).unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = OrchestratorConfig::from_env()?;
    if let Some(home) = cli.home {
        config.home = PathBuf::from(expand_tilde(&home));
    }
    std::fs::create_dir_all(&config.home)?;
    let storage = Arc::new(StorageManager::new(config.home.clone())?);

    match cli.command {
        Commands::Index {
            path,
            provider,
            concurrency,
            batch_size,
            memory_limit,
            force,
            exclude,
        } => {
            let config = config
                .with_provider(provider)
                .with_concurrency(concurrency)
                .with_batch_size(batch_size)
                .with_memory_limit_mb(memory_limit)
                .with_force_full(force)
                .with_exclude(exclude);
            let provider = provider_for(&config.default_provider)?;

            let use_case = IndexRepositoryUseCase::new(storage, provider);
            let report = use_case.execute(&PathBuf::from(&path), &config).await?;

            println!("Indexed repository: {}", report.repository_id);
            println!("  files processed: {}", report.files_processed);
            println!("  files deleted:   {}", report.files_deleted);
            println!("  chunks written:  {}", report.chunks_generated);
            println!("  duration:        {}ms", report.duration_ms);
        }

        Commands::Query { text, k, scope, provider } => {
            let config = config.with_provider(provider);
            let provider = provider_for(&config.default_provider)?;
            let scope = parse_scope(&scope, &path_or_cwd()?);

            let use_case = QueryCodeUseCase::new(storage, provider);
            let hits = use_case.execute(&SearchQuery::new(text, k), &scope).await?;

            if hits.is_empty() {
                println!("No results found.");
            } else {
                for (rank, hit) in hits.iter().enumerate() {
                    match hit.line_span() {
                        Some(span) => println!(
                            "{}. {}:{} (score {:.2})",
                            rank + 1,
                            hit.file_path(),
                            span,
                            hit.score()
                        ),
                        None => println!("{}. {} (legacy, score {:.2})", rank + 1, hit.file_path(), hit.score()),
                    }
                }
            }
        }

        Commands::Update {
            path,
            changed,
            deleted,
            provider,
        } => {
            let config = config.with_provider(provider);
            let provider = provider_for(&config.default_provider)?;

            let use_case = UpdateRepositoryUseCase::new(storage, provider);
            let report = use_case.execute(&PathBuf::from(&path), &changed, &deleted, &config).await?;

            println!("Updated repository: {}", report.repository_id);
            println!("  changed: {}", report.changed);
            println!("  deleted: {}", report.deleted);
        }

        Commands::Delete { id_or_path } => {
            let use_case = DeleteRepositoryUseCase::new(storage);
            if use_case.execute(&id_or_path).await.is_err() {
                use_case.execute_by_path(&PathBuf::from(&id_or_path)).await?;
            }
            println!("Repository deleted.");
        }

        Commands::List => {
            let repositories = storage.list().await?;
            if repositories.is_empty() {
                println!("No repositories indexed.");
            } else {
                for repository in repositories {
                    println!("{}  {}", repository.id(), repository.path());
                }
            }
        }

        Commands::Stats { repository_id } => {
            let stats = storage
                .stats(&repository_id)
                .await?
                .ok_or_else(|| ZiriError::not_found(format!("no repository with id '{repository_id}'")))?;
            println!("Repository: {}", stats.repository.id());
            println!("  path:       {}", stats.repository.path());
            println!("  files:      {}", stats.file_count);
            println!("  chunks:     {}", stats.repository.total_chunks());
            println!("  provider:   {}", stats.repository.embedding_provider().unwrap_or("(unindexed)"));
            println!("  last index: {}", stats.repository.last_indexed().unwrap_or("never"));
        }
    }

    Ok(())
}

fn provider_for(tag: &str) -> Result<Arc<dyn EmbeddingProvider>, ZiriError> {
    match tag {
        "mock" => Ok(Arc::new(MockEmbeddingProvider::new())),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| ZiriError::input("OPENAI_API_KEY is required for provider 'openai'"))?;
            let spec = HttpProviderSpec::openai(api_key, "text-embedding-3-small", 1536);
            Ok(Arc::new(HttpEmbeddingProvider::new(spec)))
        }
        "ollama" => {
            let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
            let spec = HttpProviderSpec::ollama(base_url, "nomic-embed-text", 768);
            Ok(Arc::new(HttpEmbeddingProvider::new(spec)))
        }
        "huggingface" => {
            let api_key = std::env::var("HUGGINGFACE_API_KEY")
                .map_err(|_| ZiriError::input("HUGGINGFACE_API_KEY is required for provider 'huggingface'"))?;
            let model = std::env::var("HUGGINGFACE_MODEL").unwrap_or_else(|_| "sentence-transformers/all-MiniLM-L6-v2".to_string());
            let spec = HttpProviderSpec::huggingface(api_key, model, 384);
            Ok(Arc::new(HttpEmbeddingProvider::new(spec)))
        }
        "cohere" => {
            let api_key = std::env::var("COHERE_API_KEY")
                .map_err(|_| ZiriError::input("COHERE_API_KEY is required for provider 'cohere'"))?;
            let spec = HttpProviderSpec::cohere(api_key, "embed-english-v3.0", 1024);
            Ok(Arc::new(HttpEmbeddingProvider::new(spec)))
        }
        other => Err(ZiriError::input(format!("unknown provider '{other}'"))),
    }
}

fn parse_scope(raw: &str, current_repo_path: &str) -> QueryScope {
    if raw == "all" {
        QueryScope::All
    } else if let Some(ids) = raw.strip_prefix("set:") {
        QueryScope::Named(ids.split(',').map(str::to_string).collect())
    } else {
        QueryScope::CurrentRepo(current_repo_path.to_string())
    }
}

fn path_or_cwd() -> Result<String, ZiriError> {
    let cwd = std::env::current_dir().map_err(ZiriError::Io)?;
    Ok(cwd.to_string_lossy().to_string())
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}
