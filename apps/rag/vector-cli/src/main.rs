//! Vector CLI
//!
//! Indexes embedding exports into a vector store and runs similarity search
//! against the resulting collections.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_vector_store::embedding::{OpenAiConfig, OpenAiEmbedder};
use domain_vector_store::index_modes::{DEFAULT_INDEX_MODE, INDEX_MODES};
use domain_vector_store::models::{
    DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K, DEFAULT_WORD_COUNT_THRESHOLD,
};
use domain_vector_store::{Provider, ProviderRegistry, SearchQuery, VectorStoreService};
use eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::info;

mod config;
mod sink;

use config::Config;
use sink::JsonFileSink;

#[derive(Parser)]
#[command(name = "vector-cli")]
#[command(about = "Index document embeddings and search them across vector stores")]
struct Cli {
    /// Print Prometheus metrics after the command finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index an embedding export file into a new collection
    Index {
        /// Path to the embedding export (JSON)
        input: PathBuf,

        /// Vector store provider (milvus, qdrant, chroma, local)
        #[arg(short, long, default_value = "local", value_parser = parse_provider)]
        provider: Provider,

        /// Index mode (flat, ivf_flat, ivf_sq8, hnsw)
        #[arg(short = 'm', long, default_value = DEFAULT_INDEX_MODE)]
        index_mode: String,
    },

    /// Search a collection
    Search {
        /// Collection name returned by `index`
        collection: String,

        /// Query text
        query: String,

        #[arg(short, long, default_value = "local", value_parser = parse_provider)]
        provider: Provider,

        /// Number of results to return
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Minimum similarity in [0, 1]
        #[arg(short, long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
        threshold: f32,

        /// Minimum number of words in a returned passage
        #[arg(short, long, default_value_t = DEFAULT_WORD_COUNT_THRESHOLD)]
        word_count_threshold: usize,

        /// Save results to the results directory
        #[arg(short, long)]
        save: bool,
    },

    /// List collections on a provider
    Collections {
        #[arg(short, long, default_value = "local", value_parser = parse_provider)]
        provider: Provider,
    },

    /// Show a collection's schema and index
    Describe {
        collection: String,

        #[arg(short, long, default_value = "local", value_parser = parse_provider)]
        provider: Provider,
    },

    /// Delete a collection
    Drop {
        collection: String,

        #[arg(short, long, default_value = "local", value_parser = parse_provider)]
        provider: Provider,
    },

    /// List providers and whether they are available on this host
    Providers,

    /// List index modes
    IndexModes,
}

fn parse_provider(raw: &str) -> Result<Provider, String> {
    Provider::parse(raw).map_err(|e| e.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    observability::init_metrics().wrap_err("Failed to install metrics recorder")?;

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let registry = ProviderRegistry::from_env(config.storage.local_store_dir())
        .wrap_err("Failed to configure vector store providers")?;
    let service = VectorStoreService::new(registry)
        .with_batch_size(config.batch_size)
        .with_result_sink(Arc::new(JsonFileSink::new(&config.storage.results_dir)));

    match cli.command {
        Commands::Index {
            input,
            provider,
            index_mode,
        } => {
            info!(input = %input.display(), %provider, %index_mode, "Indexing embeddings");
            let result = service
                .index_file(&input, provider, &index_mode)
                .await
                .wrap_err_with(|| format!("Failed to index '{}'", input.display()))?;

            info!(
                "Indexed {} of {} vectors into {} in {:.2}s",
                result.index_size, result.total_vectors, result.collection_name, result.processing_time
            );
            print_json(&result)?;
        }

        Commands::Search {
            collection,
            query,
            provider,
            top_k,
            threshold,
            word_count_threshold,
            save,
        } => {
            let embedder = OpenAiEmbedder::new(OpenAiConfig::from_env()?, &config.embedding_model);
            let query = SearchQuery::new(query, collection, provider)
                .with_top_k(top_k)
                .with_score_threshold(threshold)
                .with_word_count_threshold(word_count_threshold)
                .with_save_results(save);

            let outcome = service
                .search(&query, &embedder)
                .await
                .wrap_err_with(|| format!("Search on '{}' failed", query.collection_id))?;

            info!("Found {} results", outcome.results.len());
            print_json(&outcome)?;
        }

        Commands::Collections { provider } => {
            print_json(&service.list_collections(provider).await)?;
        }

        Commands::Describe {
            collection,
            provider,
        } => {
            let descriptor = service
                .describe_collection(provider, &collection)
                .await
                .wrap_err_with(|| format!("Cannot describe '{}'", collection))?;
            print_json(&descriptor)?;
        }

        Commands::Drop {
            collection,
            provider,
        } => {
            let dropped = service
                .drop_collection(provider, &collection)
                .await
                .wrap_err_with(|| format!("Cannot drop '{}'", collection))?;
            print_json(&serde_json::json!({ "collection": collection, "dropped": dropped }))?;
        }

        Commands::Providers => {
            print_json(&service.providers())?;
        }

        Commands::IndexModes => {
            print_json(&INDEX_MODES)?;
        }
    }

    if cli.metrics {
        print!("{}", observability::render_metrics());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_defaults() {
        let cli = Cli::parse_from(["vector-cli", "search", "manual_openai_20240501123045", "reset"]);
        match cli.command {
            Commands::Search {
                provider,
                top_k,
                threshold,
                word_count_threshold,
                save,
                ..
            } => {
                assert_eq!(provider, Provider::Local);
                assert_eq!(top_k, 3);
                assert_eq!(threshold, 0.7);
                assert_eq!(word_count_threshold, 100);
                assert!(!save);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_provider_flag_is_case_insensitive() {
        let cli = Cli::parse_from(["vector-cli", "index", "manual.json", "-p", "Qdrant", "-m", "hnsw"]);
        match cli.command {
            Commands::Index {
                provider, index_mode, ..
            } => {
                assert_eq!(provider, Provider::Qdrant);
                assert_eq!(index_mode, "hnsw");
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["vector-cli", "collections", "-p", "pinecone"]).is_err());
    }
}
