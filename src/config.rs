use anyhow::Result;
use std::path::PathBuf;

/// Application configuration, read from the environment.
///
/// Credentials and endpoints come from the environment so the service can be
/// deployed without a config file. Everything is validated up front:
/// a missing required value fails startup with a descriptive message before
/// any network call is attempted.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenAI API key, used for both embeddings and chat completions.
    pub openai_api_key: String,
    /// Qdrant endpoint (gRPC).
    pub qdrant_url: String,
    /// Optional Qdrant Cloud API key.
    pub qdrant_api_key: Option<String>,
    /// Prefix for per-user collection names.
    pub collection_prefix: String,
    /// Path to the SQLite metadata database.
    pub db_path: PathBuf,
    /// Address the HTTP server binds to.
    pub bind: String,
}

/// Embedding model and dimensionality are fixed: every vector in a user's
/// collection must come from the same model.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const EMBEDDING_DIMS: u64 = 3072;

/// Chat model and generation parameters. Moderate temperature and a capped
/// completion length keep answers grounded and bound cost per request.
pub const CHAT_MODEL: &str = "gpt-4o-mini";
pub const CHAT_TEMPERATURE: f64 = 0.7;
pub const CHAT_MAX_TOKENS: u32 = 1000;

/// Hard cap on the number of source documents per user.
pub const MAX_SOURCE_DOCUMENTS: i64 = 5;

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Split out from [`Config::from_env`] so validation can be tested
    /// without mutating process-global environment state.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let openai_api_key = var("OPENAI_API_KEY")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!("OPENAI_API_KEY is not set (required for embeddings and chat)")
            })?;

        let qdrant_url =
            var("QDRANT_URL").unwrap_or_else(|| "http://localhost:6333".to_string());
        if qdrant_url.is_empty() {
            anyhow::bail!("QDRANT_URL must not be empty");
        }

        let qdrant_api_key = var("QDRANT_API_KEY").filter(|v| !v.is_empty());

        let collection_prefix =
            var("QDRANT_COLLECTION_PREFIX").unwrap_or_else(|| "rag-app".to_string());
        if collection_prefix.is_empty() {
            anyhow::bail!("QDRANT_COLLECTION_PREFIX must not be empty");
        }

        let db_path = var("ASKDOCS_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/askdocs.sqlite"));

        let bind = var("ASKDOCS_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        Ok(Self {
            openai_api_key,
            qdrant_url,
            qdrant_api_key,
            collection_prefix,
            db_path,
            bind,
        })
    }
}
