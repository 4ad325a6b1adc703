use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for any configured outbound timeout.
const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Embedding store and catalog backend
    pub store: StoreConfig,
    /// LLM provider configuration (embeddings + chat)
    pub llm: LlmConfig,
    /// Agent search tuning knobs
    pub agent: AgentConfig,
}

/// Where embeddings and catalog records are read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "supabase" or "memory"
    pub backend: String,
    /// Base URL of the hosted project (PostgREST lives under `/rest/v1`)
    pub base_url: String,
    /// API key sent as both `apikey` and bearer token
    pub api_key: Option<String>,
    /// Table holding the precomputed embeddings
    pub embeddings_table: String,
    /// Server-side similarity function name
    pub match_function: String,
    /// JSON export loaded by the "memory" backend
    pub embeddings_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "supabase".to_string(),
            base_url: "http://localhost:54321".to_string(),
            api_key: None,
            embeddings_table: "embeddings".to_string(),
            match_function: "match_embeddings".to_string(),
            embeddings_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "ollama"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for answer composition
    pub chat_model: String,
    /// Model name for embeddings. Must match the model the store was populated with.
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            embedding_dim: 1536,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Minimum similarity for the ranked tier (inclusive)
    pub match_threshold: f32,
    /// Maximum candidates requested from the ranked and unranked tiers
    pub match_count: usize,
    /// Similarity stamped on rows from the unranked sample tier
    pub unranked_similarity: f32,
    /// Similarity stamped on rows from the emergency sample tier
    pub emergency_similarity: f32,
    /// Row count fetched by the emergency sample tier
    pub emergency_limit: usize,
    /// Sampling temperature for answer composition
    pub temperature: f32,
    /// Detail fetches in flight at once (1 = sequential)
    pub enrich_concurrency: usize,
    /// Agent searches allowed to run at once
    pub max_concurrent_searches: usize,
    pub embed_timeout_secs: u64,
    pub retrieval_timeout_secs: u64,
    pub model_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            match_count: 15,
            unranked_similarity: 0.8,
            emergency_similarity: 0.7,
            emergency_limit: 5,
            temperature: 0.7,
            enrich_concurrency: 5,
            max_concurrent_searches: 8,
            embed_timeout_secs: 10,
            retrieval_timeout_secs: 10,
            model_timeout_secs: 20,
        }
    }
}

impl AgentConfig {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_secs(self.embed_timeout_secs.min(MAX_TIMEOUT_SECS))
    }

    pub fn retrieval_timeout(&self) -> Duration {
        Duration::from_secs(self.retrieval_timeout_secs.min(MAX_TIMEOUT_SECS))
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs.min(MAX_TIMEOUT_SECS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            store: StoreConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Unparsable numbers keep their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = get("WELLNESS_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }

        // Store
        if let Some(backend) = get("EMBEDDINGS_BACKEND") {
            config.store.backend = backend;
        }
        if let Some(url) = get("SUPABASE_URL") {
            config.store.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = get("SUPABASE_ANON_KEY") {
            config.store.api_key = Some(key);
        }
        // Service role key wins when both are set
        if let Some(key) = get("SUPABASE_SERVICE_ROLE_KEY") {
            config.store.api_key = Some(key);
        }
        if let Some(table) = get("EMBEDDINGS_TABLE") {
            config.store.embeddings_table = table;
        }
        if let Some(name) = get("EMBEDDINGS_MATCH_FN") {
            config.store.match_function = name;
        }
        if let Some(path) = get("EMBEDDINGS_FILE") {
            config.store.embeddings_file = Some(PathBuf::from(path));
        }

        // LLM
        if let Some(provider) = get("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = get("LLM_BASE_URL") {
            config.llm.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(model) = get("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(key) = get("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(dim) = get("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }

        // Agent
        let agent = &mut config.agent;
        parse_into(&get, "AGENT_MATCH_THRESHOLD", &mut agent.match_threshold);
        parse_into(&get, "AGENT_MATCH_COUNT", &mut agent.match_count);
        parse_into(&get, "AGENT_UNRANKED_SIMILARITY", &mut agent.unranked_similarity);
        parse_into(&get, "AGENT_EMERGENCY_SIMILARITY", &mut agent.emergency_similarity);
        parse_into(&get, "AGENT_EMERGENCY_LIMIT", &mut agent.emergency_limit);
        parse_into(&get, "AGENT_TEMPERATURE", &mut agent.temperature);
        parse_into(&get, "AGENT_ENRICH_CONCURRENCY", &mut agent.enrich_concurrency);
        parse_into(&get, "AGENT_MAX_CONCURRENT", &mut agent.max_concurrent_searches);
        parse_into(&get, "AGENT_EMBED_TIMEOUT_SECS", &mut agent.embed_timeout_secs);
        parse_into(&get, "AGENT_RETRIEVAL_TIMEOUT_SECS", &mut agent.retrieval_timeout_secs);
        parse_into(&get, "AGENT_MODEL_TIMEOUT_SECS", &mut agent.model_timeout_secs);

        // Zero would stall the enrichment stream and the request semaphore
        agent.enrich_concurrency = agent.enrich_concurrency.max(1);
        agent.max_concurrent_searches = agent.max_concurrent_searches.max(1);

        config
    }
}

fn parse_into<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(val) = get(key) {
        if let Ok(v) = val.parse() {
            *slot = v;
        }
    }
}
