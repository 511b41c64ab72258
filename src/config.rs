/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: ragfuse.toml (in working directory)
/// 3. Environment variables: prefixed RAGFUSE_, `__` separates sections
///    (e.g., RAGFUSE_LOG_LEVEL=debug, RAGFUSE_WEIGHTS__W_VECTOR=2.0)
///
/// Every weight, cap, threshold, limit and timeout used by the retrieval
/// pipeline lives here so ranking can be retuned without a rebuild.

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::RagfuseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format: auto (pretty on a terminal, JSON otherwise), pretty, json
    #[serde(default = "default_log_format")]
    pub log_format: String,

    #[serde(default)]
    pub qdrant: QdrantConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub phrase: PhraseConfig,

    #[serde(default)]
    pub weights: ScoringWeights,

    #[serde(default)]
    pub search: SearchDefaults,

    #[serde(default)]
    pub rag: RagDefaults,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "auto".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_format: default_log_format(),
            qdrant: QdrantConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            phrase: PhraseConfig::default(),
            weights: ScoringWeights::default(),
            search: SearchDefaults::default(),
            rag: RagDefaults::default(),
        }
    }
}

/// Vector index connection and collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Collection used when a request does not name one
    pub collection: String,
    /// Expected embedding dimension; the embedding model must match it exactly
    pub vector_size: usize,
    /// cosine | dot | euclid (aliases accepted, see `index::Distance`)
    pub distance: String,
    pub primary_timeout_secs: u64,
    pub aux_timeout_secs: u64,
    pub stitch_timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        QdrantConfig {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            collection: "latex_books".to_string(),
            vector_size: 384,
            distance: "cosine".to_string(),
            primary_timeout_secs: 10,
            aux_timeout_secs: 6,
            stitch_timeout_secs: 8,
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "local" (fastembed, default) or "openai"
    pub provider: String,
    /// Local fastembed model name (e.g., "multilingual-e5-small")
    pub model: String,
    /// Directory where fastembed caches model weights
    pub cache_dir: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

fn default_cache_dir() -> String {
    dirs::cache_dir()
        .map(|d| d.join("ragfuse").join("models"))
        .unwrap_or_else(|| std::path::PathBuf::from(".ragfuse/models"))
        .to_string_lossy()
        .into_owned()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig {
            provider: "local".to_string(),
            model: "multilingual-e5-small".to_string(),
            cache_dir: default_cache_dir(),
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "text-embedding-3-small".to_string(),
        }
    }
}

/// Candidate pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub search_internal_mult: usize,
    pub search_internal_min: usize,
    pub search_internal_max: usize,
    pub rag_internal_mult: usize,
    pub rag_internal_min: usize,
    pub rag_internal_max: usize,
    /// Per-probe limit for source-guess injection in search mode
    pub search_probe_limit: usize,
    /// Per-probe limit for source-guess injection in RAG mode
    pub rag_probe_limit: usize,
    /// Hard ceiling for the adaptive expansion re-fetch
    pub expansion_cap: usize,
    /// Minimum growth over the internal limit when expanding
    pub expansion_min_step: usize,
    /// Only the first N words of a chunk take part in fuzzy matching
    pub fuzzy_text_word_limit: usize,
    /// Extra points requested by a stitch scroll beyond the window size
    pub stitch_scroll_slack: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            search_internal_mult: 10,
            search_internal_min: 50,
            search_internal_max: 300,
            rag_internal_mult: 24,
            rag_internal_min: 60,
            rag_internal_max: 240,
            search_probe_limit: 30,
            rag_probe_limit: 40,
            expansion_cap: 500,
            expansion_min_step: 80,
            fuzzy_text_word_limit: 300,
            stitch_scroll_slack: 8,
        }
    }
}

impl RetrievalConfig {
    /// clamp(limit * mult, min, max) for search mode
    pub fn search_internal_limit(&self, limit: usize) -> usize {
        (limit * self.search_internal_mult)
            .max(self.search_internal_min)
            .min(self.search_internal_max)
    }

    /// clamp(limit * mult, min, max) for RAG mode
    pub fn rag_internal_limit(&self, limit: usize) -> usize {
        (limit * self.rag_internal_mult)
            .max(self.rag_internal_min)
            .min(self.rag_internal_max)
    }
}

/// Phrase derivation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    pub max_ngram: usize,
    pub min_len: usize,
    /// Words that disqualify an n-gram in addition to the token stopwords
    pub extra_stopwords: Vec<String>,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        PhraseConfig {
            max_ngram: 3,
            min_len: 6,
            extra_stopwords: Vec::new(),
        }
    }
}

/// Weight table for the composite relevance score.
///
/// Boolean signals contribute `weight * 0|1`; count signals are capped before
/// weighting. All contributions are additive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub w_vector: f64,
    pub w_lex_match: f64,
    pub lex_match_cap: usize,
    pub w_title_match: f64,
    pub w_source_match: f64,
    pub w_approx_title_hits: f64,
    pub approx_title_hits_cap: usize,
    pub w_fuzzy_title_hits: f64,
    pub fuzzy_title_hits_cap: usize,
    pub w_fuzzy_text_hits: f64,
    pub fuzzy_text_hits_cap: usize,
    pub w_title_phrase: f64,
    pub w_text_phrase: f64,
    pub w_algo_name_match: f64,
    pub w_def_boost: f64,
    pub w_exact_source_match: f64,
    pub w_def_like: f64,
    pub w_has_properties: f64,
    pub w_has_lemma_theorem: f64,
    pub w_barycenter_focus: f64,
    pub barycenter_focus_bonus: f64,
    /// Subtracted when long focus tokens exist but none hit title or source
    pub barycenter_miss_penalty: f64,
    /// Negative: applied to boilerplate chunks for algorithm queries
    pub w_boilerplate_penalty: f64,
    pub w_early_chunk_bonus: f64,
    pub early_chunk_index: u64,
    pub w_is_definition_flag: f64,
    pub w_has_math_flag: f64,
    pub w_algo_name_payload_match: f64,
    pub w_is_algorithm_flag: f64,
    /// Tokens shorter than this never take part in fuzzy matching
    pub fuzzy_min_token_len: usize,
    pub fuzzy_max_distance: usize,
    /// Query tokens at least this long drive the focus bonus/penalty
    pub focus_token_min_len: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            w_vector: 1.0,
            w_lex_match: 0.05,
            lex_match_cap: 10,
            w_title_match: 0.3,
            w_source_match: 0.2,
            w_approx_title_hits: 0.15,
            approx_title_hits_cap: 3,
            w_fuzzy_title_hits: 0.1,
            fuzzy_title_hits_cap: 3,
            w_fuzzy_text_hits: 0.05,
            fuzzy_text_hits_cap: 3,
            w_title_phrase: 0.6,
            w_text_phrase: 0.3,
            w_algo_name_match: 0.8,
            w_def_boost: 0.2,
            w_exact_source_match: 2.0,
            w_def_like: 0.3,
            w_has_properties: 0.1,
            w_has_lemma_theorem: 0.05,
            w_barycenter_focus: 0.5,
            barycenter_focus_bonus: 3.5,
            barycenter_miss_penalty: 2.2,
            w_boilerplate_penalty: -0.5,
            w_early_chunk_bonus: 0.2,
            early_chunk_index: 2,
            w_is_definition_flag: 0.3,
            w_has_math_flag: 0.1,
            w_algo_name_payload_match: 0.5,
            w_is_algorithm_flag: 0.2,
            fuzzy_min_token_len: 5,
            fuzzy_max_distance: 1,
            focus_token_min_len: 9,
        }
    }
}

impl ScoringWeights {
    fn float_weights(&self) -> [(&'static str, f64); 24] {
        [
            ("w_vector", self.w_vector),
            ("w_lex_match", self.w_lex_match),
            ("w_title_match", self.w_title_match),
            ("w_source_match", self.w_source_match),
            ("w_approx_title_hits", self.w_approx_title_hits),
            ("w_fuzzy_title_hits", self.w_fuzzy_title_hits),
            ("w_fuzzy_text_hits", self.w_fuzzy_text_hits),
            ("w_title_phrase", self.w_title_phrase),
            ("w_text_phrase", self.w_text_phrase),
            ("w_algo_name_match", self.w_algo_name_match),
            ("w_def_boost", self.w_def_boost),
            ("w_exact_source_match", self.w_exact_source_match),
            ("w_def_like", self.w_def_like),
            ("w_has_properties", self.w_has_properties),
            ("w_has_lemma_theorem", self.w_has_lemma_theorem),
            ("w_barycenter_focus", self.w_barycenter_focus),
            ("barycenter_focus_bonus", self.barycenter_focus_bonus),
            ("barycenter_miss_penalty", self.barycenter_miss_penalty),
            ("w_boilerplate_penalty", self.w_boilerplate_penalty),
            ("w_early_chunk_bonus", self.w_early_chunk_bonus),
            ("w_is_definition_flag", self.w_is_definition_flag),
            ("w_has_math_flag", self.w_has_math_flag),
            ("w_algo_name_payload_match", self.w_algo_name_payload_match),
            ("w_is_algorithm_flag", self.w_is_algorithm_flag),
        ]
    }
}

/// Defaults for `search` requests when the caller omits a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub limit: usize,
    pub max_chars: Option<usize>,
    pub with_chunk_text: bool,
    pub include_debug: bool,
    pub stitch_neighbors: bool,
    pub stitch_before: u64,
    pub stitch_after: u64,
    pub stitch_use_chunk_text: bool,
}

impl Default for SearchDefaults {
    fn default() -> Self {
        SearchDefaults {
            limit: 10,
            max_chars: None,
            with_chunk_text: false,
            include_debug: false,
            stitch_neighbors: false,
            stitch_before: 1,
            stitch_after: 2,
            stitch_use_chunk_text: true,
        }
    }
}

/// Defaults for `rag` requests when the caller omits a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagDefaults {
    pub limit: usize,
    pub context_chars: usize,
    pub include_sources: bool,
    pub with_chunk_text: bool,
    pub include_debug: bool,
    pub min_term_hits: usize,
    pub diversify: bool,
    pub mmr_lambda: f64,
    pub internal_candidates: Option<usize>,
    pub stitch_neighbors: bool,
    pub stitch_before: u64,
    pub stitch_after: u64,
    pub stitch_use_chunk_text: bool,
    pub align_with_search: bool,
    pub adaptive_expand: bool,
    pub require_term_hit: bool,
}

impl Default for RagDefaults {
    fn default() -> Self {
        RagDefaults {
            limit: 5,
            context_chars: 2000,
            include_sources: true,
            with_chunk_text: false,
            include_debug: false,
            min_term_hits: 0,
            diversify: true,
            mmr_lambda: 0.7,
            internal_candidates: None,
            stitch_neighbors: true,
            stitch_before: 2,
            stitch_after: 8,
            stitch_use_chunk_text: true,
            align_with_search: false,
            adaptive_expand: true,
            require_term_hit: true,
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: RAGFUSE_QDRANT__URL=http://qdrant:6333 overrides qdrant.url in ragfuse.toml
    pub fn load() -> Result<Config, RagfuseError> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("ragfuse.toml"))
            .merge(Env::prefixed("RAGFUSE_").split("__"))
            .extract()
            .map_err(|e| RagfuseError::Config(format!("Failed to load config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make scores non-finite or sizing meaningless.
    pub fn validate(&self) -> Result<(), RagfuseError> {
        if self.qdrant.vector_size == 0 {
            return Err(RagfuseError::Config("qdrant.vector_size must be greater than 0".to_string()));
        }
        if let Some((name, _)) = self.weights.float_weights().iter().find(|(_, w)| !w.is_finite()) {
            return Err(RagfuseError::Config(format!("weights.{} must be a finite number", name)));
        }
        if !matches!(self.log_format.as_str(), "auto" | "pretty" | "json") {
            return Err(RagfuseError::Config(format!(
                "log_format must be auto, pretty or json (got '{}')",
                self.log_format
            )));
        }
        let q = &self.qdrant;
        for (name, secs) in [
            ("primary_timeout_secs", q.primary_timeout_secs),
            ("aux_timeout_secs", q.aux_timeout_secs),
            ("stitch_timeout_secs", q.stitch_timeout_secs),
        ] {
            if secs == 0 {
                return Err(RagfuseError::Config(format!("qdrant.{} must be at least 1", name)));
            }
        }
        if self.phrase.max_ngram < 2 {
            return Err(RagfuseError::Config("phrase.max_ngram must be at least 2".to_string()));
        }
        if !(0.0..=1.0).contains(&self.rag.mmr_lambda) {
            return Err(RagfuseError::Config("rag.mmr_lambda must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.qdrant.collection, "latex_books");
        assert_eq!(config.qdrant.vector_size, 384);
        assert_eq!(config.rag.limit, 5);
        assert!(config.rag.require_term_hit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = Config::default();
        config.qdrant.aux_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aux_timeout_secs"));

        let mut config = Config::default();
        config.qdrant.primary_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.qdrant.stitch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = Config::default();
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
        config.log_format = "json".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_internal_limits_clamp() {
        let r = RetrievalConfig::default();
        // 1 * 24 = 24 < min 60
        assert_eq!(r.rag_internal_limit(1), 60);
        // 5 * 24 = 120 within bounds
        assert_eq!(r.rag_internal_limit(5), 120);
        // 20 * 24 = 480 > max 240
        assert_eq!(r.rag_internal_limit(20), 240);
        assert_eq!(r.search_internal_limit(10), 100);
        assert_eq!(r.search_internal_limit(100), 300);
    }

    #[test]
    fn test_validate_rejects_non_finite_weight() {
        let mut config = Config::default();
        config.weights.w_title_match = f64::NAN;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("w_title_match"));
    }

    #[test]
    fn test_validate_rejects_zero_vector_size() {
        let mut config = Config::default();
        config.qdrant.vector_size = 0;
        assert!(matches!(config.validate(), Err(RagfuseError::Config(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::string("[weights]\nw_vector = 2.5\n[rag]\nlimit = 3\n"))
            .extract()
            .unwrap();
        assert_eq!(config.weights.w_vector, 2.5);
        assert_eq!(config.weights.w_exact_source_match, 2.0);
        assert_eq!(config.rag.limit, 3);
        assert_eq!(config.rag.context_chars, 2000);
    }
}
