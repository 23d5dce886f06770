//! Process-wide configuration.
//!
//! Loaded once at startup: a `universalis.{toml,yaml}` file (optional)
//! layered under `UNIVERSALIS_`-prefixed environment variables, e.g.
//! `UNIVERSALIS_SIMULATION__TICK_INTERVAL_MS=250`. Every field has a
//! serde default so a bare process still starts.

use std::path::PathBuf;

use serde::Deserialize;

/// Configuration loading failures. These are the only errors treated
/// as fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file or environment failed to parse.
    #[error("configuration error: {source}")]
    Load {
        /// The underlying error.
        #[from]
        source: config::ConfigError,
    },
}

/// State-store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    pub path: PathBuf,
    /// Open the store read-only (no schema creation, no writes).
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/universalis.db"),
            read_only: false,
        }
    }
}

/// Memory-bank configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Logical table name for this simulation's memories.
    pub table_name: String,
    /// Embedding dimension for the hash-seeded development embedder.
    pub embedding_dim: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            table_name: String::from("memories"),
            embedding_dim: 384,
        }
    }
}

/// Language-model configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model name.
    pub model: String,
    /// API key. Empty selects the scripted offline backend.
    pub api_key: String,
    /// Default sampling temperature.
    pub temperature: f64,
    /// Embedding model name; `None` selects the hash-seeded embedder.
    pub embedding_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://openrouter.ai/api/v1"),
            model: String::from("openrouter/auto"),
            api_key: String::new(),
            temperature: 0.7,
            embedding_model: None,
        }
    }
}

/// Simulation-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation identifier; all storage is namespaced by it.
    pub simulation_id: String,
    /// Sleep between ticks in the run loop, in milliseconds.
    pub tick_interval_ms: u64,
    /// Start the run loop immediately after wiring.
    pub auto_run: bool,
    /// Perception radius around each actor, in degrees.
    pub perception_radius: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simulation_id: String::from("Alpha_Scenario"),
            tick_interval_ms: 1000,
            auto_run: false,
            perception_radius: 0.1,
        }
    }
}

/// The complete process configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct UniversalisConfig {
    /// State-store settings.
    pub store: StoreConfig,
    /// Memory-bank settings.
    pub memory: MemoryConfig,
    /// Language-model settings.
    pub llm: LlmConfig,
    /// Simulation settings.
    pub simulation: SimulationConfig,
}

impl UniversalisConfig {
    /// Load configuration from `universalis.{toml,yaml}` (optional) and
    /// `UNIVERSALIS_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source fails to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("universalis")
    }

    /// Load configuration with an explicit file stem (used by tests).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source fails to parse.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("UNIVERSALIS").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = UniversalisConfig::default();
        assert_eq!(cfg.simulation.simulation_id, "Alpha_Scenario");
        assert_eq!(cfg.simulation.tick_interval_ms, 1000);
        assert!((cfg.simulation.perception_radius - 0.1).abs() < f64::EPSILON);
        assert!(!cfg.store.read_only);
        assert_eq!(cfg.memory.embedding_dim, 384);
        assert!(cfg.llm.embedding_model.is_none());
    }

    #[test]
    fn partial_toml_overlays_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [simulation]
                simulation_id = "Bravo"
                tick_interval_ms = 250

                [llm]
                model = "test-model"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let cfg: UniversalisConfig = settings.try_deserialize().unwrap();
        assert_eq!(cfg.simulation.simulation_id, "Bravo");
        assert_eq!(cfg.simulation.tick_interval_ms, 250);
        assert_eq!(cfg.llm.model, "test-model");
        // Untouched sections keep their defaults.
        assert_eq!(cfg.memory.table_name, "memories");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = UniversalisConfig::load_from("definitely_not_a_real_config_stem").unwrap();
        assert_eq!(cfg, UniversalisConfig::default());
    }
}
