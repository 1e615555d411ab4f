use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};

/// Root configuration tree for a forgemesh-core [`crate::Runtime`].
///
/// Loaded by layering defaults, an optional TOML file, and `FORGEMESH_*`
/// environment variables (in that order of increasing precedence) through
/// the `config` crate, mirroring how the teacher composes `Config::load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    pub registry: RegistryConfig,
    pub pool: PoolConfig,
    pub kv_store: KvStoreConfig,
    pub coordinator: CoordinatorConfig,
    pub agent_defaults: AgentDefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Soft cap on concurrently-running agents. Exceeding it only logs a
    /// warning; creation still proceeds (spec §4.5).
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Worker thread count. `0` means "detect CPU count, fall back to 2"
    /// (spec §4.1).
    pub worker_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvStoreConfig {
    /// Number of hash buckets backing the shared store (spec §4.2).
    pub bucket_count: usize,
    /// Optional path the store is serialized to on `save`/dispose.
    pub persistence_path: Option<String>,
}

/// Arbitration outcome the coordinator falls back to.
///
/// Stored on [`CoordinatorConfig`] but, per spec §9's documented quirk,
/// never consulted: `Coordinator::resolve_conflict` hard-codes
/// [`crate::coordinator::Resolution::Agent1`] as the no-callback default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultResolution {
    Agent1,
    Agent2,
    Both,
    Neither,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    pub default_resolution: DefaultResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaultsConfig {
    pub timeout_secs: u64,
    pub verbosity: u8,
    pub mock_mode: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                max_concurrent: crate::constants::DEFAULT_MAX_CONCURRENT_AGENTS,
            },
            pool: PoolConfig { worker_count: 0 },
            kv_store: KvStoreConfig {
                bucket_count: crate::constants::DEFAULT_KV_BUCKET_COUNT,
                persistence_path: None,
            },
            coordinator: CoordinatorConfig {
                default_resolution: DefaultResolution::Agent1,
            },
            agent_defaults: AgentDefaultsConfig {
                timeout_secs: crate::constants::DEFAULT_TASK_TIMEOUT_SECS,
                verbosity: 1,
                mock_mode: false,
            },
        }
    }
}

impl ForgeConfig {
    /// Load configuration from an optional TOML file overlaid with
    /// `FORGEMESH_*` environment variables, falling back to
    /// [`ForgeConfig::default`] for anything unset.
    pub fn load(file_path: Option<&str>) -> Result<Self> {
        let defaults = ForgeConfig::default();

        let mut builder = config::Config::builder().add_source(
            config::Config::try_from(&defaults).map_err(ForgeError::Config)?,
        );

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("FORGEMESH")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().map_err(ForgeError::Config)?;
        settings
            .try_deserialize()
            .map_err(ForgeError::Config)
            .or_else(|_| Ok(defaults))
    }
}

#[cfg(test)]
mod tests;
