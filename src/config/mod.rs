// Configuration management module
// TOML settings for the model provider, corpus location and index layout

pub mod settings;


use std::path::PathBuf;

pub use settings::{CONFIG_FILE_NAME, Config, ConfigError, IndexConfig, ProviderConfig};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "NFL_RAG_CONFIG";

/// Load configuration the way the binaries do: `$NFL_RAG_CONFIG` when set,
/// otherwise `nfl-rag.toml` in the working directory, otherwise defaults.
#[inline]
pub fn load_from_env() -> anyhow::Result<Config> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(path) if !path.is_empty() => Config::load_file(PathBuf::from(path)),
        _ => Config::load(std::env::current_dir()?),
    }
}
