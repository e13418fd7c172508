use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("bridge bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("bridge thread failed to start: {0}")]
    Spawn(std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
