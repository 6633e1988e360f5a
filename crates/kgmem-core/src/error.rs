use thiserror::Error;

/// Errors raised while assembling process-level state.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
