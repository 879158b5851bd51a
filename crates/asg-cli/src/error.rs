//! CLI error type and exit-code mapping.

use asg_core::config::ConfigError;
use asg_core::{CoreError, SchemaError};
use asg_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write JSON output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("graph failed verification with {issues} issue(s)")]
    VerifyFailed { issues: usize },
}

impl CliError {
    /// Exit code: 1 = usage or data error, 3 = I/O error.
    pub fn exit_code(&self) -> i32 {
        let io = match self {
            CliError::Storage(e) => e.is_io(),
            CliError::Schema(SchemaError::Io(_)) => true,
            CliError::Config(ConfigError::Io(_)) => true,
            _ => false,
        };
        if io {
            3
        } else {
            1
        }
    }
}
