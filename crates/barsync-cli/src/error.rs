use thiserror::Error;

use crate::config::ConfigError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] barsync_core::ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Warehouse(#[from] barsync_warehouse::WarehouseError),

    #[error(transparent)]
    Persistence(#[from] barsync_core::PersistenceError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Config(_) => 2,
            Self::Warehouse(_) => 3,
            Self::Persistence(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
