//! Supervisor error types.

use std::io;

use thiserror::Error;

use sitewatch_core::{ConfigError, UrlError};
use sitewatch_state::StateError;

pub type SupervisorResult<T> = Result<T, SupervisorError>;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid target URL: {0}")]
    Validation(#[from] UrlError),

    #[error("invalid job config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("failed to signal process {pid}: {source}")]
    ProcessControl {
        pid: u32,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn monitor process: {0}")]
    Spawn(#[source] io::Error),

    #[error(transparent)]
    State(#[from] StateError),
}
