use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing persisted artifacts.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index blob did not decode.
    #[error("corrupt index blob: {0}")]
    Decode(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported index version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}
