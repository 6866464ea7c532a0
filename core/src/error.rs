use thiserror::Error;

/// Failures of the persistent index. Only errors raised while opening the
/// store are fatal to a run; everything else is reported per operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("meta error: {0}")]
    Meta(#[from] serde_json::Error),

    #[error("store schema version {found} does not match supported version {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("corrupt entry in tree `{0}`")]
    Corrupt(&'static str),
}
