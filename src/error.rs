use std::path::PathBuf;
use thiserror::Error;

/// The external recognizer failed. The loop controller degrades this to
/// "no candidate" instead of propagating it.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("spawning recognizer `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("recognizer exited with {status}: {stderr}")]
    Failed {
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("invalid candidate output: {0}")]
    InvalidOutput(#[from] serde_json::Error),
    #[error("candidate rejected: {0}")]
    InvalidCandidate(String),
    #[error("writing frame for recognizer: {0}")]
    FrameIo(#[from] std::io::Error),
    #[error("encoding frame: {0}")]
    FrameEncode(#[from] image::ImageError),
}

/// Frame acquisition failed at the device/spool level.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("reading frame spool {path}: {source}")]
    Spool {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Registry or ledger storage failure. Fatal when opening, recoverable
/// when appending a ledger entry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("opening store at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },
    #[error("store query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
