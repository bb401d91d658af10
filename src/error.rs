use std::path::PathBuf;

use thiserror::Error;

use crate::cache::NfpKey;

/// Errors surfaced by a nesting session.
#[derive(Error, Debug)]
pub enum NestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A placement looked up a fit polygon that was never computed.
    /// This is a contract violation, not a recoverable condition.
    #[error("no cached fit polygon for {0}")]
    CacheMiss(NfpKey),

    #[error("failed to build worker pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to read image {path}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("no opaque outline found in {path}")]
    EmptyOutline { path: PathBuf },
}
