use std::path::PathBuf;

/// Errors that abort a manifest run.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Reading or writing a local file failed.
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory walk hit an unreadable entry.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Transport-level failure talking to the link provider.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered successfully but without a usable link.
    #[error("no share link returned for {path}")]
    EmptyUrl { path: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The credential file is missing or holds no token.
    #[error("missing credential in {path:?}")]
    MissingCredential { path: PathBuf },
}

impl LinkError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LinkError::Io {
            path: path.into(),
            source,
        }
    }
}
