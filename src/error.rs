//! Error taxonomy for archive decomposition and profile decoding.
//!
//! A missing profile match is not represented here as a fault: the matching
//! engine returns `None` and the CLI decides how to report it.
use std::path::{Path, PathBuf};

/// Errors raised while reading signing artifacts from disk.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// A required manifest, profile or bundle is missing.
    #[error("{what} not found at {}", path.display())]
    NotFound { what: &'static str, path: PathBuf },
    /// A manifest or profile exists but its content is malformed.
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    /// The filesystem refused a read or directory listing.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// No profile in the archive carries a team identifier.
    #[error("team id not found")]
    TeamIdNotFound,
    /// Profiles embedded in the archive belong to more than one team.
    #[error("archive profiles belong to multiple teams: {}", .0.join(", "))]
    AmbiguousTeamId(Vec<String>),
    /// No local profile can sign the given bundle ID.
    #[error("no local provisioning profile matches {bundle_id}")]
    NoMatch { bundle_id: String },
}

impl SigningError {
    pub fn not_found(what: &'static str, path: &Path) -> Self {
        SigningError::NotFound {
            what,
            path: path.to_path_buf(),
        }
    }

    pub fn parse(path: &Path, message: impl Into<String>) -> Self {
        SigningError::Parse {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        SigningError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = SigningError> = std::result::Result<T, E>;
