//! Persistence error for shard output

use std::path::PathBuf;

/// Error from writing one output shard.
///
/// Fatal for the target being written, never for the whole run.
#[derive(Debug)]
pub enum ShardError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Encode(serde_json::Error),
}

impl std::fmt::Display for ShardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "IO on {}: {source}", path.display()),
            Self::Encode(e) => write!(f, "JSON encode: {e}"),
        }
    }
}

impl std::error::Error for ShardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
        }
    }
}

impl ShardError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Disk full: every later shard will fail the same way
    pub fn is_storage_full(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::StorageFull)
    }
}

impl From<serde_json::Error> for ShardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Encode(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn display_io_includes_path() {
        let err = ShardError::io(
            "out/a_b_1.json",
            std::io::Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        let msg = format!("{err}");
        assert!(msg.contains("out/a_b_1.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn storage_full_detected() {
        let full = ShardError::io("x", std::io::Error::new(ErrorKind::StorageFull, "full"));
        assert!(full.is_storage_full());
        let other = ShardError::io("x", std::io::Error::other("boom"));
        assert!(!other.is_storage_full());
    }

    #[test]
    fn encode_error_has_source() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ShardError::from(json_err);
        assert!(std::error::Error::source(&err).is_some());
        assert!(format!("{err}").starts_with("JSON encode"));
    }
}
