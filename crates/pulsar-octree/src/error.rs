//! Load error taxonomy.

/// Errors produced while fetching or decoding a node's point payload.
///
/// Load failures are sticky: the owning node is marked failed and its
/// subtree is skipped on subsequent frames rather than retried.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Failed to read the payload from disk or network.
    #[error("failed to read point data: {0}")]
    Io(#[from] std::io::Error),

    /// The source does not understand this point cloud format.
    /// Raised before any traversal state is created.
    #[error("unsupported point cloud format: {0}")]
    UnsupportedFormat(String),

    /// The payload bytes could not be decoded.
    #[error("failed to decode point data: {0}")]
    Decode(String),

    /// The decoded payload disagrees with the node's metadata.
    /// Accepting it would corrupt point budget accounting.
    #[error("payload contained {actual} points, metadata advertised {expected}")]
    PointCountMismatch { expected: u64, actual: u64 },
}
