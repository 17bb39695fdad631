use blockmesh_config::ConfigError;

/// Errors raised when constructing a [`Mesh`](crate::Mesh).
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The mesh needs at least one node.
    #[error("mesh requires at least one node")]
    NoNodes,
    /// The configuration can never work.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}
