use crate::{ModuleId, ModuleIdError};

/// Errors raised by graph construction and queries.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Invalid module id.
    #[error(transparent)]
    InvalidModuleId(#[from] ModuleIdError),

    /// A query named a module that is not in the graph.
    #[error("module '{0}' is not in the graph")]
    UnknownModule(ModuleId),

    /// A node with the same id was already inserted.
    #[error("duplicate module '{0}'")]
    DuplicateModule(ModuleId),

    /// Failed to serialize a graph description.
    #[error("failed to serialize graph: {0}")]
    Serialization(String),
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
