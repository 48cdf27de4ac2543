use crate::NodeId;

/// Structural errors raised by the plan arena, the registry and the
/// persistence layer. Failures raised by a callable are never wrapped in
/// this type; they travel up as the callable produced them.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("node {0} does not exist in this plan")]
    UnknownNode(NodeId),

    #[error("function '{0}' is not registered")]
    FunctionNotFound(String),

    #[error("function '{0}' is already registered")]
    DuplicateFunction(String),

    #[error("function '{0}' was cancelled")]
    Cancelled(String),

    #[error("step '{name}' binds a function and also has {children} child steps")]
    MixedNode { name: String, children: usize },

    #[error("cursor {cursor} is out of range for step '{name}' ({len} children)")]
    CursorOutOfRange {
        name: String,
        cursor: usize,
        len: usize,
    },

    #[error("step '{0}' declares an empty output name")]
    EmptyOutputName(String),
}
