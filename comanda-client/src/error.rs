//! Client error types

use shared::RemoteError;
use thiserror::Error;

/// Step of a multi-write flow that failed
///
/// Everything before the named stage already committed remotely; callers
/// use this to recover deliberately instead of retrying blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStage {
    /// `occupy`: the session was created but the table write failed,
    /// leaving an orphaned active session
    AttachSessionToTable,
    /// `free`: marking the session's orders as paid failed
    MarkOrdersPaid,
    /// `free`: orders are paid but the session close failed
    CloseSession,
    /// `free`: the session is closed but the table write failed
    FreeTable,
}

impl std::fmt::Display for FlowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlowStage::AttachSessionToTable => "attach session to table",
            FlowStage::MarkOrdersPaid => "mark orders paid",
            FlowStage::CloseSession => "close session",
            FlowStage::FreeTable => "free table",
        };
        f.write_str(name)
    }
}

/// Controller error type
#[derive(Debug, Error)]
pub enum FlowError {
    /// Invariant violated before any remote call was attempted
    #[error("validation error: {0}")]
    Validation(String),

    /// The remote collaborator rejected the triggering operation
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// A multi-write flow stopped partway; earlier writes are committed
    /// and optimistic state is NOT rolled back
    #[error("flow interrupted at '{stage}': {source}")]
    Interrupted {
        stage: FlowStage,
        source: RemoteError,
    },

    /// A service response failed to decode into its typed entity
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for controller operations
pub type FlowResult<T> = Result<T, FlowError>;
