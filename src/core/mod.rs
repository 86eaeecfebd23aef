//! 核心层：错误与恢复、会话视图投影、会话监管

pub mod error;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use error::{GenerationError, RecoveryAction, WorkflowError};
pub use recovery::RecoveryEngine;
pub use session_supervisor::{SessionGuard, SessionSupervisor};
pub use state::{SessionView, StageContent};
