//! 课程工作流：转移表、暂停边界、节点实现与执行引擎

pub mod builder;
pub mod engine;
pub mod graph;
pub mod interrupt;
pub mod nodes;
pub mod types;

pub use builder::{Collaborators, EngineBuilder};
pub use engine::WorkflowEngine;
pub use graph::{BranchKind, Edge, WorkflowGraph};
pub use interrupt::{InterruptController, InterruptRule};
pub use types::{Cursor, NodeName, RunOutcome};
