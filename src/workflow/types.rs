//! 工作流类型定义
//!
//! 节点名、引擎游标、单次运行结果

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::{InputType, SessionState};

/// 课程工作流中的节点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeName {
    Extract,
    CheckExtraction,
    RequestNewQuery,
    GeneratePlan,
    CheckProgress,
    Lecture,
    Quiz,
    ProcessQuizAnswers,
    Assignment,
    Grade,
    Advance,
    Repeat,
}

impl NodeName {
    pub const ALL: [NodeName; 12] = [
        NodeName::Extract,
        NodeName::CheckExtraction,
        NodeName::RequestNewQuery,
        NodeName::GeneratePlan,
        NodeName::CheckProgress,
        NodeName::Lecture,
        NodeName::Quiz,
        NodeName::ProcessQuizAnswers,
        NodeName::Assignment,
        NodeName::Grade,
        NodeName::Advance,
        NodeName::Repeat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeName::Extract => "extract",
            NodeName::CheckExtraction => "check_extraction",
            NodeName::RequestNewQuery => "request_new_query",
            NodeName::GeneratePlan => "generate_plan",
            NodeName::CheckProgress => "check_progress",
            NodeName::Lecture => "lecture",
            NodeName::Quiz => "quiz",
            NodeName::ProcessQuizAnswers => "process_quiz_answers",
            NodeName::Assignment => "assignment",
            NodeName::Grade => "grade",
            NodeName::Advance => "advance",
            NodeName::Repeat => "repeat",
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 引擎在图中的位置，随状态一起写入检查点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", content = "node", rename_all = "snake_case")]
pub enum Cursor {
    /// 节点尚未执行
    Enter(NodeName),
    /// 节点已提交，出边尚未选择
    Exit(NodeName),
    /// 已到达终点
    Finished,
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Enter(node) => write!(f, "enter:{node}"),
            Cursor::Exit(node) => write!(f, "exit:{node}"),
            Cursor::Finished => f.write_str("finished"),
        }
    }
}

/// start / resume / proceed 的结果：要么停在暂停边界，要么走完全部课程
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Paused {
        input_type: InputType,
        state: SessionState,
    },
    Completed {
        state: SessionState,
    },
}

impl RunOutcome {
    pub fn state(&self) -> &SessionState {
        match self {
            RunOutcome::Paused { state, .. } | RunOutcome::Completed { state } => state,
        }
    }

    pub fn into_state(self) -> SessionState {
        match self {
            RunOutcome::Paused { state, .. } | RunOutcome::Completed { state } => state,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }

    pub fn input_type(&self) -> InputType {
        match self {
            RunOutcome::Paused { input_type, .. } => *input_type,
            RunOutcome::Completed { .. } => InputType::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_serde_shape() {
        let json = serde_json::to_string(&Cursor::Exit(NodeName::ProcessQuizAnswers)).unwrap();
        assert_eq!(json, r#"{"at":"exit","node":"process_quiz_answers"}"#);
        let back: Cursor = serde_json::from_str(r#"{"at":"finished"}"#).unwrap();
        assert_eq!(back, Cursor::Finished);
    }

    #[test]
    fn test_node_display_matches_serde() {
        for node in NodeName::ALL {
            let json = serde_json::to_string(&node).unwrap();
            assert_eq!(json, format!("\"{node}\""));
        }
    }
}
