//! 课程工作流的转移表
//!
//! 每个节点对应一条出边：固定后继，或按状态选择的分支（分支可以走向终点）。
//! 引擎循环查表前进，三个回路（Advance→CheckProgress、Repeat→Lecture、RequestNewQuery→Extract）
//! 都只是表中的一条边，不产生递归。

use crate::session::{Decision, SessionState};

use super::types::NodeName;

/// 节点出边
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    To(NodeName),
    Branch(BranchKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    /// CheckExtraction 之后：GeneratePlan | RequestNewQuery
    Extraction,
    /// CheckProgress 之后：Lecture | End
    Progress,
    /// Grade 之后：Advance | Repeat | End，需要进度决策
    Decision,
}

/// 分支选择结果；None 表示到达终点
pub type Target = Option<NodeName>;

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowGraph;

impl WorkflowGraph {
    pub const START: NodeName = NodeName::Extract;

    pub fn edge(&self, node: NodeName) -> Edge {
        use NodeName::*;
        match node {
            Extract => Edge::To(CheckExtraction),
            CheckExtraction => Edge::Branch(BranchKind::Extraction),
            RequestNewQuery => Edge::To(Extract),
            GeneratePlan => Edge::To(CheckProgress),
            CheckProgress => Edge::Branch(BranchKind::Progress),
            Lecture => Edge::To(Quiz),
            Quiz => Edge::To(ProcessQuizAnswers),
            ProcessQuizAnswers => Edge::To(Assignment),
            Assignment => Edge::To(Grade),
            Grade => Edge::Branch(BranchKind::Decision),
            Advance => Edge::To(CheckProgress),
            Repeat => Edge::To(Lecture),
        }
    }

    /// 所有可能的后继，用于检查表的完整性
    pub fn successors(&self, node: NodeName) -> Vec<Target> {
        match self.edge(node) {
            Edge::To(next) => vec![Some(next)],
            Edge::Branch(BranchKind::Extraction) => {
                vec![Some(NodeName::GeneratePlan), Some(NodeName::RequestNewQuery)]
            }
            Edge::Branch(BranchKind::Progress) => vec![Some(NodeName::Lecture), None],
            Edge::Branch(BranchKind::Decision) => {
                vec![Some(NodeName::Advance), Some(NodeName::Repeat), None]
            }
        }
    }
}

pub fn route_extraction(state: &SessionState) -> Target {
    if state.has_valid_topic() {
        Some(NodeName::GeneratePlan)
    } else {
        Some(NodeName::RequestNewQuery)
    }
}

pub fn route_progress(state: &SessionState) -> Target {
    if state.completed {
        None
    } else {
        Some(NodeName::Lecture)
    }
}

pub fn route_decision(decision: Decision) -> Target {
    match decision {
        Decision::Advance => Some(NodeName::Advance),
        Decision::Repeat => Some(NodeName::Repeat),
    }
}
