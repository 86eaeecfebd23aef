//! 暂停边界表：哪些节点在执行前 / 执行后停下等待学员输入

use crate::session::{InputType, SessionState};

use super::types::NodeName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptRule {
    pub pause_before: bool,
    pub pause_after: bool,
    pub reason: &'static str,
}

const QUIZ: InterruptRule = InterruptRule {
    pause_before: false,
    pause_after: true,
    reason: "quiz generated, waiting for the learner's answers",
};

const ASSIGNMENT: InterruptRule = InterruptRule {
    pause_before: false,
    pause_after: true,
    reason: "assignment issued, waiting for the learner's submission",
};

const NEW_QUERY: InterruptRule = InterruptRule {
    pause_before: true,
    pause_after: false,
    reason: "topic not detected, waiting for a new request",
};

#[derive(Debug, Clone, Copy, Default)]
pub struct InterruptController;

impl InterruptController {
    pub fn rule(&self, node: NodeName) -> Option<InterruptRule> {
        match node {
            NodeName::Quiz => Some(QUIZ),
            NodeName::Assignment => Some(ASSIGNMENT),
            NodeName::RequestNewQuery => Some(NEW_QUERY),
            _ => None,
        }
    }

    pub fn pause_before(&self, node: NodeName) -> bool {
        self.rule(node).is_some_and(|r| r.pause_before)
    }

    pub fn pause_after(&self, node: NodeName) -> bool {
        self.rule(node).is_some_and(|r| r.pause_after)
    }

    /// 暂停原因（日志用）；不在暂停表中的节点为空串
    pub fn reason(&self, node: NodeName) -> &'static str {
        self.rule(node).map_or("", |r| r.reason)
    }

    /// 在 node 边界暂停时需要的输入
    pub fn input_type(&self, node: NodeName, state: &SessionState) -> InputType {
        match node {
            NodeName::Quiz => InputType::Quiz,
            NodeName::Assignment => InputType::Assignment,
            NodeName::RequestNewQuery if state.query.trim().is_empty() => InputType::NewQuery,
            NodeName::RequestNewQuery => InputType::ExtractionRetry,
            _ => InputType::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_table() {
        let ctl = InterruptController;
        for node in NodeName::ALL {
            let expected_after = matches!(node, NodeName::Quiz | NodeName::Assignment);
            assert_eq!(ctl.pause_after(node), expected_after, "{node}");
            assert_eq!(ctl.pause_before(node), node == NodeName::RequestNewQuery, "{node}");
        }
    }

    #[test]
    fn test_new_query_input_type() {
        let ctl = InterruptController;
        let state = SessionState::default();
        assert_eq!(ctl.input_type(NodeName::RequestNewQuery, &state), InputType::NewQuery);
        let state = SessionState::from_query("blah");
        assert_eq!(
            ctl.input_type(NodeName::RequestNewQuery, &state),
            InputType::ExtractionRetry
        );
    }

    #[test]
    fn test_every_pause_has_a_reason() {
        let ctl = InterruptController;
        for node in NodeName::ALL {
            let pauses = ctl.pause_before(node) || ctl.pause_after(node);
            assert_eq!(!ctl.reason(node).is_empty(), pauses, "{node}");
        }
    }
}
