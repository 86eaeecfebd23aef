//! 会话状态：一次学习过程的唯一可变聚合
//!
//! 只由工作流节点修改；每个节点完成后整体写入检查点。课时产物（讲义、测验、作业、评分、作答）
//! 在 advance / repeat 时一并清空。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::models::{
    Assignment, GradingResult, LearningPlan, Lecture, Lesson, ProgressDecision, Quiz, UNDETECTED,
};

/// 背景为空时的显式默认值
pub const DEFAULT_BACKGROUND: &str = "No background provided";

/// 暂停时等待的输入类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    None,
    Quiz,
    Assignment,
    /// 提交过请求但未识别出主题/背景
    ExtractionRetry,
    /// 从未提供过请求
    NewQuery,
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InputType::None => "none",
            InputType::Quiz => "quiz",
            InputType::Assignment => "assignment",
            InputType::ExtractionRetry => "extraction_retry",
            InputType::NewQuery => "new_query",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// 对话模式下学员的原始请求
    pub query: String,
    pub topic: String,
    pub background: String,
    pub learning_plan: Option<LearningPlan>,
    /// 0 ≤ current_lesson_index ≤ lessons.len()；等于 len 即全部完成
    pub current_lesson_index: usize,
    pub lecture: Option<Lecture>,
    pub quiz: Option<Quiz>,
    /// 题号（0 起）→ 学员答案
    pub quiz_answers: BTreeMap<usize, String>,
    pub assignment: Option<Assignment>,
    pub assignment_submission: String,
    pub grading_result: Option<GradingResult>,
    pub quiz_score: u32,
    pub assignment_score: u32,
    pub weak_points: Vec<String>,
    pub attempt_count: u32,
    pub message: String,
    pub last_decision: Option<ProgressDecision>,
    pub waiting_for_input: bool,
    pub input_type: InputType,
    pub completed: bool,
}

impl SessionState {
    /// 直接给定主题与背景的会话；背景为空时使用默认描述
    pub fn with_topic(topic: impl Into<String>, background: impl Into<String>) -> Self {
        let background = background.into();
        Self {
            topic: topic.into(),
            background: if background.trim().is_empty() {
                DEFAULT_BACKGROUND.to_string()
            } else {
                background
            },
            ..Self::default()
        }
    }

    /// 对话模式：由 Extract 节点从原始请求中抽取主题与背景
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// 主题与背景都已识别（非空且不是哨兵值）
    pub fn has_valid_topic(&self) -> bool {
        let valid = |s: &str| {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case(UNDETECTED)
        };
        valid(&self.topic) && valid(&self.background)
    }

    pub fn lesson_count(&self) -> usize {
        self.learning_plan.as_ref().map_or(0, |p| p.lessons.len())
    }

    pub fn is_plan_exhausted(&self) -> bool {
        self.current_lesson_index >= self.lesson_count()
    }

    pub fn current_lesson(&self) -> Option<&Lesson> {
        self.learning_plan
            .as_ref()
            .and_then(|p| p.lessons.get(self.current_lesson_index))
    }

    pub fn next_lesson(&self) -> Option<&Lesson> {
        self.learning_plan
            .as_ref()
            .and_then(|p| p.lessons.get(self.current_lesson_index + 1))
    }

    pub fn has_active_quiz(&self) -> bool {
        self.quiz.is_some()
    }

    pub fn has_active_assignment(&self) -> bool {
        self.assignment.is_some()
    }

    /// 清空当前课时的全部产物（advance / repeat 共用）
    pub fn clear_lesson_artifacts(&mut self) {
        self.lecture = None;
        self.quiz = None;
        self.quiz_answers.clear();
        self.assignment = None;
        self.assignment_submission.clear();
        self.grading_result = None;
    }

    /// 进入下一课：清空产物、尝试次数归零、弱项清空、索引 +1
    pub fn advance(&mut self) {
        self.clear_lesson_artifacts();
        self.attempt_count = 0;
        self.weak_points.clear();
        self.current_lesson_index += 1;
    }

    /// 重学本课：清空产物、尝试次数 +1；保留弱项供下一次讲义使用
    pub fn repeat(&mut self) {
        self.clear_lesson_artifacts();
        self.attempt_count += 1;
    }

    pub fn set_paused(&mut self, input_type: InputType) {
        self.waiting_for_input = true;
        self.input_type = input_type;
    }

    pub fn clear_pause(&mut self) {
        self.waiting_for_input = false;
        self.input_type = InputType::None;
    }
}

/// 恢复执行时合并进状态的学员输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub quiz_answers: Option<BTreeMap<usize, String>>,
    pub assignment_submission: Option<String>,
    pub query: Option<String>,
}

impl SessionPatch {
    pub fn quiz(answers: BTreeMap<usize, String>) -> Self {
        Self {
            quiz_answers: Some(answers),
            ..Self::default()
        }
    }

    pub fn assignment(submission: impl Into<String>) -> Self {
        Self {
            assignment_submission: Some(submission.into()),
            ..Self::default()
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// 补丁是否提供了当前暂停所需的字段；新请求不能为空白
    pub fn satisfies(&self, input_type: InputType) -> bool {
        match input_type {
            InputType::Quiz => self.quiz_answers.is_some(),
            InputType::Assignment => self.assignment_submission.is_some(),
            InputType::ExtractionRetry | InputType::NewQuery => {
                self.query.as_deref().is_some_and(|q| !q.trim().is_empty())
            }
            InputType::None => false,
        }
    }

    pub fn apply(self, state: &mut SessionState) {
        if let Some(answers) = self.quiz_answers {
            state.quiz_answers = answers;
        }
        if let Some(submission) = self.assignment_submission {
            state.assignment_submission = submission;
        }
        if let Some(query) = self.query {
            state.query = query;
        }
    }
}
