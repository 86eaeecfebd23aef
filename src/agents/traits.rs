//! 外部协作方接口：内容生成、简答题评判、自由文本抽取
//!
//! 工作流节点只通过这些 trait 调用外部能力；实现可以是 LLM、离线模板或测试替身。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::core::GenerationError;
use crate::session::{
    AdvanceMessage, Assignment, ExtractedQuery, GradingResult, LearningPlan, Lecture,
    ProgressDecision, Quiz, RepeatMessage,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LectureParams {
    pub lesson_title: String,
    pub objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    /// 如 "Lesson 2 of 5"
    pub current_knowledge: String,
    /// 上一轮暴露的弱项，重学时用于针对性讲解
    pub weak_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizParams {
    pub lesson_title: String,
    pub objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    pub lecture_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentParams {
    pub lesson_title: String,
    pub objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    /// 如 "Quiz score: 60%, Weak areas: ..."
    pub quiz_performance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingParams {
    pub assignment_title: String,
    pub steps: Vec<String>,
    pub criteria: Vec<String>,
    pub submission: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressParams {
    pub topic: String,
    pub lesson_title: String,
    pub lesson_number: usize,
    pub total_lessons: usize,
    pub quiz_score: u32,
    pub assignment_score: u32,
    pub weak_points: Vec<String>,
    pub attempt_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepeatParams {
    pub lesson_title: String,
    pub weak_points: Vec<String>,
    /// 即将开始的这一次尝试的序号
    pub attempt_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvanceParams {
    pub completed_lesson: String,
    /// 最后一课时为 "Course Completion"
    pub next_lesson: String,
    pub key_takeaways: Vec<String>,
}

/// 内容生成器：每种课程内容一个操作，返回已校验的结构化对象或 GenerationError
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_plan(
        &self,
        topic: &str,
        background: &str,
    ) -> Result<LearningPlan, GenerationError>;

    async fn generate_lecture(&self, params: &LectureParams) -> Result<Lecture, GenerationError>;

    async fn generate_quiz(&self, params: &QuizParams) -> Result<Quiz, GenerationError>;

    async fn generate_assignment(
        &self,
        params: &AssignmentParams,
    ) -> Result<Assignment, GenerationError>;

    async fn grade_assignment(
        &self,
        params: &GradingParams,
    ) -> Result<GradingResult, GenerationError>;

    async fn decide_progress(
        &self,
        params: &ProgressParams,
    ) -> Result<ProgressDecision, GenerationError>;

    async fn repeat_message(&self, params: &RepeatParams)
        -> Result<RepeatMessage, GenerationError>;

    async fn advance_message(
        &self,
        params: &AdvanceParams,
    ) -> Result<AdvanceMessage, GenerationError>;
}

/// 简答题评判：返回「是否体现了足够理解」，评分器将其视为事实
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    async fn evaluate_short_answer(
        &self,
        question: &str,
        key_points: &[String],
        answer: &str,
    ) -> Result<bool, GenerationError>;
}

/// 自由文本抽取：仅在对话式传输下使用
#[async_trait]
pub trait AnswerExtractor: Send + Sync {
    /// 识别失败时 topic / background 均为 "failed to detect"
    async fn extract_topic(&self, raw_query: &str) -> Result<ExtractedQuery, GenerationError>;

    async fn extract_quiz_answers(
        &self,
        raw_text: &str,
        quiz_description: &str,
    ) -> Result<BTreeMap<usize, String>, GenerationError>;

    async fn extract_assignment_submission(
        &self,
        raw_text: &str,
        assignment_description: &str,
    ) -> Result<String, GenerationError>;
}
