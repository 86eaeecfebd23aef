//! 答案评分：按题型确定性比对，得出分数与弱项
//!
//! - 单选：两侧 trim + 大写后精确匹配
//! - 判断：学员答案 trim + 小写后等于 "true" 即为 true，与标准答案比较
//! - 简答：交给 AnswerEvaluator，判定结果视为事实
//! - 未知题型：记为错误并打日志，不报错
//!
//! 分数 = floor(100 × 答对数 / 总题数)，总题数为 0 时为 0。

use std::collections::BTreeMap;

use crate::agents::AnswerEvaluator;
use crate::core::GenerationError;
use crate::session::{GradingResult, QuestionKind, Quiz};

/// 弱项截取的题干长度（字符）
pub const WEAK_POINT_CHARS: usize = 50;
/// 弱项最多保留条数
pub const MAX_WEAK_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
    pub score: u32,
    pub weak_points: Vec<String>,
}

pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100 * correct / total) as u32
}

pub fn match_multiple_choice(answer: &str, correct: &str) -> bool {
    answer.trim().to_uppercase() == correct.trim().to_uppercase()
}

pub fn match_true_false(answer: &str, correct: bool) -> bool {
    (answer.trim().to_lowercase() == "true") == correct
}

fn weak_point(question: &str) -> String {
    question.chars().take(WEAK_POINT_CHARS).collect()
}

/// 空白提交（空串或全是空白）
pub fn is_blank_submission(submission: &str) -> bool {
    submission.trim().is_empty()
}

/// 评分结果中的分数转为 0-100 整数（截断小数）
pub fn grading_score(result: &GradingResult) -> u32 {
    result.score.clamp(0.0, 100.0) as u32
}

/// 评分结果中的弱项，最多保留前 3 条
pub fn grading_weak_points(result: &GradingResult) -> Vec<String> {
    result
        .weak_points
        .iter()
        .take(MAX_WEAK_POINTS)
        .cloned()
        .collect()
}

pub struct AnswerScorer<'a> {
    evaluator: &'a dyn AnswerEvaluator,
}

impl<'a> AnswerScorer<'a> {
    pub fn new(evaluator: &'a dyn AnswerEvaluator) -> Self {
        Self { evaluator }
    }

    /// 按题号取学员答案逐题判分；缺失的答案按空串处理。
    /// 一个答案都没有时直接记 0 分，不调用简答题评判。
    pub async fn score_quiz(
        &self,
        quiz: &Quiz,
        answers: &BTreeMap<usize, String>,
    ) -> Result<QuizScore, GenerationError> {
        let total = quiz.questions.len();

        if answers.is_empty() {
            tracing::warn!(questions = total, "no quiz answers submitted, scoring 0");
            return Ok(QuizScore {
                correct: 0,
                total,
                score: 0,
                weak_points: quiz
                    .questions
                    .iter()
                    .take(MAX_WEAK_POINTS)
                    .map(|q| weak_point(&q.question))
                    .collect(),
            });
        }

        let mut correct = 0;
        let mut weak_points = Vec::new();
        for (i, question) in quiz.questions.iter().enumerate() {
            let answer = answers.get(&i).map(String::as_str).unwrap_or("");
            let is_correct = match &question.kind {
                QuestionKind::MultipleChoice { correct_answer, .. } => {
                    match_multiple_choice(answer, correct_answer)
                }
                QuestionKind::TrueFalse { correct_answer } => {
                    match_true_false(answer, *correct_answer)
                }
                QuestionKind::ShortAnswer { key_points, .. } => {
                    self.evaluator
                        .evaluate_short_answer(&question.question, key_points, answer)
                        .await?
                }
                QuestionKind::Unsupported => {
                    tracing::warn!(index = i, "unsupported question type counted as incorrect");
                    false
                }
            };
            tracing::debug!(index = i, kind = question.kind.label(), is_correct, "question scored");

            if is_correct {
                correct += 1;
            } else if weak_points.len() < MAX_WEAK_POINTS {
                weak_points.push(weak_point(&question.question));
            }
        }

        Ok(QuizScore {
            correct,
            total,
            score: percentage(correct, total),
            weak_points,
        })
    }
}
