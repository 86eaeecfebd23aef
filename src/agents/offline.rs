//! 离线协作方：无需 LLM 的确定性内容生成
//!
//! 计划、讲义、测验、作业都由课时参数模板化生成；评分与进度决策使用固定规则。
//! `llm.provider = "mock"` 时由 CLI 使用，集成测试也用它驱动完整会话。

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::traits::{
    AdvanceParams, AnswerEvaluator, AnswerExtractor, AssignmentParams, ContentGenerator,
    GradingParams, LectureParams, ProgressParams, QuizParams, RepeatParams,
};
use crate::core::GenerationError;
use crate::session::{
    AdvanceMessage, Assignment, AssignmentStep, Decision, Difficulty, ExtractedQuery,
    GradingResult, LearningPlan, Lecture, LectureSegment, Lesson, ProgressDecision, Question,
    QuestionKind, Quiz, RepeatMessage, DEFAULT_BACKGROUND, UNDETECTED,
};

/// 离线通过线（测验与作业均需达到）
const PASS_MARK: u32 = 70;

#[derive(Debug, Clone)]
pub struct OfflineContentGenerator {
    lessons: usize,
}

impl OfflineContentGenerator {
    pub fn new(lessons: usize) -> Self {
        Self { lessons }
    }
}

impl Default for OfflineContentGenerator {
    fn default() -> Self {
        Self::new(5)
    }
}

fn lesson_for(topic: &str, n: usize) -> Lesson {
    Lesson {
        lesson_number: n as u32,
        title: format!("{topic}: part {n}"),
        objectives: vec![
            format!("Explain the core idea of part {n}"),
            format!("Apply part {n} to a small example"),
            format!("Recognize common mistakes in part {n}"),
        ],
        key_concepts: vec![format!("{topic} concept {n}.1"), format!("{topic} concept {n}.2")],
        duration_minutes: 30,
        prerequisites: if n > 1 {
            vec![format!("{topic}: part {}", n - 1)]
        } else {
            Vec::new()
        },
        difficulty: match n {
            1 | 2 => Difficulty::Beginner,
            3 | 4 => Difficulty::Intermediate,
            _ => Difficulty::Advanced,
        },
    }
}

#[async_trait]
impl ContentGenerator for OfflineContentGenerator {
    async fn generate_plan(
        &self,
        topic: &str,
        _background: &str,
    ) -> Result<LearningPlan, GenerationError> {
        let lessons: Vec<Lesson> = (1..=self.lessons).map(|n| lesson_for(topic, n)).collect();
        Ok(LearningPlan {
            topic: topic.to_string(),
            total_duration_minutes: lessons.iter().map(|l| l.duration_minutes).sum(),
            lessons,
            overall_difficulty: Difficulty::Beginner,
        })
    }

    async fn generate_lecture(&self, p: &LectureParams) -> Result<Lecture, GenerationError> {
        let mut segments: Vec<LectureSegment> = p
            .key_concepts
            .iter()
            .take(3)
            .enumerate()
            .map(|(i, concept)| LectureSegment {
                segment_number: i as u32 + 1,
                title: concept.clone(),
                content: format!("{concept} is one of the building blocks of {}.", p.lesson_title),
                duration_minutes: 5,
                interaction_points: vec![format!("Where have you seen {concept} before?")],
            })
            .collect();
        if !p.weak_points.is_empty() {
            segments.push(LectureSegment {
                segment_number: segments.len() as u32 + 1,
                title: "Review".to_string(),
                content: format!("Let's revisit: {}.", p.weak_points.join(", ")),
                duration_minutes: 5,
                interaction_points: Vec::new(),
            });
        }
        Ok(Lecture {
            lesson_title: p.lesson_title.clone(),
            introduction: format!("Welcome to {} ({}).", p.lesson_title, p.current_knowledge),
            segments,
            conclusion: format!("That wraps up {}.", p.lesson_title),
            total_duration_minutes: 15,
            key_takeaways: p.key_concepts.clone(),
        })
    }

    async fn generate_quiz(&self, p: &QuizParams) -> Result<Quiz, GenerationError> {
        let concept = p
            .key_concepts
            .first()
            .cloned()
            .unwrap_or_else(|| p.lesson_title.clone());
        let mc = |text: String, correct: &str| Question {
            question: text,
            explanation: String::new(),
            misconceptions: Vec::new(),
            kind: QuestionKind::MultipleChoice {
                options: vec![
                    "The first option".into(),
                    "The second option".into(),
                    "The third option".into(),
                    "The fourth option".into(),
                ],
                correct_answer: correct.to_string(),
            },
        };
        let tf = |text: String, correct: bool| Question {
            question: text,
            explanation: String::new(),
            misconceptions: Vec::new(),
            kind: QuestionKind::TrueFalse {
                correct_answer: correct,
            },
        };
        Ok(Quiz {
            lesson_title: p.lesson_title.clone(),
            questions: vec![
                mc(format!("Which option best describes {concept}?"), "A"),
                tf(format!("{concept} is covered in {}.", p.lesson_title), true),
                mc(format!("Which example uses {concept} correctly?"), "B"),
                tf(format!("{concept} can be skipped safely."), false),
                Question {
                    question: format!("In your own words, what is {concept}?"),
                    explanation: String::new(),
                    misconceptions: Vec::new(),
                    kind: QuestionKind::ShortAnswer {
                        correct_answer: concept.clone(),
                        key_points: p.key_concepts.clone(),
                    },
                },
            ],
            passing_score: PASS_MARK,
        })
    }

    async fn generate_assignment(
        &self,
        p: &AssignmentParams,
    ) -> Result<Assignment, GenerationError> {
        let steps = (1..=5)
            .map(|n| AssignmentStep {
                step_number: n,
                instruction: format!("Step {n}: practice {}", p.lesson_title),
                expected_outcome: format!("Step {n} completed"),
                hints: Vec::new(),
            })
            .collect();
        Ok(Assignment {
            title: format!("Practice: {}", p.lesson_title),
            lesson_title: p.lesson_title.clone(),
            objective: p.objectives.first().cloned().unwrap_or_default(),
            background: p.quiz_performance.clone(),
            steps,
            deliverables: vec!["A short write-up".to_string()],
            success_criteria: p.key_concepts.clone(),
            estimated_duration_minutes: 30,
            resources: Vec::new(),
            bonus_challenges: Vec::new(),
        })
    }

    async fn grade_assignment(&self, p: &GradingParams) -> Result<GradingResult, GenerationError> {
        let submission = p.submission.to_lowercase();
        let missed: Vec<String> = p
            .criteria
            .iter()
            .filter(|c| !submission.contains(&c.to_lowercase()))
            .cloned()
            .collect();
        let covered = p.criteria.len() - missed.len();
        let score = if p.criteria.is_empty() {
            100.0
        } else {
            (100 * covered / p.criteria.len()) as f64
        };
        Ok(GradingResult {
            assignment_title: p.assignment_title.clone(),
            score,
            passed: score >= PASS_MARK as f64,
            strengths: vec!["Submitted on time".into(), "Clear structure".into()],
            improvements: vec!["Add examples".into(), "Cover every criterion".into()],
            recommendations: missed.iter().map(|c| format!("Review {c}")).collect(),
            weak_points: missed,
            detailed_feedback: format!("Covered {covered} of {} criteria.", p.criteria.len()),
            grade_level: if score >= PASS_MARK as f64 { "Meets" } else { "Partially Meets" }
                .to_string(),
        })
    }

    async fn decide_progress(
        &self,
        p: &ProgressParams,
    ) -> Result<ProgressDecision, GenerationError> {
        let decision = if p.quiz_score >= PASS_MARK && p.assignment_score >= PASS_MARK {
            Decision::Advance
        } else {
            Decision::Repeat
        };
        Ok(ProgressDecision {
            decision: decision.to_string(),
            reasoning: format!(
                "Quiz {}%, assignment {}% against a pass mark of {PASS_MARK}%.",
                p.quiz_score, p.assignment_score
            ),
            focus_areas: p.weak_points.clone(),
            confidence: "High".to_string(),
        })
    }

    async fn repeat_message(&self, p: &RepeatParams) -> Result<RepeatMessage, GenerationError> {
        Ok(RepeatMessage {
            message: format!(
                "Let's go through {} once more (attempt {}).",
                p.lesson_title, p.attempt_count
            ),
            acknowledgment: "Good effort so far.".to_string(),
            explanation: "A second pass makes the ideas stick.".to_string(),
            focus_areas: p.weak_points.clone(),
            study_tips: vec!["Summarize each segment in one sentence.".to_string()],
            expectations: "A refreshed lecture focused on your weak points.".to_string(),
        })
    }

    async fn advance_message(&self, p: &AdvanceParams) -> Result<AdvanceMessage, GenerationError> {
        Ok(AdvanceMessage {
            message: format!("Well done on {}! Next up: {}.", p.completed_lesson, p.next_lesson),
            celebration: format!("You finished {}.", p.completed_lesson),
            key_achievements: p.key_takeaways.clone(),
            next_lesson_preview: p.next_lesson.clone(),
            motivation: "Keep the momentum going.".to_string(),
            progress_summary: String::new(),
        })
    }
}

#[async_trait]
impl AnswerEvaluator for OfflineContentGenerator {
    /// 答案提到任一要点即视为理解
    async fn evaluate_short_answer(
        &self,
        _question: &str,
        key_points: &[String],
        answer: &str,
    ) -> Result<bool, GenerationError> {
        let answer = answer.to_lowercase();
        Ok(key_points
            .iter()
            .any(|k| !k.trim().is_empty() && answer.contains(&k.to_lowercase())))
    }
}

/// 去掉 "1)"、"2."、"q3:" 之类的编号前缀
fn strip_numbering(item: &str) -> &str {
    let item = item.trim();
    let rest = item.trim_start_matches(['q', 'Q']);
    let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return item;
    }
    let after = &rest[digits..];
    match after.strip_prefix([')', '.', ':']) {
        Some(stripped) => stripped.trim(),
        None => item,
    }
}

#[async_trait]
impl AnswerExtractor for OfflineContentGenerator {
    /// "I want to learn X. <background>" 形式；找不到 "learn" 时返回哨兵值
    async fn extract_topic(&self, raw_query: &str) -> Result<ExtractedQuery, GenerationError> {
        let lower = raw_query.to_ascii_lowercase();
        let Some(pos) = lower.find("learn ") else {
            return Ok(ExtractedQuery {
                topic: UNDETECTED.to_string(),
                background: UNDETECTED.to_string(),
            });
        };
        let rest = &raw_query[pos + "learn ".len()..];
        let end = rest.find(['.', ',', ';', '\n']).unwrap_or(rest.len());
        let topic = rest[..end].trim();
        let background = rest[end..].trim_start_matches(['.', ',', ';', '\n']).trim();
        if topic.is_empty() {
            return Ok(ExtractedQuery {
                topic: UNDETECTED.to_string(),
                background: UNDETECTED.to_string(),
            });
        }
        Ok(ExtractedQuery {
            topic: topic.to_string(),
            background: if background.is_empty() {
                DEFAULT_BACKGROUND.to_string()
            } else {
                background.to_string()
            },
        })
    }

    /// 按行（或逗号）顺序对应题号
    async fn extract_quiz_answers(
        &self,
        raw_text: &str,
        _quiz_description: &str,
    ) -> Result<BTreeMap<usize, String>, GenerationError> {
        let separator = if raw_text.contains('\n') { '\n' } else { ',' };
        Ok(raw_text
            .split(separator)
            .map(strip_numbering)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| (i, s.to_string()))
            .collect())
    }

    async fn extract_assignment_submission(
        &self,
        raw_text: &str,
        _assignment_description: &str,
    ) -> Result<String, GenerationError> {
        Ok(raw_text.trim().to_string())
    }
}
