//! 课程内容模型：学习计划、讲义、测验、作业、评分、进度决策与学员消息
//!
//! 这些对象由外部内容生成器产出，作为会话状态中的课时产物被持久化；
//! 派生 JsonSchema 以便 LLM 生成器把结构约束注入 prompt，`validate` 负责边界检查。

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// 生成内容的结构校验（字段数量、分值范围等）
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

fn check_len(field: &str, len: usize, min: usize, max: usize) -> Result<(), String> {
    if len < min || len > max {
        return Err(format!("{field}: expected {min}-{max} items, got {len}"));
    }
    Ok(())
}

fn check_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field}: must not be empty"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// 学习计划中的单节课
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    /// 3-5 条学习目标
    pub objectives: Vec<String>,
    pub key_concepts: Vec<String>,
    /// 预计时长（分钟，15-120）
    pub duration_minutes: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub difficulty: Difficulty,
}

impl Validate for Lesson {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("lesson.title", &self.title)?;
        check_len("lesson.objectives", self.objectives.len(), 3, 5)?;
        if self.key_concepts.is_empty() {
            return Err(format!("lesson '{}': key_concepts must not be empty", self.title));
        }
        if !(15..=120).contains(&self.duration_minutes) {
            return Err(format!(
                "lesson '{}': duration_minutes {} outside 15-120",
                self.title, self.duration_minutes
            ));
        }
        Ok(())
    }
}

/// 完整学习计划：5-8 节递进课程
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LearningPlan {
    pub topic: String,
    pub lessons: Vec<Lesson>,
    pub total_duration_minutes: u32,
    pub overall_difficulty: Difficulty,
}

impl Validate for LearningPlan {
    fn validate(&self) -> Result<(), String> {
        check_len("plan.lessons", self.lessons.len(), 5, 8)?;
        self.lessons.iter().try_for_each(Validate::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LectureSegment {
    pub segment_number: u32,
    pub title: String,
    pub content: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub interaction_points: Vec<String>,
}

/// 一节课的讲义：引言 + 2-3 段正文 + 总结
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Lecture {
    pub lesson_title: String,
    pub introduction: String,
    pub segments: Vec<LectureSegment>,
    pub conclusion: String,
    pub total_duration_minutes: u32,
    pub key_takeaways: Vec<String>,
}

impl Lecture {
    /// 供测验生成使用的讲义摘要（每段截取前 200 字符）
    pub fn summary(&self) -> String {
        let mut out = self.introduction.clone();
        for seg in &self.segments {
            let head: String = seg.content.chars().take(200).collect();
            out.push_str(&format!("\n{}: {}...", seg.title, head));
        }
        out
    }
}

impl Validate for Lecture {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("lecture.introduction", &self.introduction)?;
        check_len("lecture.segments", self.segments.len(), 2, 3)?;
        check_non_empty("lecture.conclusion", &self.conclusion)
    }
}

/// 题目的判分数据，按 `type` 字段区分；未知类型落到 Unsupported 而不是解析失败
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice {
        /// 恰好 4 个选项（A-D）
        options: Vec<String>,
        /// 正确选项字母
        correct_answer: String,
    },
    TrueFalse {
        correct_answer: bool,
    },
    ShortAnswer {
        /// 参考答案
        correct_answer: String,
        key_points: Vec<String>,
    },
    #[serde(other)]
    Unsupported,
}

impl QuestionKind {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "multiple_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::ShortAnswer { .. } => "short_answer",
            QuestionKind::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    pub question: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub misconceptions: Vec<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

fn default_passing_score() -> u32 {
    70
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    pub lesson_title: String,
    pub questions: Vec<Question>,
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
}

impl Quiz {
    /// 题目的纯文本描述，供自由文本答案抽取使用
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, q) in self.questions.iter().enumerate() {
            out.push_str(&format!("q{i} [{}]: {}\n", q.kind.label(), q.question));
            if let QuestionKind::MultipleChoice { options, .. } = &q.kind {
                for (idx, opt) in options.iter().enumerate() {
                    let letter = (b'A' + idx as u8) as char;
                    out.push_str(&format!("   {letter}. {opt}\n"));
                }
            }
        }
        out
    }
}

impl Validate for Quiz {
    fn validate(&self) -> Result<(), String> {
        check_len("quiz.questions", self.questions.len(), 5, 5)?;
        if self.passing_score > 100 {
            return Err(format!("quiz.passing_score {} > 100", self.passing_score));
        }
        for (i, q) in self.questions.iter().enumerate() {
            check_non_empty(&format!("quiz.questions[{i}].question"), &q.question)?;
            match &q.kind {
                QuestionKind::MultipleChoice { options, correct_answer } => {
                    check_len(&format!("quiz.questions[{i}].options"), options.len(), 4, 4)?;
                    let letter = correct_answer.trim().to_uppercase();
                    if !matches!(letter.as_str(), "A" | "B" | "C" | "D") {
                        return Err(format!(
                            "quiz.questions[{i}].correct_answer '{correct_answer}' is not A-D"
                        ));
                    }
                }
                QuestionKind::ShortAnswer { key_points, .. } if key_points.is_empty() => {
                    return Err(format!("quiz.questions[{i}].key_points must not be empty"));
                }
                QuestionKind::Unsupported => {
                    return Err(format!("quiz.questions[{i}]: unsupported question type"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssignmentStep {
    pub step_number: u32,
    pub instruction: String,
    pub expected_outcome: String,
    #[serde(default)]
    pub hints: Vec<String>,
}

/// 课后作业：5-8 个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Assignment {
    pub title: String,
    pub lesson_title: String,
    pub objective: String,
    pub background: String,
    pub steps: Vec<AssignmentStep>,
    pub deliverables: Vec<String>,
    pub success_criteria: Vec<String>,
    pub estimated_duration_minutes: u32,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub bonus_challenges: Vec<String>,
}

impl Assignment {
    pub fn describe(&self) -> String {
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|s| format!("{}. {}", s.step_number, s.instruction))
            .collect();
        format!(
            "{}\nObjective: {}\nSteps:\n{}\nDeliverables: {}",
            self.title,
            self.objective,
            steps.join("\n"),
            self.deliverables.join(", ")
        )
    }
}

impl Validate for Assignment {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("assignment.title", &self.title)?;
        check_len("assignment.steps", self.steps.len(), 5, 8)?;
        if self.success_criteria.is_empty() {
            return Err("assignment.success_criteria must not be empty".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradingResult {
    pub assignment_title: String,
    /// 0-100
    pub score: f64,
    pub passed: bool,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub weak_points: Vec<String>,
    pub detailed_feedback: String,
    /// Exceeds / Meets / Partially Meets / Does Not Meet
    pub grade_level: String,
}

impl Validate for GradingResult {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.score) {
            return Err(format!("grading.score {} outside 0-100", self.score));
        }
        check_len("grading.strengths", self.strengths.len(), 2, 3)?;
        check_len("grading.improvements", self.improvements.len(), 2, 3)
    }
}

/// 进度决策的合法取值；Grade 之后的路由只接受这两个值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Advance,
    Repeat,
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "advance" => Ok(Decision::Advance),
            "repeat" => Ok(Decision::Repeat),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Advance => write!(f, "advance"),
            Decision::Repeat => write!(f, "repeat"),
        }
    }
}

/// 进度决策协作方的原始输出；`decision` 保持原样字符串，由引擎负责解析与路由
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressDecision {
    /// "advance" 或 "repeat"
    pub decision: String,
    pub reasoning: String,
    #[serde(default)]
    pub focus_areas: Vec<String>,
    /// High / Medium / Low
    #[serde(default)]
    pub confidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RepeatMessage {
    pub message: String,
    pub acknowledgment: String,
    pub explanation: String,
    pub focus_areas: Vec<String>,
    pub study_tips: Vec<String>,
    pub expectations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AdvanceMessage {
    pub message: String,
    pub celebration: String,
    pub key_achievements: Vec<String>,
    pub next_lesson_preview: String,
    pub motivation: String,
    pub progress_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShortAnswerEvaluation {
    pub is_correct: bool,
    pub reasoning: String,
}

/// 从自由文本请求中抽取的主题与背景；识别失败时两者均为 [`UNDETECTED`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedQuery {
    pub topic: String,
    pub background: String,
}

/// 主题抽取失败时的哨兵值
pub const UNDETECTED: &str = "failed to detect";

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(n: u32) -> Lesson {
        Lesson {
            lesson_number: n,
            title: format!("Lesson {n}"),
            objectives: vec!["a".into(), "b".into(), "c".into()],
            key_concepts: vec!["x".into()],
            duration_minutes: 30,
            prerequisites: vec![],
            difficulty: Difficulty::Beginner,
        }
    }

    #[test]
    fn test_question_kind_tagged_deserialize() {
        let json = r#"{"question":"Pick one","type":"multiple_choice","options":["a","b","c","d"],"correct_answer":"B","explanation":"because"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert!(matches!(q.kind, QuestionKind::MultipleChoice { ref correct_answer, .. } if correct_answer == "B"));
        assert_eq!(q.explanation, "because");
    }

    #[test]
    fn test_unknown_question_type_is_unsupported() {
        let json = r#"{"question":"Draw it","type":"diagram"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind, QuestionKind::Unsupported);
    }

    #[test]
    fn test_plan_validation_bounds() {
        let mut plan = LearningPlan {
            topic: "Rust".into(),
            lessons: (1..=5).map(lesson).collect(),
            total_duration_minutes: 150,
            overall_difficulty: Difficulty::Beginner,
        };
        assert!(plan.validate().is_ok());
        plan.lessons.truncate(4);
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(" Advance ".parse::<Decision>(), Ok(Decision::Advance));
        assert_eq!("REPEAT".parse::<Decision>(), Ok(Decision::Repeat));
        assert_eq!("skip".parse::<Decision>(), Err("skip".to_string()));
    }
}
