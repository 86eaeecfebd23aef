//! 会话层：课程内容模型与会话状态聚合

pub mod models;
pub mod state;

pub use models::{
    AdvanceMessage, Assignment, AssignmentStep, Decision, Difficulty, ExtractedQuery,
    GradingResult, LearningPlan, Lecture, LectureSegment, Lesson, ProgressDecision, Question,
    QuestionKind, Quiz, RepeatMessage, ShortAnswerEvaluation, Validate, UNDETECTED,
};
pub use state::{InputType, SessionPatch, SessionState, DEFAULT_BACKGROUND};
