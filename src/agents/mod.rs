//! 协作方层：内容生成、简答题评判、自由文本抽取的接口与实现（LLM / 离线）

pub mod llm_generator;
pub mod offline;
pub mod prompts;
pub mod schema;
pub mod traits;

pub use llm_generator::{extract_json, parse_question_key, LlmAnswerExtractor, LlmContentGenerator};
pub use offline::OfflineContentGenerator;
pub use traits::{
    AdvanceParams, AnswerEvaluator, AnswerExtractor, AssignmentParams, ContentGenerator,
    GradingParams, LectureParams, ProgressParams, QuizParams, RepeatParams,
};
