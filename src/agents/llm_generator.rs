//! 基于 LLM 的协作方实现
//!
//! 每个操作：拼装 prompt → 附加目标类型的 JSON Schema → 调用 LlmClient → 从回复中取出 JSON 对象
//! → serde 反序列化 → validate。任一步失败都转为 GenerationError，由调用方决定是否重试。

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::prompts;
use super::schema::schema_json;
use super::traits::{
    AdvanceParams, AnswerEvaluator, AnswerExtractor, AssignmentParams, ContentGenerator,
    GradingParams, LectureParams, ProgressParams, QuizParams, RepeatParams,
};
use crate::core::GenerationError;
use crate::llm::{LlmClient, Message};
use crate::session::{
    AdvanceMessage, Assignment, ExtractedQuery, GradingResult, LearningPlan, Lecture,
    ProgressDecision, Quiz, RepeatMessage, ShortAnswerEvaluation, Validate,
};

static FENCE_RE: OnceLock<Regex> = OnceLock::new();

/// 从 LLM 回复中取出 JSON 对象：优先 ```json 代码块，否则取首个 '{' 到最后一个 '}'
pub fn extract_json(raw: &str) -> Option<&str> {
    let re = FENCE_RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").unwrap());
    let body = re
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (start < end).then(|| &body[start..=end])
}

/// 通过 LlmClient 请求结构化对象的公共部分
#[derive(Clone)]
struct JsonRequester {
    client: Arc<dyn LlmClient>,
}

impl JsonRequester {
    async fn request<T>(&self, what: &str, system: &str, prompt: String) -> Result<T, GenerationError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let system = format!(
            "{system}\n\nRespond with a single JSON object that matches this JSON Schema, and nothing else:\n{}",
            schema_json::<T>()
        );
        let messages = [Message::system(system), Message::user(prompt)];
        let raw = self
            .client
            .complete(&messages)
            .await
            .map_err(|e| GenerationError::Backend(format!("{what}: {e}")))?;
        let json = extract_json(&raw).ok_or_else(|| {
            GenerationError::InvalidOutput(format!("{what}: no JSON object in reply"))
        })?;
        serde_json::from_str(json)
            .map_err(|e| GenerationError::InvalidOutput(format!("{what}: {e}")))
    }

    async fn request_valid<T>(
        &self,
        what: &str,
        system: &str,
        prompt: String,
    ) -> Result<T, GenerationError>
    where
        T: DeserializeOwned + JsonSchema + Validate,
    {
        let value: T = self.request(what, system, prompt).await?;
        value
            .validate()
            .map_err(|e| GenerationError::InvalidOutput(format!("{what}: {e}")))?;
        Ok(value)
    }
}

/// LLM 内容生成器，同时承担简答题评判
#[derive(Clone)]
pub struct LlmContentGenerator {
    inner: JsonRequester,
}

impl LlmContentGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            inner: JsonRequester { client },
        }
    }
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    async fn generate_plan(
        &self,
        topic: &str,
        background: &str,
    ) -> Result<LearningPlan, GenerationError> {
        self.inner
            .request_valid("plan", prompts::PLANNER_SYSTEM, prompts::plan(topic, background))
            .await
    }

    async fn generate_lecture(&self, params: &LectureParams) -> Result<Lecture, GenerationError> {
        self.inner
            .request_valid("lecture", prompts::PROFESSOR_SYSTEM, prompts::lecture(params))
            .await
    }

    async fn generate_quiz(&self, params: &QuizParams) -> Result<Quiz, GenerationError> {
        self.inner
            .request_valid("quiz", prompts::PROFESSOR_SYSTEM, prompts::quiz(params))
            .await
    }

    async fn generate_assignment(
        &self,
        params: &AssignmentParams,
    ) -> Result<Assignment, GenerationError> {
        self.inner
            .request_valid(
                "assignment",
                prompts::PROFESSOR_SYSTEM,
                prompts::assignment(params),
            )
            .await
    }

    async fn grade_assignment(
        &self,
        params: &GradingParams,
    ) -> Result<GradingResult, GenerationError> {
        self.inner
            .request_valid("grading", prompts::TUTOR_SYSTEM, prompts::grading(params))
            .await
    }

    async fn decide_progress(
        &self,
        params: &ProgressParams,
    ) -> Result<ProgressDecision, GenerationError> {
        // decision 的取值由引擎校验，这里不做 validate
        self.inner
            .request("progress", prompts::TUTOR_SYSTEM, prompts::progress(params))
            .await
    }

    async fn repeat_message(&self, params: &RepeatParams) -> Result<RepeatMessage, GenerationError> {
        self.inner
            .request("repeat_message", prompts::TUTOR_SYSTEM, prompts::repeat(params))
            .await
    }

    async fn advance_message(
        &self,
        params: &AdvanceParams,
    ) -> Result<AdvanceMessage, GenerationError> {
        self.inner
            .request("advance_message", prompts::TUTOR_SYSTEM, prompts::advance(params))
            .await
    }
}

#[async_trait]
impl AnswerEvaluator for LlmContentGenerator {
    async fn evaluate_short_answer(
        &self,
        question: &str,
        key_points: &[String],
        answer: &str,
    ) -> Result<bool, GenerationError> {
        let eval: ShortAnswerEvaluation = self
            .inner
            .request(
                "short_answer",
                prompts::EVALUATOR_SYSTEM,
                prompts::short_answer(question, key_points, answer),
            )
            .await?;
        tracing::debug!(
            correct = eval.is_correct,
            reasoning = %eval.reasoning,
            "short answer evaluated"
        );
        Ok(eval.is_correct)
    }
}

#[derive(Deserialize, JsonSchema)]
struct QuizAnswersReply {
    /// 键为 q0、q1 ...
    answers: BTreeMap<String, String>,
}

#[derive(Deserialize, JsonSchema)]
struct SubmissionReply {
    submission_text: String,
}

/// 题目键 "q3" / "3" → 3
pub fn parse_question_key(key: &str) -> Option<usize> {
    let key = key.trim();
    let digits = key
        .strip_prefix('q')
        .or_else(|| key.strip_prefix('Q'))
        .unwrap_or(key);
    digits.parse().ok()
}

/// LLM 自由文本抽取器
#[derive(Clone)]
pub struct LlmAnswerExtractor {
    inner: JsonRequester,
}

impl LlmAnswerExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            inner: JsonRequester { client },
        }
    }
}

#[async_trait]
impl AnswerExtractor for LlmAnswerExtractor {
    async fn extract_topic(&self, raw_query: &str) -> Result<ExtractedQuery, GenerationError> {
        self.inner
            .request(
                "topic_extraction",
                prompts::EXTRACTION_SYSTEM,
                prompts::topic_extraction(raw_query),
            )
            .await
    }

    async fn extract_quiz_answers(
        &self,
        raw_text: &str,
        quiz_description: &str,
    ) -> Result<BTreeMap<usize, String>, GenerationError> {
        let reply: QuizAnswersReply = self
            .inner
            .request(
                "quiz_answers",
                prompts::EXTRACTION_SYSTEM,
                prompts::quiz_answers(raw_text, quiz_description),
            )
            .await?;
        let mut answers = BTreeMap::new();
        for (key, value) in reply.answers {
            match parse_question_key(&key) {
                Some(idx) => {
                    answers.insert(idx, value);
                }
                None => tracing::warn!(key = %key, "dropping extracted answer with unknown key"),
            }
        }
        Ok(answers)
    }

    async fn extract_assignment_submission(
        &self,
        raw_text: &str,
        assignment_description: &str,
    ) -> Result<String, GenerationError> {
        let reply: SubmissionReply = self
            .inner
            .request(
                "assignment_submission",
                prompts::EXTRACTION_SYSTEM,
                prompts::assignment_submission(raw_text, assignment_description),
            )
            .await?;
        Ok(reply.submission_text)
    }
}
