//! 节点实现
//!
//! 每个节点接收状态的私有副本，成功时返回新状态；失败时副本被丢弃，检查点保持节点执行前的值。
//! 协作方调用统一经过 [`NodeContext::call`]：受超时约束，并响应会话取消。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::builder::Collaborators;
use super::types::NodeName;
use crate::agents::{
    AdvanceParams, AssignmentParams, GradingParams, LectureParams, ProgressParams, QuizParams,
    RepeatParams,
};
use crate::core::{GenerationError, WorkflowError};
use crate::scoring::{self, AnswerScorer};
use crate::session::{Decision, Lesson, SessionState, UNDETECTED};

/// 单次节点执行所需的上下文
pub struct NodeContext<'a> {
    pub session_id: &'a str,
    pub collaborators: &'a Collaborators,
    pub cancel: CancellationToken,
    pub timeout: Duration,
}

impl NodeContext<'_> {
    /// 调用外部协作方：超时记为 GenerationError::Timeout，取消记为 Cancelled
    pub async fn call<T, F>(&self, what: &str, fut: F) -> Result<T, WorkflowError>
    where
        F: Future<Output = Result<T, GenerationError>>,
    {
        tracing::debug!(session = self.session_id, call = what, "collaborator call");
        tokio::select! {
            _ = self.cancel.cancelled() => Err(WorkflowError::Cancelled),
            result = tokio::time::timeout(self.timeout, fut) => match result {
                Ok(r) => r.map_err(WorkflowError::from),
                Err(_) => Err(GenerationError::Timeout(format!(
                    "{what} exceeded {:?}",
                    self.timeout
                ))
                .into()),
            },
        }
    }
}

fn current_lesson(state: &SessionState, node: NodeName) -> Result<Lesson, WorkflowError> {
    state.current_lesson().cloned().ok_or_else(|| {
        WorkflowError::precondition(
            node.as_str(),
            format!(
                "no lesson at index {} (plan has {})",
                state.current_lesson_index,
                state.lesson_count()
            ),
        )
    })
}

/// 执行单个节点
pub async fn run(
    node: NodeName,
    ctx: &NodeContext<'_>,
    state: SessionState,
) -> Result<SessionState, WorkflowError> {
    match node {
        NodeName::Extract => extract(ctx, state).await,
        NodeName::CheckExtraction => Ok(check_extraction(state)),
        NodeName::RequestNewQuery => request_new_query(state),
        NodeName::GeneratePlan => generate_plan(ctx, state).await,
        NodeName::CheckProgress => check_progress(state),
        NodeName::Lecture => lecture(ctx, state).await,
        NodeName::Quiz => quiz(ctx, state).await,
        NodeName::ProcessQuizAnswers => process_quiz_answers(ctx, state).await,
        NodeName::Assignment => assignment(ctx, state).await,
        NodeName::Grade => grade(ctx, state).await,
        NodeName::Advance => advance(ctx, state).await,
        NodeName::Repeat => repeat(ctx, state).await,
    }
}

async fn extract(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    if state.has_valid_topic() {
        tracing::debug!(topic = %state.topic, "topic already set, skipping extraction");
        return Ok(state);
    }
    if state.query.trim().is_empty() {
        state.topic = UNDETECTED.to_string();
        state.background = UNDETECTED.to_string();
        return Ok(state);
    }

    let extracted = ctx
        .call("extract_topic", ctx.collaborators.extractor.extract_topic(&state.query))
        .await?;
    tracing::info!(topic = %extracted.topic, "topic extracted");
    state.topic = extracted.topic;
    state.background = extracted.background;
    Ok(state)
}

fn check_extraction(mut state: SessionState) -> SessionState {
    if state.has_valid_topic() {
        state.message.clear();
    } else {
        tracing::info!(query = %state.query, "topic not detected");
        state.message = if state.query.trim().is_empty() {
            "Tell me what you would like to learn and a little about your background.".to_string()
        } else {
            "I couldn't work out what you want to learn. Please tell me the topic and your \
             background, e.g. \"I want to learn Rust. I know Python.\""
                .to_string()
        };
    }
    state
}

fn request_new_query(mut state: SessionState) -> Result<SessionState, WorkflowError> {
    if state.query.trim().is_empty() {
        return Err(WorkflowError::precondition(
            NodeName::RequestNewQuery.as_str(),
            "no new query supplied",
        ));
    }
    // 丢弃失败的抽取结果，让 Extract 重新处理新请求
    state.topic.clear();
    state.background.clear();
    state.message.clear();
    Ok(state)
}

async fn generate_plan(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    if !state.has_valid_topic() {
        return Err(WorkflowError::precondition(
            NodeName::GeneratePlan.as_str(),
            "topic or background missing",
        ));
    }
    if state.learning_plan.is_some() {
        tracing::debug!("learning plan already set");
        return Ok(state);
    }

    let plan = ctx
        .call(
            "generate_plan",
            ctx.collaborators
                .generator
                .generate_plan(&state.topic, &state.background),
        )
        .await?;
    tracing::info!(lessons = plan.lessons.len(), topic = %state.topic, "learning plan generated");
    state.learning_plan = Some(plan);
    state.current_lesson_index = 0;
    Ok(state)
}

fn check_progress(mut state: SessionState) -> Result<SessionState, WorkflowError> {
    if state.learning_plan.is_none() {
        return Err(WorkflowError::precondition(
            NodeName::CheckProgress.as_str(),
            "no learning plan",
        ));
    }
    if state.is_plan_exhausted() {
        tracing::info!(lessons = state.lesson_count(), "all lessons completed");
        state.completed = true;
        state.message = format!(
            "Congratulations! You have completed all {} lessons on {}.",
            state.lesson_count(),
            state.topic
        );
    }
    Ok(state)
}

async fn lecture(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Lecture)?;
    let params = LectureParams {
        lesson_title: lesson.title.clone(),
        objectives: lesson.objectives.clone(),
        key_concepts: lesson.key_concepts.clone(),
        current_knowledge: format!(
            "Lesson {} of {}",
            state.current_lesson_index + 1,
            state.lesson_count()
        ),
        weak_points: state.weak_points.clone(),
    };
    let lecture = ctx
        .call("generate_lecture", ctx.collaborators.generator.generate_lecture(&params))
        .await?;
    state.lecture = Some(lecture);
    Ok(state)
}

async fn quiz(ctx: &NodeContext<'_>, mut state: SessionState) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Quiz)?;
    let lecture = state.lecture.as_ref().ok_or_else(|| {
        WorkflowError::precondition(NodeName::Quiz.as_str(), "no lecture for the current lesson")
    })?;
    let params = QuizParams {
        lesson_title: lesson.title,
        objectives: lesson.objectives,
        key_concepts: lesson.key_concepts,
        lecture_summary: lecture.summary(),
    };
    let quiz = ctx
        .call("generate_quiz", ctx.collaborators.generator.generate_quiz(&params))
        .await?;
    state.quiz = Some(quiz);
    state.quiz_answers.clear();
    Ok(state)
}

async fn process_quiz_answers(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    let quiz = state.quiz.as_ref().ok_or_else(|| {
        WorkflowError::precondition(NodeName::ProcessQuizAnswers.as_str(), "no active quiz")
    })?;
    let scorer = AnswerScorer::new(ctx.collaborators.evaluator.as_ref());
    let result = ctx
        .call("score_quiz", scorer.score_quiz(quiz, &state.quiz_answers))
        .await?;
    tracing::info!(
        score = result.score,
        correct = result.correct,
        total = result.total,
        "quiz scored"
    );
    state.quiz_score = result.score;
    state.weak_points = result.weak_points;
    Ok(state)
}

async fn assignment(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Assignment)?;
    let weak = if state.weak_points.is_empty() {
        "None".to_string()
    } else {
        state.weak_points.join(", ")
    };
    let params = AssignmentParams {
        lesson_title: lesson.title,
        objectives: lesson.objectives,
        key_concepts: lesson.key_concepts,
        quiz_performance: format!("Quiz score: {}%, Weak areas: {}", state.quiz_score, weak),
    };
    let assignment = ctx
        .call(
            "generate_assignment",
            ctx.collaborators.generator.generate_assignment(&params),
        )
        .await?;
    state.assignment = Some(assignment);
    state.assignment_submission.clear();
    Ok(state)
}

async fn grade(ctx: &NodeContext<'_>, mut state: SessionState) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Grade)?;
    let assignment = state.assignment.as_ref().ok_or_else(|| {
        WorkflowError::precondition(NodeName::Grade.as_str(), "no active assignment")
    })?;

    if scoring::is_blank_submission(&state.assignment_submission) {
        tracing::warn!(lesson = %lesson.title, "empty assignment submission, scoring 0");
        state.assignment_score = 0;
        state.weak_points = lesson.key_concepts;
        state.grading_result = None;
        return Ok(state);
    }

    let params = GradingParams {
        assignment_title: assignment.title.clone(),
        steps: assignment
            .steps
            .iter()
            .map(|s| format!("{}. {}", s.step_number, s.instruction))
            .collect(),
        criteria: assignment.success_criteria.clone(),
        submission: state.assignment_submission.clone(),
    };
    let result = ctx
        .call("grade_assignment", ctx.collaborators.generator.grade_assignment(&params))
        .await?;
    state.assignment_score = scoring::grading_score(&result);
    state.weak_points = scoring::grading_weak_points(&result);
    tracing::info!(score = state.assignment_score, "assignment graded");
    state.grading_result = Some(result);
    Ok(state)
}

/// Grade 之后的进度决策；返回值之外的取值一律视为路由错误
pub async fn decide(
    ctx: &NodeContext<'_>,
    state: &mut SessionState,
) -> Result<Decision, WorkflowError> {
    let lesson = current_lesson(state, NodeName::Grade)?;
    let params = ProgressParams {
        topic: state.topic.clone(),
        lesson_title: lesson.title,
        lesson_number: state.current_lesson_index + 1,
        total_lessons: state.lesson_count(),
        quiz_score: state.quiz_score,
        assignment_score: state.assignment_score,
        weak_points: state.weak_points.clone(),
        attempt_count: state.attempt_count,
    };
    let raw = ctx
        .call("decide_progress", ctx.collaborators.generator.decide_progress(&params))
        .await?;
    let decision: Decision = raw.decision.parse().map_err(WorkflowError::Routing)?;
    tracing::info!(%decision, reasoning = %raw.reasoning, "progress decision");
    state.last_decision = Some(raw);
    Ok(decision)
}

async fn advance(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Advance)?;
    let next_lesson = state
        .next_lesson()
        .map(|l| l.title.clone())
        .unwrap_or_else(|| "Course Completion".to_string());
    let key_takeaways = state
        .lecture
        .as_ref()
        .map(|l| l.key_takeaways.clone())
        .unwrap_or_else(|| lesson.key_concepts.clone());
    let params = AdvanceParams {
        completed_lesson: lesson.title,
        next_lesson,
        key_takeaways,
    };
    let msg = ctx
        .call("advance_message", ctx.collaborators.generator.advance_message(&params))
        .await?;
    state.message = msg.message;
    state.advance();
    tracing::info!(
        lesson_index = state.current_lesson_index,
        "advanced to next lesson"
    );
    Ok(state)
}

async fn repeat(
    ctx: &NodeContext<'_>,
    mut state: SessionState,
) -> Result<SessionState, WorkflowError> {
    let lesson = current_lesson(&state, NodeName::Repeat)?;
    let params = RepeatParams {
        lesson_title: lesson.title,
        weak_points: state.weak_points.clone(),
        attempt_count: state.attempt_count + 1,
    };
    let msg = ctx
        .call("repeat_message", ctx.collaborators.generator.repeat_message(&params))
        .await?;
    state.message = msg.message;
    state.repeat();
    tracing::info!(attempt = state.attempt_count, "repeating lesson");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OfflineContentGenerator;
    use crate::session::{InputType, DEFAULT_BACKGROUND};
    use std::sync::Arc;

    fn offline() -> Collaborators {
        let offline = Arc::new(OfflineContentGenerator::default());
        Collaborators {
            generator: offline.clone(),
            evaluator: offline.clone(),
            extractor: offline,
        }
    }

    fn ctx(c: &Collaborators) -> NodeContext<'_> {
        NodeContext {
            session_id: "t",
            collaborators: c,
            cancel: CancellationToken::new(),
            timeout: Duration::from_secs(5),
        }
    }

    async fn planned_state(c: &Collaborators) -> SessionState {
        let state = SessionState::with_topic("Rust", "");
        assert_eq!(state.background, DEFAULT_BACKGROUND);
        run(NodeName::GeneratePlan, &ctx(c), state).await.unwrap()
    }

    #[tokio::test]
    async fn test_extract_without_query_sets_sentinel() {
        let c = offline();
        let state = run(NodeName::Extract, &ctx(&c), SessionState::default())
            .await
            .unwrap();
        assert_eq!(state.topic, UNDETECTED);
        let state = run(NodeName::CheckExtraction, &ctx(&c), state).await.unwrap();
        assert!(!state.message.is_empty());
    }

    #[tokio::test]
    async fn test_request_new_query_requires_query() {
        let c = offline();
        let err = run(NodeName::RequestNewQuery, &ctx(&c), SessionState::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition { node: "request_new_query", .. }));
    }

    #[tokio::test]
    async fn test_check_progress_completes_exhausted_plan() {
        let c = offline();
        let mut state = planned_state(&c).await;
        state.current_lesson_index = state.lesson_count();
        let state = run(NodeName::CheckProgress, &ctx(&c), state).await.unwrap();
        assert!(state.completed);
    }

    #[tokio::test]
    async fn test_quiz_requires_lecture() {
        let c = offline();
        let state = planned_state(&c).await;
        let err = run(NodeName::Quiz, &ctx(&c), state).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Precondition { node: "quiz", .. }));
    }

    #[tokio::test]
    async fn test_empty_submission_scores_zero_with_key_concepts() {
        let c = offline();
        let mut state = planned_state(&c).await;
        state = run(NodeName::Lecture, &ctx(&c), state).await.unwrap();
        state = run(NodeName::Quiz, &ctx(&c), state).await.unwrap();
        state = run(NodeName::Assignment, &ctx(&c), state).await.unwrap();
        state.assignment_submission = "   \n".into();
        state.assignment_score = 55;

        let state = run(NodeName::Grade, &ctx(&c), state).await.unwrap();
        let concepts = state.current_lesson().unwrap().key_concepts.clone();
        assert_eq!(state.assignment_score, 0);
        assert_eq!(state.weak_points, concepts);
        assert!(state.grading_result.is_none());
        assert_eq!(state.input_type, InputType::None);
    }

    #[tokio::test]
    async fn test_cancelled_call() {
        let c = offline();
        let context = ctx(&c);
        context.cancel.cancel();
        let err = context
            .call("slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, GenerationError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Cancelled));
    }

    #[tokio::test]
    async fn test_timeout_is_generation_error() {
        let c = offline();
        let context = NodeContext {
            timeout: Duration::from_millis(20),
            ..ctx(&c)
        };
        let err = context
            .call("slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, GenerationError>(())
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Generation(GenerationError::Timeout(_))
        ));
        assert!(err.is_transient());
    }
}
