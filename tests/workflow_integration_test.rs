//! 工作流集成测试：完整会话、暂停 / 恢复、失败重跑、并发与持久化

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use professor::agents::{
    AdvanceParams, AnswerEvaluator, AnswerExtractor, AssignmentParams, ContentGenerator,
    GradingParams, LectureParams, OfflineContentGenerator, ProgressParams, QuizParams,
    RepeatParams,
};
use professor::checkpoint::{CheckpointStore, SqliteCheckpointStore};
use professor::core::{GenerationError, RecoveryEngine, WorkflowError};
use professor::service::{ErrorCode, SessionService};
use professor::session::{
    AdvanceMessage, Assignment, ExtractedQuery, GradingResult, InputType, LearningPlan, Lecture,
    ProgressDecision, Quiz, RepeatMessage, SessionPatch, SessionState,
};
use professor::workflow::{Collaborators, Cursor, EngineBuilder, NodeName, WorkflowEngine};

/// 包装离线生成器：统计调用次数，可注入失败、错误决策与阻塞
#[derive(Default)]
struct ScriptedGenerator {
    inner: OfflineContentGenerator,
    quiz_calls: AtomicUsize,
    grade_calls: AtomicUsize,
    /// 接下来 N 次讲义生成失败
    failing_lectures: AtomicUsize,
    decision_override: Mutex<Option<String>>,
    /// 设置后，计划生成会等待放行
    gate: Option<Arc<Notify>>,
    entered: Notify,
}

impl ScriptedGenerator {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn fail_lectures(&self, n: usize) {
        self.failing_lectures.store(n, Ordering::SeqCst);
    }

    fn override_decision(&self, decision: Option<&str>) {
        *self.decision_override.lock().unwrap() = decision.map(String::from);
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate_plan(
        &self,
        topic: &str,
        background: &str,
    ) -> Result<LearningPlan, GenerationError> {
        if let Some(gate) = &self.gate {
            self.entered.notify_one();
            gate.notified().await;
        }
        self.inner.generate_plan(topic, background).await
    }

    async fn generate_lecture(&self, params: &LectureParams) -> Result<Lecture, GenerationError> {
        let failing = self.failing_lectures.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_lectures.store(failing - 1, Ordering::SeqCst);
            return Err(GenerationError::Backend("503 from upstream".into()));
        }
        self.inner.generate_lecture(params).await
    }

    async fn generate_quiz(&self, params: &QuizParams) -> Result<Quiz, GenerationError> {
        self.quiz_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate_quiz(params).await
    }

    async fn generate_assignment(
        &self,
        params: &AssignmentParams,
    ) -> Result<Assignment, GenerationError> {
        self.inner.generate_assignment(params).await
    }

    async fn grade_assignment(
        &self,
        params: &GradingParams,
    ) -> Result<GradingResult, GenerationError> {
        self.grade_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.grade_assignment(params).await
    }

    async fn decide_progress(
        &self,
        params: &ProgressParams,
    ) -> Result<ProgressDecision, GenerationError> {
        let mut decision = self.inner.decide_progress(params).await?;
        if let Some(forced) = self.decision_override.lock().unwrap().clone() {
            decision.decision = forced;
        }
        Ok(decision)
    }

    async fn repeat_message(&self, params: &RepeatParams) -> Result<RepeatMessage, GenerationError> {
        self.inner.repeat_message(params).await
    }

    async fn advance_message(
        &self,
        params: &AdvanceParams,
    ) -> Result<AdvanceMessage, GenerationError> {
        self.inner.advance_message(params).await
    }
}

#[async_trait]
impl AnswerEvaluator for ScriptedGenerator {
    async fn evaluate_short_answer(
        &self,
        question: &str,
        key_points: &[String],
        answer: &str,
    ) -> Result<bool, GenerationError> {
        self.inner
            .evaluate_short_answer(question, key_points, answer)
            .await
    }
}

#[async_trait]
impl AnswerExtractor for ScriptedGenerator {
    async fn extract_topic(&self, raw_query: &str) -> Result<ExtractedQuery, GenerationError> {
        self.inner.extract_topic(raw_query).await
    }

    async fn extract_quiz_answers(
        &self,
        raw_text: &str,
        quiz_description: &str,
    ) -> Result<BTreeMap<usize, String>, GenerationError> {
        self.inner
            .extract_quiz_answers(raw_text, quiz_description)
            .await
    }

    async fn extract_assignment_submission(
        &self,
        raw_text: &str,
        assignment_description: &str,
    ) -> Result<String, GenerationError> {
        self.inner
            .extract_assignment_submission(raw_text, assignment_description)
            .await
    }
}

fn engine_with(generator: Arc<ScriptedGenerator>) -> Arc<WorkflowEngine> {
    Arc::new(EngineBuilder::new(Collaborators::uniform(generator)).build())
}

fn service_with(generator: Arc<ScriptedGenerator>) -> SessionService {
    SessionService::new(engine_with(generator), RecoveryEngine::new(2))
}

/// 第 n 课（1 起）的全对答案，键形式混用 "q0" 与 "1"
fn correct_answers(topic: &str, n: usize) -> HashMap<String, String> {
    HashMap::from([
        ("q0".to_string(), "a".to_string()),
        ("1".to_string(), "  TRUE ".to_string()),
        ("q2".to_string(), " b ".to_string()),
        ("q3".to_string(), "False".to_string()),
        ("q4".to_string(), format!("It is about {topic} concept {n}.1")),
    ])
}

fn full_submission(topic: &str, n: usize) -> String {
    format!("I used {topic} concept {n}.1 together with {topic} concept {n}.2.")
}

#[tokio::test]
async fn test_five_lesson_course_completes() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator.clone());

    let view = service.start("s1", "Rust", "knows Python").await.unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
    assert_eq!(view.lesson_total, 5);

    for n in 1..=5 {
        assert_eq!(view_lesson(&service, "s1").await, n);
        let view = service
            .submit_quiz_answers("s1", correct_answers("Rust", n))
            .await
            .unwrap();
        assert_eq!(view.input_type, InputType::Assignment);
        assert_eq!(view.quiz_score, 100);
        assert!(view.weak_points.is_empty());

        let view = service
            .submit_assignment("s1", &full_submission("Rust", n))
            .await
            .unwrap();
        if n < 5 {
            assert!(!view.completed);
            assert_eq!(view.input_type, InputType::Quiz);
        } else {
            assert!(view.completed);
            assert!(!view.waiting_for_input);
        }
    }

    let state = service.snapshot("s1").await.unwrap();
    assert_eq!(state.current_lesson_index, 5);
    assert!(state.completed);
    assert_eq!(state.attempt_count, 0);
    assert!(state.learning_plan.is_some());
    assert_eq!(generator.quiz_calls.load(Ordering::SeqCst), 5);

    let cp = service.engine().checkpoint("s1").await.unwrap().unwrap();
    assert_eq!(cp.cursor, Cursor::Finished);
}

async fn view_lesson(service: &SessionService, id: &str) -> usize {
    service.view(id).await.unwrap().lesson_number
}

#[tokio::test]
async fn test_resume_never_regenerates_quiz() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator.clone());

    service.start("s1", "Rust", "").await.unwrap();
    let quiz_before = service.snapshot("s1").await.unwrap().quiz;
    assert_eq!(generator.quiz_calls.load(Ordering::SeqCst), 1);

    // 等待中重跑只返回当前暂停
    let view = service.retry("s1").await.unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
    assert_eq!(service.snapshot("s1").await.unwrap().quiz, quiz_before);

    service
        .submit_quiz_answers("s1", correct_answers("Rust", 1))
        .await
        .unwrap();
    assert_eq!(generator.quiz_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.snapshot("s1").await.unwrap().quiz, quiz_before);
}

#[tokio::test]
async fn test_generation_failure_keeps_checkpoint_and_proceed_recovers() {
    let generator = Arc::new(ScriptedGenerator::default());
    let engine = engine_with(generator.clone());
    generator.fail_lectures(1);

    let err = engine
        .start("s1", SessionState::with_topic("Rust", "none"))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Generation(GenerationError::Backend(_))));

    let cp = engine.checkpoint("s1").await.unwrap().unwrap();
    assert_eq!(cp.cursor, Cursor::Enter(NodeName::Lecture));
    assert!(cp.state.lecture.is_none());
    assert!(cp.state.learning_plan.is_some());
    assert!(!cp.state.waiting_for_input);

    // 未在等待输入：resume 被拒绝，检查点不变
    let err = engine
        .resume("s1", SessionPatch::quiz(BTreeMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotWaitingForInput(_)));
    let unchanged = engine.checkpoint("s1").await.unwrap().unwrap();
    assert_eq!(unchanged.state, cp.state);
    assert_eq!(unchanged.cursor, cp.cursor);

    let outcome = engine.proceed("s1").await.unwrap();
    assert_eq!(outcome.input_type(), InputType::Quiz);
    assert!(outcome.state().lecture.is_some());
}

#[tokio::test]
async fn test_service_retries_within_budget() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator.clone());

    generator.fail_lectures(2);
    let view = service.start("ok", "Rust", "none").await.unwrap();
    assert_eq!(view.input_type, InputType::Quiz);

    generator.fail_lectures(3);
    let err = service.start("exhausted", "Rust", "none").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InternalGenerationFailure);
    let view = err.view.expect("current state is reported");
    assert!(!view.waiting_for_input);
    assert_eq!(view.lesson_number, 1);

    // 上游恢复后手动重试即可继续
    let view = service.retry("exhausted").await.unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
}

#[tokio::test]
async fn test_invalid_decision_is_routing_error() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator.clone());

    service.start("s1", "Rust", "none").await.unwrap();
    service
        .submit_quiz_answers("s1", correct_answers("Rust", 1))
        .await
        .unwrap();

    generator.override_decision(Some("skip ahead"));
    let err = service
        .submit_assignment("s1", &full_submission("Rust", 1))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InternalError);
    assert!(err.message.contains("skip ahead"));

    let cp = service.engine().checkpoint("s1").await.unwrap().unwrap();
    assert_eq!(cp.cursor, Cursor::Exit(NodeName::Grade));
    assert_eq!(cp.state.assignment_score, 100);
    assert!(cp.state.grading_result.is_some());

    // 决策恢复正常后重跑只重新做路由，不再评分
    generator.override_decision(Some(" Advance "));
    let view = service.retry("s1").await.unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
    assert_eq!(view.lesson_number, 2);
    assert_eq!(generator.grade_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_submission_scores_zero_and_repeats() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator.clone());

    service.start("s1", "Rust", "none").await.unwrap();
    service
        .submit_quiz_answers("s1", correct_answers("Rust", 1))
        .await
        .unwrap();
    let view = service.submit_assignment("s1", "  \n ").await.unwrap();

    assert_eq!(generator.grade_calls.load(Ordering::SeqCst), 0);
    assert_eq!(view.assignment_score, 0);
    assert_eq!(
        view.weak_points,
        vec!["Rust concept 1.1".to_string(), "Rust concept 1.2".to_string()]
    );
    // 离线决策：作业不及格 → 重学本课
    assert_eq!(view.attempt_count, 1);
    assert_eq!(view.lesson_number, 1);
    assert_eq!(view.input_type, InputType::Quiz);

    let state = service.snapshot("s1").await.unwrap();
    assert!(state.assignment.is_none());
    assert!(state.assignment_submission.is_empty());
    assert_eq!(state.topic, "Rust");
}

#[tokio::test]
async fn test_wrong_quiz_answers_produce_weak_points() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator);

    service.start("s1", "Rust", "none").await.unwrap();
    let answers = HashMap::from([
        ("q0".to_string(), "C".to_string()),
        ("q1".to_string(), "yes".to_string()),
        ("q2".to_string(), "B".to_string()),
        ("bogus".to_string(), "A".to_string()),
    ]);
    let view = service.submit_quiz_answers("s1", answers).await.unwrap();
    // 漏答的判断题按空串判分，正确答案为 false 时记为答对
    assert_eq!(view.quiz_score, 40);
    assert_eq!(view.weak_points.len(), 3);
    assert!(view.weak_points[0].starts_with("Which option best describes"));
}

#[tokio::test]
async fn test_conversational_session() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator);

    let view = service.start_from_query("c1", "hello there").await.unwrap();
    assert_eq!(view.input_type, InputType::ExtractionRetry);
    assert!(!view.message.is_empty());

    let view = service
        .submit_free_text("c1", "I want to learn Go. I write Java at work")
        .await
        .unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
    assert_eq!(view.topic, "Go");

    let view = service
        .submit_free_text("c1", "1) A\n2) true\n3) B\n4) false\n5) Go concept 1.2")
        .await
        .unwrap();
    assert_eq!(view.input_type, InputType::Assignment);
    assert_eq!(view.quiz_score, 100);

    let view = service
        .submit_free_text("c1", &full_submission("Go", 1))
        .await
        .unwrap();
    assert_eq!(view.lesson_number, 2);
}

#[tokio::test]
async fn test_transport_errors() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator);

    let err = service.view("ghost").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SessionNotFound);
    assert!(err.view.is_none());

    service.start("s1", "Rust", "none").await.unwrap();
    let err = service.submit_assignment("s1", "too early").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    assert_eq!(err.view.unwrap().input_type, InputType::Quiz);
}

#[tokio::test]
async fn test_concurrent_sessions_are_isolated() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = Arc::new(service_with(generator));

    let a = {
        let service = service.clone();
        tokio::spawn(async move { service.start("a", "Rust", "none").await })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move { service.start("b", "Haskell", "none").await })
    };
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(a.topic, "Rust");
    assert_eq!(b.topic, "Haskell");

    service
        .submit_quiz_answers("a", correct_answers("Rust", 1))
        .await
        .unwrap();
    let a = service.view("a").await.unwrap();
    let b = service.view("b").await.unwrap();
    assert_eq!(a.input_type, InputType::Assignment);
    assert_eq!(b.input_type, InputType::Quiz);
    assert_eq!(b.quiz_score, 0);
}

#[tokio::test]
async fn test_busy_session_rejected_and_cancel() {
    let gate = Arc::new(Notify::new());
    let generator = Arc::new(ScriptedGenerator::gated(gate.clone()));
    let engine = engine_with(generator.clone());

    let running = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .start("s1", SessionState::with_topic("Rust", "none"))
                .await
        })
    };
    generator.entered.notified().await;

    let err = engine.proceed("s1").await.unwrap_err();
    assert!(matches!(err, WorkflowError::SessionBusy(_)));
    // 其他会话不受影响
    assert!(!engine.supervisor().is_busy("s2"));

    assert!(engine.cancel("s1"));
    let err = running.await.unwrap().unwrap_err();
    assert!(matches!(err, WorkflowError::Cancelled));

    let cp = engine.checkpoint("s1").await.unwrap().unwrap();
    assert_eq!(cp.cursor, Cursor::Enter(NodeName::GeneratePlan));
    assert!(cp.state.learning_plan.is_none());
    assert!(!engine.supervisor().is_busy("s1"));

    // 放行后可以从检查点继续
    gate.notify_one();
    let outcome = engine.proceed("s1").await.unwrap();
    assert_eq!(outcome.input_type(), InputType::Quiz);
}

#[tokio::test]
async fn test_sqlite_session_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("checkpoints.db");

    {
        let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::open(&path).unwrap());
        let engine = EngineBuilder::new(Collaborators::uniform(Arc::new(
            OfflineContentGenerator::default(),
        )))
        .checkpoint_store(store)
        .build();
        let outcome = engine
            .start("s1", SessionState::with_topic("Rust", "none"))
            .await
            .unwrap();
        assert_eq!(outcome.input_type(), InputType::Quiz);
    }

    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::open(&path).unwrap());
    let engine = EngineBuilder::new(Collaborators::uniform(Arc::new(
        OfflineContentGenerator::default(),
    )))
    .checkpoint_store(store)
    .build();
    let answers: BTreeMap<usize, String> = [
        (0, "A"),
        (1, "true"),
        (2, "B"),
        (3, "false"),
        (4, "Rust concept 1.1"),
    ]
    .into_iter()
    .map(|(i, a)| (i, a.to_string()))
    .collect();
    let outcome = engine.resume("s1", SessionPatch::quiz(answers)).await.unwrap();
    assert_eq!(outcome.input_type(), InputType::Assignment);
    assert_eq!(outcome.state().quiz_score, 100);
}

#[tokio::test]
async fn test_blank_new_query_keeps_session_waiting() {
    let generator = Arc::new(ScriptedGenerator::default());
    let service = service_with(generator);

    service.start_from_query("c1", "hello there").await.unwrap();
    let err = service.submit_new_query("c1", "   ").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
    let view = err.view.expect("current state is reported");
    assert!(view.waiting_for_input);
    assert_eq!(view.input_type, InputType::ExtractionRetry);

    let view = service
        .submit_new_query("c1", "I want to learn Rust. I know Python.")
        .await
        .unwrap();
    assert_eq!(view.input_type, InputType::Quiz);
    assert_eq!(view.topic, "Rust");
}
