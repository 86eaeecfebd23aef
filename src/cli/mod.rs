//! 交互式终端：SessionService 之上的一层薄传输
//!
//! 逐行读取学员输入，按会话等待的输入类型提示作答；每一步都已写入检查点，随时输入 quit 退出，
//! 下次用同一个会话 ID 启动即可从暂停处继续。

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::core::SessionView;
use crate::service::{ErrorCode, ServiceError, SessionService};
use crate::session::{
    Assignment, InputType, LearningPlan, Lecture, QuestionKind, Quiz, SessionState,
};

const QUIT: &str = "quit";

pub struct Terminal<R> {
    service: Arc<SessionService>,
    session_id: String,
    input: Lines<R>,
}

/// 一次交互的结果
enum Step {
    Continue(SessionView),
    Quit,
}

impl<R: AsyncBufRead + Unpin> Terminal<R> {
    pub fn new(service: Arc<SessionService>, session_id: impl Into<String>, input: R) -> Self {
        Self {
            service,
            session_id: session_id.into(),
            input: input.lines(),
        }
    }

    async fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let line = self.input.next_line().await.context("failed to read input")?;
        Ok(line.filter(|l| l.trim() != QUIT))
    }

    /// 运行到课程结束或学员退出；返回最后一次看到的视图
    pub async fn run(&mut self) -> anyhow::Result<Option<SessionView>> {
        let mut view = match self.service.view(&self.session_id).await {
            Ok(view) if view.waiting_for_input || !view.completed => {
                println!("Resuming session {}.", self.session_id);
                if view.waiting_for_input {
                    view
                } else {
                    // 上次在节点执行中途中断，从检查点继续
                    let result = self.service.retry(&self.session_id).await;
                    match self.outcome(result).await? {
                        Step::Continue(v) => v,
                        Step::Quit => return Ok(None),
                    }
                }
            }
            Ok(view) => {
                println!("Session {} is already complete.", self.session_id);
                return Ok(Some(view));
            }
            Err(e) if e.code == ErrorCode::SessionNotFound => {
                println!("What would you like to learn? Tell me a little about your background too.");
                let Some(query) = self.read_line().await? else {
                    return Ok(None);
                };
                let result = self.service.start_from_query(&self.session_id, &query).await;
                match self.outcome(result).await? {
                    Step::Continue(v) => v,
                    Step::Quit => return Ok(None),
                }
            }
            Err(e) => return Err(e).context("failed to load session"),
        };

        loop {
            if view.completed {
                println!("\n{}", view.message);
                return Ok(Some(view));
            }
            let state = self
                .service
                .snapshot(&self.session_id)
                .await
                .context("failed to load session state")?;

            let step = match view.input_type {
                InputType::Quiz => self.answer_quiz(&state).await?,
                InputType::Assignment => self.submit_assignment(&state).await?,
                InputType::NewQuery | InputType::ExtractionRetry => self.new_query(&state).await?,
                InputType::None => {
                    // 不在等待输入却也未完成：上次执行失败，重跑
                    let result = self.service.retry(&self.session_id).await;
                    self.outcome(result).await?
                }
            };
            match step {
                Step::Continue(next) => view = next,
                Step::Quit => {
                    println!("Progress saved. Run again with session id {} to continue.", self.session_id);
                    return Ok(Some(view));
                }
            }
        }
    }

    async fn answer_quiz(&mut self, state: &SessionState) -> anyhow::Result<Step> {
        if !state.message.is_empty() {
            println!("\n{}", state.message);
        }
        if state.attempt_count == 0 && state.current_lesson_index == 0 {
            if let Some(plan) = &state.learning_plan {
                print_plan(plan);
            }
        }
        if let Some(lecture) = &state.lecture {
            print_lecture(lecture);
        }
        let Some(quiz) = &state.quiz else {
            anyhow::bail!("session is waiting for quiz answers but has no quiz");
        };
        print_quiz(quiz);

        let mut answers = HashMap::new();
        for i in 0..quiz.questions.len() {
            print!("Answer {}: ", i + 1);
            flush();
            let Some(answer) = self.read_line().await? else {
                return Ok(Step::Quit);
            };
            answers.insert(format!("q{i}"), answer.trim().to_string());
        }
        let result = self.service.submit_quiz_answers(&self.session_id, answers).await;
        self.outcome(result).await
    }

    async fn submit_assignment(&mut self, state: &SessionState) -> anyhow::Result<Step> {
        println!("\nQuiz score: {}%", state.quiz_score);
        if !state.weak_points.is_empty() {
            println!("Review: {}", state.weak_points.join("; "));
        }
        let Some(assignment) = &state.assignment else {
            anyhow::bail!("session is waiting for a submission but has no assignment");
        };
        print_assignment(assignment);
        println!("Enter your submission (finish with an empty line):");

        let mut lines = Vec::new();
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(Step::Quit);
            };
            if line.trim().is_empty() {
                break;
            }
            lines.push(line);
        }
        let result = self
            .service
            .submit_assignment(&self.session_id, &lines.join("\n"))
            .await;
        let step = self.outcome(result).await?;
        if let Step::Continue(_) = &step {
            if let Ok(state) = self.service.snapshot(&self.session_id).await {
                report_progress(&state);
            }
        }
        Ok(step)
    }

    async fn new_query(&mut self, state: &SessionState) -> anyhow::Result<Step> {
        println!("\n{}", state.message);
        let Some(query) = self.read_line().await? else {
            return Ok(Step::Quit);
        };
        let result = self.service.submit_new_query(&self.session_id, &query).await;
        self.outcome(result).await
    }

    /// 处理服务调用结果；生成失败时询问是否重试
    async fn outcome(&mut self, result: Result<SessionView, ServiceError>) -> anyhow::Result<Step> {
        let mut result = result;
        loop {
            match result {
                Ok(view) => return Ok(Step::Continue(view)),
                Err(e) if e.code == ErrorCode::InternalGenerationFailure => {
                    println!("Content generation failed: {}", e.message);
                    print!("Retry? [y/N] ");
                    flush();
                    let answer = self.read_line().await?.unwrap_or_default();
                    if !answer.trim().eq_ignore_ascii_case("y") {
                        return Ok(Step::Quit);
                    }
                    result = self.service.retry(&self.session_id).await;
                }
                Err(e) if matches!(e.code, ErrorCode::InvalidInput | ErrorCode::NotWaitingForInput) => {
                    println!("{}", e.message);
                    return match e.view {
                        Some(view) => Ok(Step::Continue(view)),
                        None => Ok(Step::Quit),
                    };
                }
                Err(e) => return Err(e).context("session failed"),
            }
        }
    }
}

fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn print_plan(plan: &LearningPlan) {
    println!("\n=== Learning plan: {} ===", plan.topic);
    for lesson in &plan.lessons {
        println!(
            "  {}. {} ({} min, {:?})",
            lesson.lesson_number, lesson.title, lesson.duration_minutes, lesson.difficulty
        );
    }
}

fn print_lecture(lecture: &Lecture) {
    println!("\n=== {} ===\n{}", lecture.lesson_title, lecture.introduction);
    for seg in &lecture.segments {
        println!("\n-- {}. {} --\n{}", seg.segment_number, seg.title, seg.content);
    }
    println!("\n{}", lecture.conclusion);
    if !lecture.key_takeaways.is_empty() {
        println!("Key takeaways: {}", lecture.key_takeaways.join("; "));
    }
}

fn print_quiz(quiz: &Quiz) {
    println!("\n=== Quiz: {} ===", quiz.lesson_title);
    for (i, q) in quiz.questions.iter().enumerate() {
        println!("\n{}. {}", i + 1, q.question);
        match &q.kind {
            QuestionKind::MultipleChoice { options, .. } => {
                for (letter, option) in ['A', 'B', 'C', 'D'].iter().zip(options) {
                    println!("   {letter}) {option}");
                }
            }
            QuestionKind::TrueFalse { .. } => println!("   (True / False)"),
            QuestionKind::ShortAnswer { .. } => println!("   (short answer)"),
            QuestionKind::Unsupported => {}
        }
    }
}

fn print_assignment(assignment: &Assignment) {
    println!("\n=== Assignment: {} ===", assignment.title);
    println!("{}\n{}", assignment.objective, assignment.background);
    for step in &assignment.steps {
        println!("  {}. {}", step.step_number, step.instruction);
    }
    println!("Deliverables: {}", assignment.deliverables.join("; "));
}

fn report_progress(state: &SessionState) {
    println!("\nAssignment score: {}%", state.assignment_score);
    if let Some(decision) = &state.last_decision {
        println!("\nDecision: {} ({})", decision.decision, decision.reasoning);
    }
    if !state.message.is_empty() && !state.completed {
        println!("{}", state.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::OfflineContentGenerator;
    use crate::core::RecoveryEngine;
    use crate::workflow::{Collaborators, EngineBuilder};

    #[tokio::test]
    async fn test_scripted_session_to_completion() {
        let engine = EngineBuilder::new(Collaborators::uniform(Arc::new(
            OfflineContentGenerator::new(5),
        )))
        .build();
        let service = Arc::new(SessionService::new(Arc::new(engine), RecoveryEngine::default()));

        let mut script = String::from("I want to learn Rust. I know Python.\n");
        for n in 1..=5 {
            script.push_str("A\ntrue\nB\nfalse\n");
            script.push_str(&format!("uses Rust concept {n}.1\n"));
            script.push_str(&format!("Rust concept {n}.1 and Rust concept {n}.2\n\n"));
        }

        let mut terminal = Terminal::new(service, "cli", script.as_bytes());
        let view = terminal.run().await.unwrap().unwrap();
        assert!(view.completed);
        assert_eq!(view.lesson_total, 5);
    }

    #[tokio::test]
    async fn test_quit_keeps_session_resumable() {
        let engine = EngineBuilder::new(Collaborators::uniform(Arc::new(
            OfflineContentGenerator::default(),
        )))
        .build();
        let service = Arc::new(SessionService::new(Arc::new(engine), RecoveryEngine::default()));

        let mut terminal = Terminal::new(
            service.clone(),
            "cli",
            "learn Rust\nquit\n".as_bytes(),
        );
        let view = terminal.run().await.unwrap().unwrap();
        assert_eq!(view.input_type, InputType::Quiz);
        assert_eq!(service.view("cli").await.unwrap().input_type, InputType::Quiz);
    }
}
