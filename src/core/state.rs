//! 会话视图：SessionState 对调用方的投影
//!
//! 传输层（终端 / 请求响应 API）只看到轻量的 SessionView：暂停信号、完成标志、课时位置、分数，
//! 以及与当前阶段相关的最新内容。

use serde::Serialize;

use crate::session::{
    Assignment, GradingResult, InputType, LearningPlan, Lecture, Quiz, SessionState,
};

/// 当前阶段相关的内容
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageContent {
    Nothing,
    Plan(LearningPlan),
    Lecture(Lecture),
    Quiz(Quiz),
    Assignment(Assignment),
    Grading(GradingResult),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub waiting_for_input: bool,
    pub input_type: InputType,
    pub completed: bool,
    pub topic: String,
    /// 1 起的课时序号；计划尚未生成时为 0
    pub lesson_number: usize,
    pub lesson_total: usize,
    pub lesson_title: Option<String>,
    pub attempt_count: u32,
    pub quiz_score: u32,
    pub assignment_score: u32,
    pub weak_points: Vec<String>,
    pub message: String,
    pub content: StageContent,
}

impl SessionView {
    pub fn project(session_id: &str, state: &SessionState) -> Self {
        Self {
            session_id: session_id.to_string(),
            waiting_for_input: state.waiting_for_input,
            input_type: state.input_type,
            completed: state.completed,
            topic: state.topic.clone(),
            lesson_number: if state.learning_plan.is_some() {
                (state.current_lesson_index + 1).min(state.lesson_count())
            } else {
                0
            },
            lesson_total: state.lesson_count(),
            lesson_title: state.current_lesson().map(|l| l.title.clone()),
            attempt_count: state.attempt_count,
            quiz_score: state.quiz_score,
            assignment_score: state.assignment_score,
            weak_points: state.weak_points.clone(),
            message: state.message.clone(),
            content: stage_content(state),
        }
    }
}

/// 按阶段挑出最相关的内容：暂停时给出待作答的测验 / 作业，否则给出最新产物
fn stage_content(state: &SessionState) -> StageContent {
    match state.input_type {
        InputType::Quiz => {
            if let Some(quiz) = &state.quiz {
                return StageContent::Quiz(quiz.clone());
            }
        }
        InputType::Assignment => {
            if let Some(assignment) = &state.assignment {
                return StageContent::Assignment(assignment.clone());
            }
        }
        _ => {}
    }
    if let Some(grading) = &state.grading_result {
        StageContent::Grading(grading.clone())
    } else if let Some(lecture) = &state.lecture {
        StageContent::Lecture(lecture.clone())
    } else if let Some(plan) = &state.learning_plan {
        StageContent::Plan(plan.clone())
    } else {
        StageContent::Nothing
    }
}
