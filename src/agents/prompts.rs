//! 各类内容生成与抽取的提示词
//!
//! system 提示词固定；user 提示词由参数拼装，结构约束（JSON Schema）由调用方追加。

use super::traits::{
    AdvanceParams, AssignmentParams, GradingParams, LectureParams, ProgressParams, QuizParams,
    RepeatParams,
};

pub const PROFESSOR_SYSTEM: &str = "You are an expert professor. You are patient, encouraging and clear, \
you adapt to the learner's background and you focus on understanding over memorization.";

pub const TUTOR_SYSTEM: &str = "You are a supportive tutor focused on personalized learning. \
You identify weak points, give targeted and constructive feedback and keep academic rigor.";

pub const PLANNER_SYSTEM: &str =
    "You are an expert educational consultant creating a comprehensive learning plan.";

pub const EVALUATOR_SYSTEM: &str = "You grade short answer quiz questions. Be fair but rigorous: \
the answer must show actual understanding, not vague statements.";

pub const EXTRACTION_SYSTEM: &str =
    "You extract structured intent and content from what learners write.";

fn join_or(items: &[String], fallback: &str) -> String {
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

pub fn plan(topic: &str, background: &str) -> String {
    format!(
        "Topic: {topic}\nStudent background: {background}\n\n\
         Break the topic into 5-8 progressive lessons that scaffold on each other. \
         Give each lesson 3-5 measurable objectives, its key concepts, prerequisites, \
         a duration between 15 and 120 minutes and a difficulty (Beginner/Intermediate/Advanced). \
         Choose the starting difficulty and pace from the student's background."
    )
}

pub fn lecture(p: &LectureParams) -> String {
    format!(
        "Current lesson: {}\nLearning objectives: {}\nKey concepts: {}\n\
         Student's current knowledge: {}\nAreas needing extra attention: {}\n\n\
         Write a 15-20 minute lecture: a short introduction, 2-3 segments of 3-8 minutes \
         with interaction points, and a conclusion with key takeaways. \
         Spend extra time on the areas needing attention.",
        p.lesson_title,
        p.objectives.join("; "),
        p.key_concepts.join(", "),
        p.current_knowledge,
        join_or(&p.weak_points, "None identified"),
    )
}

pub fn quiz(p: &QuizParams) -> String {
    format!(
        "Lesson: {}\nObjectives: {}\nKey concepts: {}\nLecture summary:\n{}\n\n\
         Write exactly 5 questions mixing multiple_choice (4 options, answer letter A-D), \
         true_false and short_answer (with key points). Explain every correct answer.",
        p.lesson_title,
        p.objectives.join("; "),
        p.key_concepts.join(", "),
        p.lecture_summary,
    )
}

pub fn assignment(p: &AssignmentParams) -> String {
    format!(
        "Lesson: {}\nObjectives: {}\nKey concepts: {}\nQuiz performance: {}\n\n\
         Design a 30-60 minute practical assignment with 5-8 numbered steps, deliverables \
         and success criteria. Target the weak areas from the quiz.",
        p.lesson_title,
        p.objectives.join("; "),
        p.key_concepts.join(", "),
        p.quiz_performance,
    )
}

pub fn grading(p: &GradingParams) -> String {
    format!(
        "Assignment: {}\nSteps:\n{}\nSuccess criteria: {}\n\nStudent submission:\n{}\n\n\
         Grade out of 100 (pass at 70). List 2-3 strengths, 2-3 improvements, concrete \
         recommendations, the concepts needing reinforcement as weak_points, and a grade level \
         (Exceeds, Meets, Partially Meets, Does Not Meet).",
        p.assignment_title,
        p.steps.join("\n"),
        p.criteria.join("; "),
        p.submission,
    )
}

pub fn progress(p: &ProgressParams) -> String {
    format!(
        "Topic: {}\nCurrent lesson: {} ({} of {})\nQuiz score: {}%\nAssignment score: {}%\n\
         Weak points: {}\nAttempt number: {}\n\n\
         Decide whether the student should \"advance\" to the next lesson or \"repeat\" this one. \
         The decision field must be exactly advance or repeat.",
        p.topic,
        p.lesson_title,
        p.lesson_number,
        p.total_lessons,
        p.quiz_score,
        p.assignment_score,
        join_or(&p.weak_points, "None identified"),
        p.attempt_count,
    )
}

pub fn repeat(p: &RepeatParams) -> String {
    format!(
        "Lesson: {}\nWeak points: {}\nUpcoming attempt: {}\n\n\
         Write an encouraging message for a student repeating this lesson, with 2-3 focus \
         areas, study tips and what to expect next time.",
        p.lesson_title,
        join_or(&p.weak_points, "general concepts"),
        p.attempt_count,
    )
}

pub fn advance(p: &AdvanceParams) -> String {
    format!(
        "Completed lesson: {}\nNext lesson: {}\nKey takeaways: {}\n\n\
         Write a congratulatory message celebrating what was mastered and previewing what comes next.",
        p.completed_lesson,
        p.next_lesson,
        p.key_takeaways.join(", "),
    )
}

pub fn short_answer(question: &str, key_points: &[String], answer: &str) -> String {
    format!(
        "Question: {question}\nExpected key points: {}\nStudent's answer: {answer}\n\n\
         The answer is correct when it contains at least one key point, has no major \
         misconception, gives enough detail and is relevant. Vague answers are incorrect.",
        key_points.join(", "),
    )
}

pub fn topic_extraction(query: &str) -> String {
    format!(
        "Extract the topic the user wants to learn and their background from:\n{query}\n\n\
         If you cannot detect them, set both topic and background to 'failed to detect'."
    )
}

pub fn quiz_answers(message: &str, quiz_description: &str) -> String {
    format!(
        "Student's message with quiz answers:\n{message}\n\nQuiz questions:\n{quiz_description}\n\
         Map each answer to its question key (q0 is question 1). Multiple choice: the letter only. \
         True/false: True or False. Short answer: the full text. Use \"No answer provided\" when missing."
    )
}

pub fn assignment_submission(message: &str, assignment_description: &str) -> String {
    format!(
        "Student's submission message:\n{message}\n\nAssignment:\n{assignment_description}\n\n\
         Extract the submitted work (code, text, files) into submission_text, preserving formatting."
    )
}
