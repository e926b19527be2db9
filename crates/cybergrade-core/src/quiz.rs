//! Objective answer grading for quizzes and auto-graded exam stages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Question, QuestionKind, QuizDefinition};
use crate::results::QuizAnswer;

/// Outcome of grading one full set of answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGrade {
    pub score: u32,
    /// Sum of all question points, answered or not.
    pub max_score: u32,
    pub per_question: Vec<QuestionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub correct: bool,
    pub points_awarded: u32,
}

/// Grade a quiz submission.
///
/// Answers for unknown question ids are ignored; if a question is answered
/// more than once the last answer wins.
pub fn grade(quiz: &QuizDefinition, answers: &[QuizAnswer]) -> QuizGrade {
    let answer_map: HashMap<&str, &str> = answers
        .iter()
        .map(|a| (a.question_id.as_str(), a.answer.as_str()))
        .collect();
    grade_questions(&quiz.questions, |id| answer_map.get(id).copied())
}

/// Grade a list of questions, looking each answer up by question id.
pub fn grade_questions<'a>(
    questions: &[Question],
    answer_for: impl Fn(&str) -> Option<&'a str>,
) -> QuizGrade {
    let mut score = 0;
    let mut max_score = 0;
    let mut per_question = Vec::with_capacity(questions.len());

    for question in questions {
        max_score += question.points;
        let correct = answer_for(&question.id)
            .map(|answer| answer_matches(question, answer))
            .unwrap_or(false);
        let points_awarded = if correct { question.points } else { 0 };
        score += points_awarded;
        per_question.push(QuestionOutcome {
            question_id: question.id.clone(),
            correct,
            points_awarded,
        });
    }

    QuizGrade {
        score,
        max_score,
        per_question,
    }
}

/// Does a single answer match the canonical one?
///
/// Multiple choice compares choice keys exactly. Short answers compare trimmed
/// and case-folded; there is no partial credit and no fuzzy matching.
pub fn answer_matches(question: &Question, answer: &str) -> bool {
    match question.kind {
        QuestionKind::MultipleChoice => answer == question.answer,
        QuestionKind::ShortAnswer => {
            let answer = answer.trim();
            !answer.is_empty() && answer.to_lowercase() == question.answer.trim().to_lowercase()
        }
    }
}
