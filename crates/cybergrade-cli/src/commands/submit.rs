//! The `cybergrade submit` commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use cybergrade_core::results::QuizAnswer;
use cybergrade_core::traits::{ExamSubmitRequest, FlagSubmitRequest, QuizSubmitRequest};
use cybergrade_core::GradingEngine;

use super::context::{self, print_json};

/// Split `QUESTION_ID=ANSWER`. The answer may itself contain `=`.
fn parse_answer(raw: &str) -> Result<(String, String)> {
    let (id, answer) = raw
        .split_once('=')
        .with_context(|| format!("answer must look like QUESTION_ID=ANSWER: '{raw}'"))?;
    anyhow::ensure!(!id.trim().is_empty(), "answer has an empty question id: '{raw}'");
    Ok((id.trim().to_string(), answer.to_string()))
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value.with_context(|| format!("--{name} is required without --request"))
}

pub async fn flag(
    config_path: Option<PathBuf>,
    lab_id: String,
    flag_name: String,
    user: Option<String>,
    value: Option<String>,
    request: Option<String>,
) -> Result<()> {
    let request = match request {
        Some(json) => GradingEngine::parse_request::<FlagSubmitRequest>(&json)?,
        None => FlagSubmitRequest {
            user_id: required(user, "user")?,
            submission: required(value, "value")?,
        },
    };

    let workspace = context::open(config_path).await?;
    let response = workspace
        .engine
        .submit_flag(&lab_id, &flag_name, request)
        .await?;
    print_json(&response)
}

pub async fn quiz(
    config_path: Option<PathBuf>,
    quiz_id: String,
    user: Option<String>,
    answers: Vec<String>,
    request: Option<String>,
) -> Result<()> {
    let request = match request {
        Some(json) => GradingEngine::parse_request::<QuizSubmitRequest>(&json)?,
        None => QuizSubmitRequest {
            user_id: required(user, "user")?,
            answers: answers
                .iter()
                .map(|raw| {
                    let (question_id, answer) = parse_answer(raw)?;
                    Ok(QuizAnswer {
                        question_id,
                        answer,
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        },
    };

    let workspace = context::open(config_path).await?;
    let response = workspace.engine.submit_quiz(&quiz_id, request).await?;
    print_json(&response)
}

pub async fn exam(
    config_path: Option<PathBuf>,
    exam_id: String,
    stage: Option<String>,
    user: Option<String>,
    answers: Vec<String>,
    request: Option<String>,
) -> Result<()> {
    let request = match request {
        Some(json) => GradingEngine::parse_request::<ExamSubmitRequest>(&json)?,
        None => ExamSubmitRequest {
            user_id: required(user, "user")?,
            stage_id: required(stage, "stage")?,
            answers: answers
                .iter()
                .map(|raw| parse_answer(raw))
                .collect::<Result<BTreeMap<_, _>>>()?,
        },
    };

    let workspace = context::open(config_path).await?;
    let response = workspace.engine.submit_exam_stage(&exam_id, request).await?;
    print_json(&response)
}
