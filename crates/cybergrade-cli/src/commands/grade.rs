//! The `cybergrade grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use uuid::Uuid;

use super::context::{self, print_json};

enum Target {
    Submission(Uuid),
    Latest {
        exam: String,
        stage: String,
        user: String,
    },
}

pub async fn execute(
    config_path: Option<PathBuf>,
    exam: Option<String>,
    stage: Option<String>,
    user: Option<String>,
    submission: Option<String>,
    score: u32,
) -> Result<()> {
    let target = match (submission, exam, stage, user) {
        (Some(raw), _, _, _) => Target::Submission(
            Uuid::parse_str(raw.trim())
                .with_context(|| format!("invalid submission id: '{raw}'"))?,
        ),
        (None, Some(exam), Some(stage), Some(user)) => Target::Latest { exam, stage, user },
        _ => anyhow::bail!("either --submission or all of --exam, --stage and --user are required"),
    };

    let workspace = context::open(config_path).await?;
    let response = match target {
        Target::Submission(id) => workspace.engine.finalize_submission(id, score).await?,
        Target::Latest { exam, stage, user } => {
            workspace
                .engine
                .set_final_score(&exam, &stage, &user, score)
                .await?
        }
    };
    print_json(&response)
}
