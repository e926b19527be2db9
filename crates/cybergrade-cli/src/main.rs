//! cybergrade CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cybergrade", version, about = "Lab, quiz and exam grading")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config, roster and sample content
    Init,

    /// Load and check the content directory
    Validate {
        /// Content directory (defaults to content_root from the config)
        #[arg(long)]
        content: Option<PathBuf>,
    },

    /// Submit a flag, quiz or exam stage
    Submit {
        #[command(subcommand)]
        target: SubmitTarget,
    },

    /// Record the final score of a manually graded exam stage
    Grade {
        /// Exam id
        #[arg(long, requires_all = ["stage", "user"])]
        exam: Option<String>,

        /// Stage id
        #[arg(long)]
        stage: Option<String>,

        /// User whose latest attempt is graded
        #[arg(long)]
        user: Option<String>,

        /// Grade this submission id instead of the user's latest attempt
        #[arg(long, conflicts_with = "exam")]
        submission: Option<String>,

        /// Final score
        #[arg(long)]
        score: u32,
    },

    /// Show a user's exam progress
    Status {
        /// User id
        #[arg(long)]
        user: String,

        /// Exam id
        #[arg(long)]
        exam: String,
    },

    /// Show everything a user has done
    Dashboard {
        /// User id
        #[arg(long)]
        user: String,

        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Export scores for every known user
    Export {
        /// Output format: csv, html, json, all
        #[arg(long, default_value = "csv")]
        format: String,

        /// Output directory
        #[arg(long, default_value = "./cybergrade-export")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum SubmitTarget {
    /// Submit a lab flag
    Flag {
        /// Lab id
        #[arg(long)]
        lab: String,

        /// Flag name
        #[arg(long)]
        flag: String,

        /// User id
        #[arg(long, required_unless_present = "request")]
        user: Option<String>,

        /// Submitted value
        #[arg(long, required_unless_present = "request")]
        value: Option<String>,

        /// Raw JSON request body: {"user_id", "submission"}
        #[arg(long, conflicts_with_all = ["user", "value"])]
        request: Option<String>,
    },

    /// Submit quiz answers
    Quiz {
        /// Quiz id
        #[arg(long)]
        quiz: String,

        /// User id
        #[arg(long, required_unless_present = "request")]
        user: Option<String>,

        /// Answer as QUESTION_ID=ANSWER (repeatable)
        #[arg(long = "answer")]
        answers: Vec<String>,

        /// Raw JSON request body: {"user_id", "answers": [{"question_id", "answer"}]}
        #[arg(long, conflicts_with_all = ["user", "answers"])]
        request: Option<String>,
    },

    /// Submit an exam stage
    Exam {
        /// Exam id
        #[arg(long)]
        exam: String,

        /// Stage id
        #[arg(long, required_unless_present = "request")]
        stage: Option<String>,

        /// User id
        #[arg(long, required_unless_present = "request")]
        user: Option<String>,

        /// Answer as QUESTION_ID=ANSWER (repeatable)
        #[arg(long = "answer")]
        answers: Vec<String>,

        /// Raw JSON request body: {"user_id", "stage_id", "answers": {..}}
        #[arg(long, conflicts_with_all = ["stage", "user", "answers"])]
        request: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cybergrade=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { content } => commands::validate::execute(config, content),
        Commands::Submit { target } => match target {
            SubmitTarget::Flag {
                lab,
                flag,
                user,
                value,
                request,
            } => commands::submit::flag(config, lab, flag, user, value, request).await,
            SubmitTarget::Quiz {
                quiz,
                user,
                answers,
                request,
            } => commands::submit::quiz(config, quiz, user, answers, request).await,
            SubmitTarget::Exam {
                exam,
                stage,
                user,
                answers,
                request,
            } => commands::submit::exam(config, exam, stage, user, answers, request).await,
        },
        Commands::Grade {
            exam,
            stage,
            user,
            submission,
            score,
        } => commands::grade::execute(config, exam, stage, user, submission, score).await,
        Commands::Status { user, exam } => commands::status::execute(config, user, exam).await,
        Commands::Dashboard { user, format } => {
            commands::dashboard::execute(config, user, format).await
        }
        Commands::Export { format, output } => {
            commands::export::execute(config, format, output).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
