//! The `cybergrade init` command.

use std::path::Path;

use anyhow::Result;

const FILES: &[(&str, &str)] = &[
    ("cybergrade.toml", SAMPLE_CONFIG),
    ("roster.toml", SAMPLE_ROSTER),
    ("content/labs/web-101.toml", SAMPLE_LAB),
    ("content/quizzes/net-basics.toml", SAMPLE_QUIZ),
    ("content/exams/final.toml", SAMPLE_EXAM),
];

pub fn execute() -> Result<()> {
    for (path, content) in FILES {
        let path = Path::new(path);
        if path.exists() {
            println!("{} already exists, skipping.", path.display());
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    std::fs::create_dir_all("cybergrade-data/artifacts/web-101")?;

    println!("\nNext steps:");
    println!("  1. Run: cybergrade validate");
    println!("  2. Run: cybergrade submit flag --lab web-101 --flag cookie --user alice --value 'CTF{{cookie_monster}}'");
    println!("  3. Run: cybergrade export --format csv");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# cybergrade configuration

content_root = "./content"
journal_path = "./cybergrade-data/journal.jsonl"
artifact_root = "./cybergrade-data/artifacts"
roster = "./roster.toml"

# Make `exact` flags case-insensitive unless a flag sets case_sensitive.
case_insensitive_flags = false
"#;

const SAMPLE_ROSTER: &str = r#"[[users]]
user_id = "alice"
email = "alice@example.edu"
student_id = "S-1001"

[[users]]
user_id = "bob"
email = "bob@example.edu"
student_id = "S-1002"
"#;

const SAMPLE_LAB: &str = r#"id = "web-101"
title = "Web basics"
instructions = "labs/web-101.md"

[[flags]]
name = "cookie"
prompt = "Find the admin session cookie"
validator = "exact"
value = "CTF{cookie_monster}"

[[flags]]
name = "sqli"
prompt = "Dump the users table"
validator = "regex"
pattern = 'CTF\{[a-z_]+\}'

[[flags]]
name = "shell"
prompt = "Upload a web shell and submit its file name"
validator = "file_exists"
"#;

const SAMPLE_QUIZ: &str = r#"id = "net-basics"
title = "Networking basics"

[[questions]]
id = "https-port"
prompt = "Which port does HTTPS use by default?"
type = "multiple_choice"
answer = "b"
points = 2
choices = [{ key = "a", label = "80" }, { key = "b", label = "443" }, { key = "c", label = "8080" }]

[[questions]]
id = "sniffer"
prompt = "Name a graphical packet sniffer"
type = "short_answer"
answer = "Wireshark"
"#;

const SAMPLE_EXAM: &str = r#"id = "final"
title = "Final exam"

[[stages]]
id = "recon"
title = "Reconnaissance"
description = "Identify the services running on the target"
grading = "auto"
max_score = 4

[[stages.questions]]
id = "scanner"
prompt = "Which tool did you use to scan the target?"
type = "short_answer"
answer = "nmap"
points = 2

[[stages.questions]]
id = "ssh-port"
prompt = "Which port is SSH listening on?"
type = "short_answer"
answer = "2222"
points = 2

[[stages]]
id = "report"
title = "Exploitation report"
description = "Describe how you gained a foothold"
grading = "manual"
max_score = 10
"#;
