//! CLI output formatting: human-readable by default, JSON with `--json`.

use crate::jobs::model::{HitlPrompt, Job};

/// Print a job record.
pub fn print_job(job: &Job, json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(job).unwrap_or_default());
        return;
    }
    println!("job       {}", job.id);
    println!("status    {}", job.status.as_str());
    println!(
        "progress  {} ({:.0}%) - {}",
        job.progress.phase,
        job.progress.percent * 100.0,
        job.progress.message
    );
    if let Some(score) = job.state.final_score {
        println!("score     {:.2}", score);
    }
    if let Some(path) = &job.state.artifact_path {
        println!("artifact  {}", path);
    }
    if let Some(error) = &job.error {
        println!("error     [{}] {}", error.error_kind, error.message);
    }
}

/// Print an outstanding prompt, if any.
pub fn print_prompt(prompt: &Option<HitlPrompt>, json: bool) {
    match prompt {
        None => {
            if json {
                println!("{{}}");
            } else {
                println!("no outstanding prompt");
            }
        }
        Some(prompt) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(prompt).unwrap_or_default()
                );
                return;
            }
            println!("prompt    {:?}", prompt.prompt_type());
            println!("key       {}", prompt.key);
            match &prompt.payload {
                crate::jobs::model::HitlPayload::Clarify { questions } => {
                    for (i, q) in questions.iter().enumerate() {
                        println!("  {}. {}", i + 1, q);
                    }
                }
                crate::jobs::model::HitlPayload::Confirm { summary } => {
                    println!("  {}", summary);
                }
                crate::jobs::model::HitlPayload::Preview { name, body, .. } => {
                    println!("  draft {} ({} chars)", name, body.len());
                }
                crate::jobs::model::HitlPayload::Validate { report } => {
                    println!(
                        "  composite {:.2}, pass {}",
                        report.composite, report.pass
                    );
                    for issue in &report.compliance.critical_issues {
                        println!("  ! {}", issue);
                    }
                }
            }
        }
    }
}
