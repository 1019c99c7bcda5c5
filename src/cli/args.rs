//! CLI argument parsing using clap.
//!
//! Defines the command-line interface for skillfab-cli.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Skillfab CLI - drive the skill-authoring pipeline from the terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "skillfab-cli")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Settings file (default: ~/.skillfab/settings.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// OpenRouter API key (overrides settings)
    #[arg(long, env = "SKILLFAB_API_KEY")]
    pub api_key: Option<String>,

    /// Run without an LM provider (status/list/export/respond only)
    #[arg(long)]
    pub offline: bool,

    /// Output as JSON (for scripting/parsing)
    #[arg(long)]
    pub json: bool,

    /// Show verbose output (debug information)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Submit a skill-creation request
    Create {
        /// The task description
        task: String,

        /// Extra context for the request
        #[arg(long)]
        context: Option<String>,

        /// User identifier
        #[arg(long)]
        user: Option<String>,

        /// Authoring style: navigation_hub, comprehensive, or minimal
        #[arg(long)]
        style: Option<String>,

        /// Poll until the job reaches a terminal state
        #[arg(long)]
        wait: bool,
    },

    /// Show a job's status
    Status {
        /// Job id
        job_id: String,
    },

    /// Respond to a job's outstanding HITL prompt
    Respond {
        /// Job id
        job_id: String,

        /// Prompt key from the peek endpoint
        #[arg(long)]
        key: String,

        /// Action word: proceed, revise, or cancel (unknown words proceed)
        #[arg(long)]
        action: String,

        /// Revision feedback or clarification answers
        #[arg(long)]
        feedback: Option<String>,
    },

    /// Cancel a job
    Cancel {
        /// Job id
        job_id: String,
    },

    /// List every skill in the taxonomy
    List,

    /// Export the taxonomy discovery XML
    Export,

    /// Run the HTTP server
    #[cfg(feature = "server")]
    Serve {
        /// Server port
        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_parses_with_style() {
        let args = Args::parse_from([
            "skillfab-cli",
            "create",
            "a git skill",
            "--style",
            "minimal",
            "--wait",
        ]);
        match args.command {
            Command::Create { task, style, wait, .. } => {
                assert_eq!(task, "a git skill");
                assert_eq!(style.as_deref(), Some("minimal"));
                assert!(wait);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn respond_requires_key_and_action() {
        let result = Args::try_parse_from(["skillfab-cli", "respond", "abc"]);
        assert!(result.is_err());

        let args = Args::parse_from([
            "skillfab-cli",
            "respond",
            "abc",
            "--key",
            "abc:1",
            "--action",
            "proceed",
        ]);
        match args.command {
            Command::Respond { key, action, .. } => {
                assert_eq!(key, "abc:1");
                assert_eq!(action, "proceed");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_parse() {
        let args = Args::parse_from(["skillfab-cli", "--offline", "--json", "list"]);
        assert!(args.offline);
        assert!(args.json);
    }
}
