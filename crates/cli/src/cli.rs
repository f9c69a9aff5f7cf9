//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pipeline::RunId;

/// Quill speechwriting pipeline
#[derive(Parser, Debug)]
#[command(name = "quill")]
#[command(about = "Drafts, judges and polishes speeches from a short brief")]
#[command(version)]
pub struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(long, global = true, env = "QUILL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once and print the final text
    Generate(GenerateArgs),
    /// List recent saved runs for a caller
    History(HistoryArgs),
    /// Show the stored memory profile for a caller
    Profile(ProfileArgs),
    /// Record which candidate you preferred for a saved run
    Feedback(FeedbackArgs),
}

#[derive(Args, Debug, Clone, Default)]
#[group(required = false, multiple = false)]
pub struct IdentityArgs {
    /// Authenticated user id
    #[arg(long = "user", value_name = "ID")]
    pub user_id: Option<String>,

    /// Anonymous session id
    #[arg(long = "anon", value_name = "ID")]
    pub anon_id: Option<String>,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Free-text brief, or the edit instruction when refining
    #[arg(long)]
    pub brief: String,

    #[arg(long)]
    pub audience: Option<String>,

    #[arg(long)]
    pub event_context: Option<String>,

    #[arg(long)]
    pub tone: Option<String>,

    #[arg(long)]
    pub duration: Option<String>,

    /// Point that must appear (repeatable)
    #[arg(long = "include", value_name = "TEXT")]
    pub must_include: Vec<String>,

    /// Phrase or topic that must not appear (repeatable)
    #[arg(long = "avoid", value_name = "TEXT")]
    pub must_avoid: Vec<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// File holding the prior final text to refine
    #[arg(long, requires = "previous_instruction")]
    pub previous_file: Option<PathBuf>,

    /// Instruction the prior text was produced from
    #[arg(long, requires = "previous_file")]
    pub previous_instruction: Option<String>,

    /// Print the whole result, trace included, as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Maximum number of runs to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,
}

#[derive(Args, Debug)]
pub struct FeedbackArgs {
    /// Run id, as printed by `history` or `generate --json`
    #[arg(long = "run", value_name = "ID")]
    pub run_id: RunId,

    /// Preferred candidate in drafting order
    #[arg(long, value_name = "1|2", value_parser = clap::value_parser!(u8).range(1..=2))]
    pub choice: u8,
}
