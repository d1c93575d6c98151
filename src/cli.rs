//! CLI argument parsing for the story pipeline.
//!
//! The CLI is a thin harness: it loads inputs, resolves the collaborator,
//! runs one library stage and writes its envelope.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "storyline",
    version,
    about = "Synthesize structured stories from clusters of news articles",
    after_help = "Examples:\n  storyline story --articles clusters/harbor_fire.json --out out/harbor_fire.json\n  storyline story --articles cluster.json --pipeline leaf_only.json --lm 'llm -m {model}'\n  storyline classify --stories out/stories.json\n  storyline link --group-a morning.json --group-b evening.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub collaborator: CollaboratorArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    Story(StoryArgs),
    Classify(ClassifyArgs),
    Link(LinkArgs),
}

/// Collaborator selection shared by every stage.
#[derive(Args, Debug)]
pub struct CollaboratorArgs {
    /// Model identifier passed to the collaborator (env: STORYLINE_MODEL)
    #[arg(long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Local LM command; reads the prompt on stdin, writes JSON on stdout
    /// (env: STORYLINE_LM_COMMAND)
    #[arg(long, global = true, value_name = "COMMAND")]
    pub lm: Option<String>,
}

/// Story command inputs for a single cluster.
#[derive(Parser, Debug)]
#[command(about = "Generate a story tree from a cluster of articles")]
pub struct StoryArgs {
    /// JSON file holding the cluster's articles
    #[arg(long, value_name = "PATH")]
    pub articles: PathBuf,

    /// JSON file of pipeline switches (defaults to the full pipeline)
    #[arg(long, value_name = "PATH")]
    pub pipeline: Option<PathBuf>,

    /// One collaborator call per capability instead of a single combined call
    #[arg(long)]
    pub split_calls: bool,

    /// Also write the effective pipeline switches to this path
    #[arg(long, value_name = "PATH")]
    pub dump_pipeline: Option<PathBuf>,

    /// Cluster name recorded in the output (defaults to the file stem)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Output path for the story envelope (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Classify command inputs.
#[derive(Parser, Debug)]
#[command(about = "Assign topics to a list of stories")]
pub struct ClassifyArgs {
    /// JSON file holding stories (or a story envelope)
    #[arg(long, value_name = "PATH")]
    pub stories: PathBuf,

    /// Drop topics that are not in the fixed vocabulary
    #[arg(long)]
    pub strict_topics: bool,

    /// Name recorded in the output (defaults to the file stem)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Output path for the classification envelope (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}

/// Link command inputs for two independently produced story lists.
#[derive(Parser, Debug)]
#[command(about = "Link stories across two groups that cover the same event")]
pub struct LinkArgs {
    /// JSON file holding the first group of stories
    #[arg(long, value_name = "PATH")]
    pub group_a: PathBuf,

    /// JSON file holding the second group of stories
    #[arg(long, value_name = "PATH")]
    pub group_b: PathBuf,

    /// Output path for the link envelope (stdout when omitted)
    #[arg(long, value_name = "PATH")]
    pub out: Option<PathBuf>,
}
