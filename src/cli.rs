use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None, name = "atx", bin_name = "atx")]
pub struct Cli {
    /// Override the configuration directory.
    #[arg(long, value_name = "DIR", global = true)]
    pub config_dir: Option<PathBuf>,
    /// Use a different API base URL for this invocation.
    #[arg(long, value_name = "URL", global = true)]
    pub server: Option<String>,
    /// Emit machine-readable output when supported.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,
    /// Increase log verbosity (use -vv for trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Silence all log output.
    #[arg(short, long, action = ArgAction::SetTrue, global = true)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search transcripts for a term.
    Search(SearchCommand),
    /// Graph daily hits for a term across streams.
    Graph(GraphCommand),
    /// Graph hits for a term within one stream.
    StreamGraph(StreamGraphCommand),
    /// Print a full transcript.
    Transcript(TranscriptCommand),
    /// Print the external and internal links for a transcript line.
    Link(LinkCommand),
    /// Start the interactive browser on a route such as `/transcript/ID#T01-02-03`.
    Open(OpenCommand),
    /// Manage the membership key.
    #[command(subcommand)]
    Membership(MembershipCommand),
    /// Show or change persisted settings.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Inspect configuration files.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print shell completions.
    Completions(CompletionsCommand),
    /// Print the man page.
    Man,
}

/// Filters shared by search and graph.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only streams whose title contains this text.
    #[arg(long, value_name = "TEXT")]
    pub title: Option<String>,
    /// Only streams by this streamer.
    #[arg(long)]
    pub streamer: Option<String>,
    /// Earliest stream date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
    pub from: Option<String>,
    /// Latest stream date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date_arg)]
    pub to: Option<String>,
    /// Restrict to a stream type (repeatable).
    #[arg(long = "type", value_name = "TYPE", action = ArgAction::Append)]
    pub stream_types: Vec<String>,
    /// Match whole words only.
    #[arg(long, action = ArgAction::SetTrue)]
    pub whole_word: bool,
}

#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Text to search for (omit to list by filters only).
    pub term: Option<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Print every context line instead of a per-stream summary.
    #[arg(long, action = ArgAction::SetTrue)]
    pub expand: bool,
    /// Emit JSON results.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct GraphCommand {
    /// Text to count.
    pub term: String,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Show running totals instead of per-day counts.
    #[arg(long, action = ArgAction::SetTrue)]
    pub cumulative: bool,
    /// Emit JSON results.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StreamGraphCommand {
    /// Stream identifier.
    pub id: String,
    /// Text to count.
    pub term: Option<String>,
    /// Match whole words only.
    #[arg(long, action = ArgAction::SetTrue)]
    pub whole_word: bool,
    /// Emit JSON results.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TranscriptCommand {
    /// Stream identifier.
    pub id: String,
    /// Only print lines containing this text (case-insensitive).
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,
    /// Start printing at the line beginning at this time (hh:mm:ss).
    #[arg(long, value_name = "TIME", conflicts_with = "link")]
    pub at: Option<String>,
    /// Start printing at the line named by a deep link.
    #[arg(long, value_name = "ROUTE")]
    pub link: Option<String>,
    /// Emit JSON results.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct LinkCommand {
    /// Stream identifier.
    pub id: String,
    /// Line start time (hh:mm:ss).
    pub timestamp: String,
    /// Stream type; `Twitch` produces a Twitch link, anything else YouTube.
    #[arg(long = "type", value_name = "TYPE", default_value = "Video")]
    pub stream_type: String,
}

#[derive(Debug, Args)]
pub struct OpenCommand {
    /// Route string, e.g. `/search` or `/transcript/ID#T01-02-03`.
    pub route: String,
}

#[derive(Debug, Subcommand)]
pub enum MembershipCommand {
    /// Verify a key with the server and store it on success.
    Verify(VerifyCommand),
    /// Show the stored key's membership.
    Status,
    /// Delete the stored key.
    Clear,
}

#[derive(Debug, Args)]
pub struct VerifyCommand {
    /// Membership key to verify.
    pub key: String,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the persisted settings.
    Show,
    /// Change one setting.
    Set(SettingsSetCommand),
}

#[derive(Debug, Args)]
pub struct SettingsSetCommand {
    pub key: SettingKey,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SettingKey {
    Theme,
    Density,
    Sidebar,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Dump the merged configuration TOML.
    Dump,
    /// Show configuration search paths.
    Where,
    /// Validate configuration values.
    Lint,
    /// Print the JSON schema for configuration files.
    Schema,
}

#[derive(Debug, Args)]
pub struct CompletionsCommand {
    pub shell: clap_complete::Shell,
}

fn parse_date_arg(raw: &str) -> Result<String, String> {
    crate::timefmt::parse_date(raw)
        .map(|_| raw.to_string())
        .ok_or_else(|| format!("invalid date '{raw}': expected YYYY-MM-DD"))
}
