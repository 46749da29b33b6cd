use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rireki::{query::Operator, vote::Direction};

#[derive(Debug, Parser)]
#[command(
    name = "rireki",
    about = "Search, rank and vote on an imported event history"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a CSV export, or every export waiting in the inbox
    Import(ImportArgs),
    /// Search events by keyword and date range
    Search(SearchArgs),
    /// Show the events of one topic within a month
    Stats(StatsArgs),
    /// Count events per topic for a month
    Topics(TopicsArgs),
    /// Manage the topic word lists
    Topic {
        #[command(subcommand)]
        action: TopicAction,
    },
    /// Vote an event up or down
    Vote(VoteArgs),
    /// Show a single event
    Show(ShowArgs),
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show system status and statistics
    Status(StatusArgs),
    /// Rebuild the search index from the stored events
    Reindex,
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Import --

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// CSV export to import (defaults to draining the inbox)
    pub path: Option<PathBuf>,

    /// Leave imported files in place instead of deleting them
    #[arg(long)]
    pub keep: bool,

    /// Output the import report as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Search --

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OperatorArg {
    And,
    Or,
}

impl From<OperatorArg> for Operator {
    fn from(arg: OperatorArg) -> Self {
        match arg {
            OperatorArg::And => Operator::And,
            OperatorArg::Or => Operator::Or,
        }
    }
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Keywords, split on ASCII and full-width spaces
    pub keywords: Vec<String>,

    /// How multiple keywords combine
    #[arg(short, long, value_enum, default_value = "and")]
    pub operator: OperatorArg,

    /// Earliest day to include (e.g. 2012/01/01)
    #[arg(long)]
    pub start: Option<String>,

    /// Last day to include, inclusive of the whole day
    #[arg(long)]
    pub end: Option<String>,

    /// Page number (1-based, clamped to the available pages)
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pub page: i64,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Monthly statistics --

#[derive(Debug, Parser)]
pub struct StatsArgs {
    /// Month as YYYY-MM
    #[arg(short, long)]
    pub month: String,

    /// Topic name
    #[arg(short, long)]
    pub topic: String,

    /// Page number (1-based)
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    pub page: i64,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct TopicsArgs {
    /// Month as YYYY-MM (defaults to the current month)
    #[arg(short, long)]
    pub month: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum TopicAction {
    /// Add or replace a topic; the first word names it
    Add {
        /// Words that count towards the topic
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Remove a topic
    Remove {
        /// Name of the topic to remove
        name: String,
    },
    /// List all topics
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

// -- Vote / Show --

#[derive(Debug, Parser)]
pub struct VoteArgs {
    /// Event id
    pub id: String,

    #[arg(value_enum)]
    pub direction: Direction,
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Event id
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show the effective settings
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting in config.redb
    Set {
        key: String,
        value: String,
    },
    /// Clear a stored setting (revert to default)
    Clear {
        key: String,
    },
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "rireki",
            &mut std::io::stdout(),
        );
    }
}
