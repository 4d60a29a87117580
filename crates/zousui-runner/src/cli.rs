//! Command-line surface: one subcommand per inbound trigger.

use clap::{Args, Parser, Subcommand};

/// Community culture simulation driven by generation backends.
#[derive(Debug, Parser)]
#[command(name = "zousui")]
#[command(version)]
pub struct Cli {
    /// Start from an empty store even if `ZOUSUI_SEED_DEMO` is set
    #[arg(long, global = true)]
    pub no_seed: bool,

    /// Per-request deadline in milliseconds (overrides `ZOUSUI_REQUEST_TIMEOUT_MS`)
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Community management
    #[command(subcommand)]
    Communities(CommunityCommand),

    /// List the agents of a community
    Agents {
        /// Community identifier
        community_id: String,
    },

    /// Evolve a community's culture
    Evolve {
        /// Community identifier
        community_id: String,

        /// Number of consecutive evolution steps
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },

    /// Apply interference from multiple intelligences to one community
    Interfere {
        /// Community identifier
        community_id: String,

        /// Description of the intervention
        #[arg(long)]
        input: Option<String>,
    },

    /// Apply interference to two communities at once
    InterferePair {
        /// First community
        community_a: String,

        /// Second community
        community_b: String,

        /// Description of the intervention
        #[arg(long, default_value = "")]
        input: String,
    },

    /// Let two communities meet for diplomacy
    Diplomacy {
        /// First community
        community_a: String,

        /// Second community
        community_b: String,
    },

    /// Merge two communities into a new one (the sources are deleted)
    Merge(MergeArgs),

    /// Show the simulation audit log
    History,

    /// Read commands from stdin, one per line, against a shared store
    Session,
}

/// Community subcommands.
#[derive(Debug, Subcommand)]
pub enum CommunityCommand {
    /// List every community
    List,

    /// Show one community
    Show {
        /// Community identifier
        id: String,
    },

    /// Create a community
    Create(CreateArgs),

    /// Delete a community
    Delete {
        /// Community identifier
        id: String,
    },
}

/// Arguments for `communities create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Unique identifier
    #[arg(long)]
    pub id: String,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Starting population
    #[arg(long, default_value_t = 0)]
    pub population: u64,

    /// Starting culture
    #[arg(long, default_value = "")]
    pub culture: String,

    /// Free-text description
    #[arg(long, default_value = "")]
    pub description: String,
}

/// Arguments for `merge`.
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// First source community
    pub community_a: String,

    /// Second source community
    pub community_b: String,

    /// Identifier of the merged community
    #[arg(long)]
    pub new_id: String,

    /// Name of the merged community
    #[arg(long)]
    pub name: String,
}

/// Split a session line into words, honoring double quotes.
pub fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}
