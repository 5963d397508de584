use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "notesync")]
#[command(about = "Keep notes locally and sync them with a Tomboy-compatible server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Profile holding the server configuration and access token
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: String,
        /// Note body (read from stdin or $EDITOR when omitted)
        body: Vec<String>,
    },
    /// List recently changed notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a note
    Show {
        /// Note ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an existing note ($EDITOR when neither --title nor --body is given)
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete an existing note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Synchronize with the profile's server
    Sync {
        #[command(subcommand)]
        command: Option<SyncCommands>,
        /// Resolve the conflict on this note by keeping the local copy
        #[arg(long, value_name = "ID")]
        keep_local: Vec<String>,
        /// Resolve the conflict on this note by taking the server copy
        #[arg(long, value_name = "ID")]
        keep_remote: Vec<String>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authorize a profile against its server
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// List conflicts waiting for a decision
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Profile name to initialize
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Sync server URL
        #[arg(long, value_name = "URL")]
        server_url: Option<String>,
        /// Loopback port for the OAuth redirect
        #[arg(long, value_name = "PORT")]
        callback_port: Option<u16>,
        /// OAuth consumer key
        #[arg(long, value_name = "KEY")]
        consumer_key: Option<String>,
        /// OAuth consumer secret
        #[arg(long, value_name = "SECRET")]
        consumer_secret: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print profile config
    Show {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Authorize in the browser and store the access token in the keychain
    Login {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
        /// Seconds to wait for the browser redirect
        #[arg(long, value_name = "N", default_value = "300")]
        timeout_secs: u64,
    },
    /// Show auth status for profile
    Status {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
    /// Forget the stored access token
    Logout {
        /// Optional profile override
        #[arg(long, value_name = "NAME")]
        profile: Option<String>,
    },
}
