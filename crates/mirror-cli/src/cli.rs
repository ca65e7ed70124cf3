//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use mirror_core::{NumberOrString, PartialConfig};

/// treemirror - Keep a local mirror of a remote tree in sync
#[derive(Parser, Debug)]
#[command(name = "treemirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true, env = "TREEMIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Settings that override every configuration file
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Remote tree to mirror
    #[arg(long, global = true, env = "TREEMIRROR_SOURCE")]
    pub source: Option<String>,

    /// Local mirror directory
    #[arg(long, global = true, env = "TREEMIRROR_DESTINATION")]
    pub destination: Option<PathBuf>,

    /// Sync root, relative to both trees
    #[arg(long, global = true, env = "TREEMIRROR_ROOT_DIR")]
    pub root_dir: Option<String>,

    /// Ledger file
    #[arg(long, global = true, env = "TREEMIRROR_LEDGER")]
    pub ledger: Option<PathBuf>,

    /// Readiness manifest consulted before each download
    #[arg(long, global = true, env = "TREEMIRROR_PRECHECK")]
    pub precheck: Option<PathBuf>,

    /// Mode for created directories, in octal
    #[arg(long, global = true, env = "TREEMIRROR_DIR_MODE")]
    pub dir_mode: Option<String>,

    /// Mode for written files, in octal
    #[arg(long, global = true, env = "TREEMIRROR_FILE_MODE")]
    pub file_mode: Option<String>,

    #[arg(long, global = true, env = "TREEMIRROR_DIR_USER_ID")]
    pub dir_user_id: Option<u32>,

    #[arg(long, global = true, env = "TREEMIRROR_DIR_GROUP_ID")]
    pub dir_group_id: Option<u32>,

    #[arg(long, global = true, env = "TREEMIRROR_FILE_USER_ID")]
    pub file_user_id: Option<u32>,

    #[arg(long, global = true, env = "TREEMIRROR_FILE_GROUP_ID")]
    pub file_group_id: Option<u32>,

    /// Maximum number of directories queued during a remote walk
    #[arg(long, global = true, env = "TREEMIRROR_WALK_CAPACITY")]
    pub walk_capacity: Option<usize>,

    /// How long to wait for the ledger lock, in milliseconds
    #[arg(long, global = true, env = "TREEMIRROR_LOCK_TIMEOUT_MS")]
    pub lock_timeout_ms: Option<u64>,

    /// Skip fsync after writes
    #[arg(long, global = true)]
    pub no_fsync: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, env = "TREEMIRROR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (text or json)
    #[arg(long, global = true, env = "TREEMIRROR_LOG_FORMAT")]
    pub log_format: Option<String>,
}

impl Overrides {
    /// The configuration layer these flags describe
    pub fn to_partial(&self) -> PartialConfig {
        PartialConfig {
            source: self.source.clone(),
            destination: self.destination.clone(),
            root_dir: self.root_dir.clone(),
            ledger: self.ledger.clone(),
            precheck: self.precheck.clone(),
            dir_mode: self.dir_mode.as_deref().map(NumberOrString::from),
            file_mode: self.file_mode.as_deref().map(NumberOrString::from),
            dir_user_id: self.dir_user_id,
            dir_group_id: self.dir_group_id,
            file_user_id: self.file_user_id,
            file_group_id: self.file_group_id,
            walk_capacity: self.walk_capacity,
            lock_timeout_ms: self.lock_timeout_ms,
            fsync: self.no_fsync.then_some(false),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            ..PartialConfig::default()
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Reconcile the local mirror with the remote tree
    ///
    /// Examples:
    ///   treemirror sync --source /mnt/remote --destination /srv/mirror
    ///   treemirror sync --dry-run --json
    ///   treemirror sync --repeat 5m     # Run until interrupted
    Sync {
        /// Classify paths without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the pass report as JSON
        #[arg(long)]
        json: bool,

        /// Run a pass every interval (e.g. 300, 90s, 5m, 1h) until interrupted
        #[arg(long, env = "TREEMIRROR_REPEAT")]
        repeat: Option<String>,
    },

    /// Inspect or edit the ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// Show the resolved configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Ledger subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    /// List recorded paths
    List {
        /// Only list paths under this root
        #[arg(long)]
        root: Option<String>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Drop a path from the ledger so the next pass treats it as new
    Forget {
        /// Recorded path, relative to the sync root
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_no_args() {
        let cli = Cli::parse_from(["treemirror"]);
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn parse_sync_defaults() {
        let cli = Cli::parse_from(["treemirror", "sync"]);
        assert_eq!(
            cli.command,
            Some(Commands::Sync {
                dry_run: false,
                json: false,
                repeat: None,
            })
        );
    }

    #[test]
    fn parse_sync_flags() {
        let cli = Cli::parse_from(["treemirror", "sync", "--dry-run", "--json", "--repeat", "5m"]);
        assert_eq!(
            cli.command,
            Some(Commands::Sync {
                dry_run: true,
                json: true,
                repeat: Some("5m".to_string()),
            })
        );
    }

    #[test]
    fn global_overrides_follow_the_subcommand() {
        let cli = Cli::parse_from([
            "treemirror",
            "sync",
            "--source",
            "/remote",
            "--destination",
            "/mirror",
            "--file-mode",
            "0640",
            "--no-fsync",
        ]);
        let partial = cli.overrides.to_partial();

        assert_eq!(partial.source.as_deref(), Some("/remote"));
        assert_eq!(partial.destination, Some(PathBuf::from("/mirror")));
        assert_eq!(partial.file_mode, Some(NumberOrString::from("0640")));
        assert_eq!(partial.fsync, Some(false));
    }

    #[test]
    fn absent_flags_leave_layer_empty() {
        let cli = Cli::parse_from(["treemirror", "config"]);
        let partial = cli.overrides.to_partial();

        assert_eq!(partial.fsync, None);
        assert_eq!(partial.source, None);
    }

    #[test]
    fn parse_ledger_forget() {
        let cli = Cli::parse_from(["treemirror", "ledger", "forget", "shows/e01.mkv"]);
        assert_eq!(
            cli.command,
            Some(Commands::Ledger {
                action: LedgerAction::Forget {
                    path: "shows/e01.mkv".to_string()
                }
            })
        );
    }

    #[test]
    fn parse_ledger_list_root() {
        let cli = Cli::parse_from(["treemirror", "ledger", "list", "--root", "/shows"]);
        assert_eq!(
            cli.command,
            Some(Commands::Ledger {
                action: LedgerAction::List {
                    root: Some("/shows".to_string()),
                    json: false,
                }
            })
        );
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["treemirror", "completions", "bash"]);
        assert!(matches!(cli.command, Some(Commands::Completions { shell: Shell::Bash })));
    }
}
