use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Inspect and maintain the local debrid cache",
    long_about = "Inspect and maintain the local debrid cache.\n\
                  \n\
                  The cache records, per identifier and debrid provider, whether the\n\
                  provider already hosts the content and until when that verdict is valid."
)]
pub struct CliArgs {
    /// Configuration file to use instead of the default location
    #[arg(short, long, global = true, env = "CACHECHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the cache database path from the configuration
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true, help = "Enable detailed debug logging")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or modify the cache database
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Row counts per provider
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Live entries for the given identifiers
    Show {
        #[arg(required = true)]
        identifiers: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Delete expired rows
    Purge,
    /// Delete every row and compact the database file
    Clear,
    /// Delete all rows for the given identifiers
    Forget {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Overwrite the configuration file with defaults
    Reset,
    /// Print the configuration file location
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cache_show() {
        let args = CliArgs::try_parse_from([
            "cachecheck",
            "cache",
            "show",
            "abc",
            "def",
            "--json",
            "--database",
            "/tmp/x.db",
        ])
        .unwrap();
        assert_eq!(args.database, Some(PathBuf::from("/tmp/x.db")));
        match args.command {
            Command::Cache {
                action: CacheAction::Show { identifiers, json },
            } => {
                assert_eq!(identifiers, vec!["abc", "def"]);
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_forget_requires_identifiers() {
        assert!(CliArgs::try_parse_from(["cachecheck", "cache", "forget"]).is_err());
    }
}
