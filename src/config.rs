// ⚙️ Runtime configuration shared by the CLI and the server
//
// Every option can come from a flag or an environment variable.

use anyhow::Result;
use clap::{ArgAction, Args};
use rusqlite::Connection;
use std::path::PathBuf;

use crate::db::open_database;
use crate::filters::DueDateFilter;

pub const DEFAULT_DB_PATH: &str = "card_tracker.db";

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// SQLite database file
    #[arg(long = "db", env = "CARD_TRACKER_DB", default_value = DEFAULT_DB_PATH, global = true)]
    pub db_path: PathBuf,

    /// Turn due-date reminders on or off
    #[arg(
        long = "notifications",
        env = "CARD_TRACKER_NOTIFICATIONS",
        default_value_t = true,
        action = ArgAction::Set,
        global = true
    )]
    pub notifications: bool,

    /// Shorthand for --notifications false
    #[arg(long = "no-notifications", global = true)]
    pub no_notifications: bool,

    /// Default due-date window for payment listings
    /// (next-3-weeks, this-week, this-month, all)
    #[arg(long, default_value = "next-3-weeks", global = true)]
    pub window: DueDateFilter,
}

impl Config {
    pub fn notifications_enabled(&self) -> bool {
        self.notifications && !self.no_notifications
    }

    pub fn open_database(&self) -> Result<Connection> {
        open_database(&self.db_path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            notifications: true,
            no_notifications: false,
            window: DueDateFilter::default(),
        }
    }
}

/// env_logger with `info` unless RUST_LOG says otherwise
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn test_flags() {
        let cli = TestCli::try_parse_from([
            "card-tracker",
            "--db",
            "/tmp/other.db",
            "--no-notifications",
            "--window",
            "this-month",
        ])
        .unwrap();

        assert_eq!(cli.config.db_path, PathBuf::from("/tmp/other.db"));
        assert!(!cli.config.notifications_enabled());
        assert_eq!(cli.config.window, DueDateFilter::ThisMonth);
    }

    #[test]
    fn test_notifications_value() {
        let cli = TestCli::try_parse_from(["card-tracker", "--notifications", "false"]).unwrap();
        assert!(!cli.config.notifications_enabled());
        assert!(TestCli::try_parse_from(["card-tracker", "--window", "someday"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert!(config.notifications_enabled());
        assert_eq!(config.window, DueDateFilter::Next3Weeks);
    }
}
