use std::path::PathBuf;
use std::time::Duration;

use crate::config::{env_bool, env_u32, env_u64};

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub journal_mode: SqliteJournalMode,
    pub foreign_keys: bool,
}

impl DbConfig {
    pub fn from_env() -> Self {
        let path = std::env::var("PACER_DB_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let journal_mode = std::env::var("PACER_DB_JOURNAL_MODE")
            .ok()
            .as_deref()
            .and_then(SqliteJournalMode::parse)
            .unwrap_or(SqliteJournalMode::Wal);

        Self {
            path,
            max_connections: env_u32("PACER_DB_MAX_CONNECTIONS", 5).max(1),
            busy_timeout: Duration::from_millis(env_u64("PACER_DB_BUSY_TIMEOUT_MS", 30_000)),
            journal_mode,
            foreign_keys: env_bool("PACER_DB_FOREIGN_KEYS", true),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(30),
            journal_mode: SqliteJournalMode::Wal,
            foreign_keys: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteJournalMode {
    Wal,
    Delete,
}

impl SqliteJournalMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "WAL" => Some(Self::Wal),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pacer")
        .join("pacer.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_journal_mode_parse_is_case_insensitive() {
        assert_eq!(SqliteJournalMode::parse("wal"), Some(SqliteJournalMode::Wal));
        assert_eq!(SqliteJournalMode::parse("DELETE"), Some(SqliteJournalMode::Delete));
        assert_eq!(SqliteJournalMode::parse("truncate"), None);
    }

    #[test]
    fn test_default_path_ends_with_db_file() {
        assert!(default_db_path().ends_with("pacer/pacer.db"));
    }
}
