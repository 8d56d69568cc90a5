use crate::db::config::DbConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub database: DbConfig,
    pub review: ReviewConfig,
}

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub due_cards_limit: i64,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { due_cards_limit: 50 }
    }
}

impl ReviewConfig {
    fn from_env() -> Self {
        let due_cards_limit = std::env::var("PACER_DUE_CARDS_LIMIT")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(Self::default().due_cards_limit);

        Self { due_cards_limit }
    }
}

impl Config {
    /// Reads `.env` when present, then the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            log_level,
            database: DbConfig::from_env(),
            review: ReviewConfig::from_env(),
        }
    }
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .as_deref()
        .and_then(parse_bool_flag)
        .unwrap_or(default)
}

pub(crate) fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(default)
}

pub(crate) fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_flag() {
        assert_eq!(parse_bool_flag("1"), Some(true));
        assert_eq!(parse_bool_flag("false"), Some(false));
        assert_eq!(parse_bool_flag("yes"), None);
    }

    #[test]
    fn test_unset_keys_fall_back_to_defaults() {
        assert_eq!(env_u64("PACER_TEST_UNSET_U64", 7), 7);
        assert!(env_bool("PACER_TEST_UNSET_BOOL", true));
        assert_eq!(ReviewConfig::default().due_cards_limit, 50);
    }
}
