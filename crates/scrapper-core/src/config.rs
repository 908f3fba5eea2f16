//! `.env`-backed configuration, validated against the full required-key set
//! from the external interface table.
//!
//! The `.env` parsing (`parse_dotenv`/`get`, real environment wins over the
//! file) is lifted from `borg_core::config`. The "collect every missing key
//! before failing" validation is lifted from
//! `original_source/pkg/config/config.go::LoadConfig`, which appends to an
//! `errs` slice per key rather than bailing out on the first miss.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::storage::LinkServiceKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_api_token: String,
    pub telegram_bot_host: String,
    pub stackoverflow_api_key: String,
    pub github_api_key: String,
    pub bot_host: String,
    pub scrapper_host: String,
    pub database_url: String,
    pub link_service: LinkServiceKind,
    pub migrations_path: String,
    pub batch: i64,
    pub number_of_workers: usize,
}

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

const REQUIRED_KEYS: &[&str] = &[
    "TELEGRAM_BOT_API_TOKEN",
    "TELEGRAM_BOT_HOST",
    "STACKOVERFLOW_API_KEY",
    "GITHUB_API_KEY",
    "BOT_HOST",
    "SCRAPPER_HOST",
    "DATABASE_URL",
    "LINK_SERVICE",
    "MIGRATIONS_PATH",
    "BATCH",
    "NUMBER_OF_WORKERS",
];

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let dotenv = parse_dotenv();

        let mut missing = Vec::new();
        let mut values: HashMap<&str, String> = HashMap::new();
        for key in REQUIRED_KEYS {
            match get(key, &dotenv) {
                Some(v) if !v.is_empty() => {
                    values.insert(key, v);
                }
                _ => missing.push(*key),
            }
        }

        if !missing.is_empty() {
            return Err(ConfigError::MissingKey(missing.join(", ")));
        }

        let batch = values["BATCH"]
            .parse::<i64>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "BATCH".to_string(),
                reason: e.to_string(),
            })?;
        let number_of_workers =
            values["NUMBER_OF_WORKERS"]
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: "NUMBER_OF_WORKERS".to_string(),
                    reason: e.to_string(),
                })?;

        let link_service = values["LINK_SERVICE"]
            .parse::<LinkServiceKind>()
            .map_err(ConfigError::MissingKey)?;

        Ok(Config {
            telegram_bot_api_token: values.remove("TELEGRAM_BOT_API_TOKEN").unwrap(),
            telegram_bot_host: values.remove("TELEGRAM_BOT_HOST").unwrap(),
            stackoverflow_api_key: values.remove("STACKOVERFLOW_API_KEY").unwrap(),
            github_api_key: values.remove("GITHUB_API_KEY").unwrap(),
            bot_host: values.remove("BOT_HOST").unwrap(),
            scrapper_host: values.remove("SCRAPPER_HOST").unwrap(),
            database_url: values.remove("DATABASE_URL").unwrap(),
            link_service,
            migrations_path: values.remove("MIGRATIONS_PATH").unwrap(),
            batch,
            number_of_workers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_required_keys() {
        for key in REQUIRED_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn missing_keys_are_all_reported_together() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_required_keys();

        let err = Config::from_env().unwrap_err();
        let ConfigError::MissingKey(msg) = err else {
            panic!("expected MissingKey, got {err:?}");
        };
        assert!(msg.contains("TELEGRAM_BOT_API_TOKEN"));
        assert!(msg.contains("NUMBER_OF_WORKERS"));
    }

    #[test]
    fn invalid_batch_is_reported_as_invalid_value() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_required_keys();
        for key in REQUIRED_KEYS {
            std::env::set_var(key, "x");
        }
        std::env::set_var("LINK_SERVICE", "memory");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key, .. } if key == "BATCH"
        ));
        clear_required_keys();
    }
}
