use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::quiz::source::DEFAULT_TRIVIA_API_URL;
use crate::quiz::DEFAULT_QUESTION_COUNT;

/// Runtime settings, read from the environment (and `.env`) at start-up.
/// The bot token itself is picked up by `Bot::from_env` from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub trivia_api_url: String,
    pub question_count: usize,
    pub feedback_delay: Duration,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub dialogue_db: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trivia_api_url: DEFAULT_TRIVIA_API_URL.to_string(),
            question_count: DEFAULT_QUESTION_COUNT,
            feedback_delay: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(15),
            data_dir: PathBuf::from("quiz_data"),
            dialogue_db: "db.sqlite".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(url) = lookup("TRIVIA_API_URL") {
            config.trivia_api_url = url;
        }
        if let Some(count) = parse_var::<usize>(&lookup, "QUIZ_QUESTION_COUNT")? {
            if count == 0 {
                return Err(ConfigError::Invalid {
                    var: "QUIZ_QUESTION_COUNT",
                    value: count.to_string(),
                    reason: "a quiz needs at least one question".to_string(),
                });
            }
            config.question_count = count;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "QUIZ_FEEDBACK_DELAY_MS")? {
            config.feedback_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "QUIZ_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = lookup("QUIZ_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(db) = lookup("QUIZ_DIALOGUE_DB") {
            config.dialogue_db = db;
        }

        return Ok(config);
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    match value.trim().parse::<T>() {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.question_count, 10);
        assert_eq!(config.feedback_delay, Duration::from_millis(1500));
        assert_eq!(config.trivia_api_url, "https://the-trivia-api.com/v2/questions");
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            ("TRIVIA_API_URL", "http://localhost:8080/questions"),
            ("QUIZ_QUESTION_COUNT", "5"),
            ("QUIZ_FEEDBACK_DELAY_MS", " 250 "),
            ("QUIZ_REQUEST_TIMEOUT_SECS", "3"),
            ("QUIZ_DATA_DIR", "/var/lib/quiz"),
            ("QUIZ_DIALOGUE_DB", "dialogues.sqlite"),
        ])
        .unwrap();
        assert_eq!(config.trivia_api_url, "http://localhost:8080/questions");
        assert_eq!(config.question_count, 5);
        assert_eq!(config.feedback_delay, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/quiz"));
        assert_eq!(config.dialogue_db, "dialogues.sqlite");
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = config_from(&[("QUIZ_QUESTION_COUNT", "ten")]).unwrap_err();
        assert!(err.to_string().contains("QUIZ_QUESTION_COUNT"));
        assert!(config_from(&[("QUIZ_QUESTION_COUNT", "0")]).is_err());
        assert!(config_from(&[("QUIZ_FEEDBACK_DELAY_MS", "-5")]).is_err());
    }
}
