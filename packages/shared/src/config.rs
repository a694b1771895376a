use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_AI_ENDPOINT: &str = "https://models.inference.ai.azure.com";
pub const DEFAULT_AI_MODELS: [&str; 6] = [
    "AI21-Jamba-1.5-Mini",
    "Phi-4",
    "Codestral-2501",
    "jais-30b-chat",
    "Cohere-command-r-08-2024",
    "gpt-4o-mini",
];
const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_AI_TIMEOUT_SECS: u64 = 20;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    DynamoDb(TableNames),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub players: String,
    pub games: String,
    pub match_requests: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub endpoint: String,
    /// Without a token no suggestion source is configured and every AI move is random.
    pub token: Option<String>,
    pub models: Vec<String>,
    /// How long a suggestion may take before the random fallback is used.
    pub suggestion_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storage: StorageBackend,
    pub response_timeout: Duration,
    pub ai: AiConfig,
    pub bind_address: SocketAddr,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} environment variable must be set", key),
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let storage = match get("STORAGE_BACKEND").as_deref().map(str::to_ascii_lowercase) {
            None => StorageBackend::Memory,
            Some(backend) if backend == "memory" => StorageBackend::Memory,
            Some(backend) if backend == "dynamodb" => StorageBackend::DynamoDb(TableNames {
                players: require("PLAYERS_TABLE")?,
                games: require("GAMES_TABLE")?,
                match_requests: require("MATCH_REQUESTS_TABLE")?,
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other,
                })
            }
        };

        let seconds = |key: &'static str, default: u64| match get(key) {
            None => Ok(Duration::from_secs(default)),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => Err(ConfigError::Invalid { key, value: raw }),
            },
        };
        let response_timeout = seconds("RESPONSE_TIMEOUT_SECS", DEFAULT_RESPONSE_TIMEOUT_SECS)?;

        let models = match get("AI_MODELS") {
            None => DEFAULT_AI_MODELS.iter().map(|m| m.to_string()).collect(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
        };

        let ai = AiConfig {
            endpoint: get("AI_ENDPOINT").unwrap_or_else(|| DEFAULT_AI_ENDPOINT.to_string()),
            token: get("GITHUB_TOKEN"),
            models,
            suggestion_timeout: seconds("AI_TIMEOUT_SECS", DEFAULT_AI_TIMEOUT_SECS)?,
        };

        let raw_address = get("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = raw_address.parse().map_err(|_| ConfigError::Invalid {
            key: "BIND_ADDRESS",
            value: raw_address.clone(),
        })?;

        Ok(Config {
            storage,
            response_timeout,
            ai,
            bind_address,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.response_timeout, Duration::from_secs(60));
        assert_eq!(config.ai.endpoint, DEFAULT_AI_ENDPOINT);
        assert_eq!(config.ai.token, None);
        assert_eq!(config.ai.models.len(), 6);
        assert_eq!(config.ai.suggestion_timeout, Duration::from_secs(20));
        assert_eq!(config.bind_address.port(), 3000);
    }

    #[test]
    fn test_dynamodb_requires_tables() {
        let result = config_from(&[("STORAGE_BACKEND", "dynamodb"), ("PLAYERS_TABLE", "players")]);
        assert_eq!(result.unwrap_err(), ConfigError::Missing("GAMES_TABLE"));

        let config = config_from(&[
            ("STORAGE_BACKEND", "DynamoDB"),
            ("PLAYERS_TABLE", "players"),
            ("GAMES_TABLE", "games"),
            ("MATCH_REQUESTS_TABLE", "requests"),
        ])
        .unwrap();
        assert_eq!(
            config.storage,
            StorageBackend::DynamoDb(TableNames {
                players: "players".to_string(),
                games: "games".to_string(),
                match_requests: "requests".to_string(),
            })
        );
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("STORAGE_BACKEND", "postgres")]),
            Err(ConfigError::Invalid { key: "STORAGE_BACKEND", .. })
        ));
        assert!(matches!(
            config_from(&[("RESPONSE_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { key: "RESPONSE_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("AI_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { key: "AI_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config_from(&[("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::Invalid { key: "BIND_ADDRESS", .. })
        ));
    }

    #[test]
    fn test_model_catalogue_and_token() {
        let config = config_from(&[("AI_MODELS", "Phi-4, gpt-4o-mini,,"), ("GITHUB_TOKEN", "t")])
            .unwrap();

        assert_eq!(config.ai.models, vec!["Phi-4".to_string(), "gpt-4o-mini".to_string()]);
        assert_eq!(config.ai.token.as_deref(), Some("t"));
    }
}
