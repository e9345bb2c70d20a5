use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use threadline::{
    BlobConfig, MemoryConfig, OpenAIConfig, SessionConfig, StoreConfig, StreamConfig, TokenBudgets,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub blob: BlobConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub tokens: TokenBudgets,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default = "default_openai")]
    pub openai: OpenAIConfig,
}

fn default_openai() -> OpenAIConfig {
    OpenAIConfig::new(String::new())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole request, streams included
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. THREADLINE_ environment variables, `__` between nested keys
    ///    (e.g. `THREADLINE_SERVER__PORT=8080`)
    ///
    /// Secrets are only ever read from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("THREADLINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        cfg.openai.api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            ConfigError::Message("OPENAI_API_KEY environment variable is required".to_string())
        })?;

        if let StoreConfig::Mongodb { uri, .. } = &mut cfg.store {
            *uri = std::env::var("MONGODB_URI").map_err(|_| {
                ConfigError::Message(
                    "MONGODB_URI environment variable is required for the mongodb backend"
                        .to_string(),
                )
            })?;
        }

        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Model used when a request names none
    pub fn default_model(&self) -> &str {
        &self.tokens.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SAMPLE: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 3000

        [cors]
        enabled = true
        origins = ["http://localhost:3000"]

        [logging]
        level = "debug"
        format = "json"

        [store]
        backend = "sqlite"
        path = "/tmp/threads.db"

        [blob]
        backend = "s3"
        bucket = "memories"
        endpoint_url = "http://localhost:9000"

        [memory]
        word_limit = 80

        [tokens]
        default_model = "gpt-4o"

        [tokens.models]
        "local-llama" = 4096

        [stream]
        chunk_size = 40
    "#;

    #[test]
    fn test_config_structure() {
        let config = Config::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.request_timeout_secs, 300);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.memory.word_limit, 80);
        assert_eq!(config.stream.chunk_size, 40);
        assert_eq!(config.stream.channel_capacity, 64);
        assert_eq!(config.session.history_limit, 10);
        assert_eq!(config.default_model(), "gpt-4o");
        assert_eq!(config.tokens.max_context_tokens("local-llama"), 4096);
        assert!(config.openai.streaming);
        assert!(config.openai.api_key.is_empty());

        match config.store {
            StoreConfig::Sqlite { path, .. } => assert_eq!(path, PathBuf::from("/tmp/threads.db")),
            other => panic!("unexpected store config: {:?}", other),
        }
        match config.blob {
            BlobConfig::S3 { bucket, region, .. } => {
                assert_eq!(bucket, "memories");
                assert_eq!(region, "us-east-1");
            }
            other => panic!("unexpected blob config: {:?}", other),
        }
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threadline.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.cors.enabled);
    }

    #[test]
    fn test_missing_sections_fail() {
        assert!(Config::from_toml_str("[server]\nhost = \"x\"\nport = 1").is_err());
    }
}
