//! Server configuration

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;
use wordguard_lexicon::LexiconConfig;
use wordguard_similarity::SimilarityConfig;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "wordguard-server")]
#[command(about = "WordGuard forbidden-word and sensitive-phrase filtering service", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "WORDGUARD_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// SQLite database URL
    #[arg(short, long, env = "WORDGUARD_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Listen address
    #[arg(short = 'l', long, env = "WORDGUARD_LISTEN")]
    pub listen: Option<String>,

    /// Listen port
    #[arg(short = 'P', long, env = "WORDGUARD_PORT")]
    pub port: Option<u16>,

    /// Default similarity threshold
    #[arg(short, long, env = "WORDGUARD_THRESHOLD")]
    pub threshold: Option<f32>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// SQLite database URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum pooled database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Forbidden-word matcher settings
    #[serde(default)]
    pub lexicon: LexiconConfig,

    /// Sensitive-phrase similarity settings
    #[serde(default)]
    pub similarity: SimilarityConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(url) = &cli.database_url {
            config.database_url = url.clone();
        }

        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(threshold) = cli.threshold {
            config.similarity.default_threshold = threshold;
        }

        config.similarity.validate()?;
        Ok(config)
    }

    /// `listen:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            listen: default_listen(),
            port: default_port(),
            lexicon: LexiconConfig::default(),
            similarity: SimilarityConfig::default(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://wordguard.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordguard_similarity::EmbedderSpec;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load("/nonexistent/wordguard.yaml", &Cli::default()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url, "sqlite://wordguard.db?mode=rwc");
        assert_eq!(config.similarity.default_threshold, 0.8);
    }

    #[test]
    fn test_yaml_sections() {
        let yaml = r#"
database_url: "sqlite::memory:"
port: 9000
lexicon:
  min_decomposed_len: 4
similarity:
  embedder:
    type: hashing
    dimension: 64
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.listen, "0.0.0.0");
        assert_eq!(config.lexicon.min_decomposed_len, 4);
        assert_eq!(
            config.similarity.embedder,
            EmbedderSpec::Hashing { dimension: 64 }
        );
    }

    #[test]
    fn test_cli_overrides_win() {
        let cli = Cli {
            port: Some(3000),
            listen: Some("127.0.0.1".to_string()),
            threshold: Some(0.6),
            ..Cli::default()
        };
        let config = ServerConfig::load("/nonexistent/wordguard.yaml", &cli).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.similarity.default_threshold, 0.6);
    }

    #[test]
    fn test_invalid_threshold_override_rejected() {
        let cli = Cli {
            threshold: Some(3.0),
            ..Cli::default()
        };
        assert!(ServerConfig::load("/nonexistent/wordguard.yaml", &cli).is_err());
    }
}
