use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockgenConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl MockgenConfig {
    /// Load configuration from mockgen.toml and environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&MockgenConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        for path in ["config/mockgen", "crates/mockgen/config/mockgen"] {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // MOCKGEN_SERVER__BIND_ADDRESS=0.0.0.0:9999 style overrides
        builder = builder.add_source(
            config::Environment::with_prefix("MOCKGEN")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn validate(&self) -> Result<()> {
        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .context("Invalid bind_address")?;
        Ok(())
    }
}

impl Default for MockgenConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "0.0.0.0:8080".to_string(),
            },
            logging: LoggingConfig {
                level: "info,mockgen=debug".to_string(),
            },
        }
    }
}
