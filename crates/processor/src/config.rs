use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    pub sources: SourceConfig,
    pub connection: ConnectionConfig,
    pub pool: PoolConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// WebSocket URLs to ingest from,
    /// e.g. "ws://localhost:8080/ws/logs". One receiver per URL.
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    pub handshake_timeout_secs: u64,
    /// Keepalive ping cadence.
    pub ping_interval_secs: u64,
    /// Deadline for pings, pongs and the shutdown close frame.
    pub control_deadline_secs: u64,
    /// How long a frame may wait for a queue slot before it is dropped.
    pub submit_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl ProcessorConfig {
    /// Load configuration from processor.toml and environment variables
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        // Compile-time defaults are the foundation; missing keys in
        // files/env fall back to them
        let defaults = config::Config::try_from(&ProcessorConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        // Layer config files (overrides defaults), all optional:
        // 1. /etc/streamlog/processor.toml (production)
        // 2. config/processor.toml (local development)
        // 3. crates/processor/config/processor.toml (workspace root)
        let config_paths = vec![
            "/etc/streamlog/processor",
            "config/processor",
            "crates/processor/config/processor",
        ];

        for path in config_paths {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Environment variables override everything. Double underscore
        // separates nested keys: PROCESSOR_POOL__WORKERS=64
        builder = builder.add_source(
            config::Environment::with_prefix("PROCESSOR")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.sources.urls.is_empty() {
            anyhow::bail!("At least one source URL is required");
        }
        for url in &self.sources.urls {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                anyhow::bail!("Source URL must be ws:// or wss://: {}", url);
            }
        }

        if self.pool.workers == 0 {
            anyhow::bail!("pool.workers must be at least 1");
        }
        if self.pool.queue_capacity == 0 {
            anyhow::bail!("pool.queue_capacity must be at least 1");
        }

        self.server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .context("Invalid bind_address")?;

        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            sources: SourceConfig {
                urls: vec!["ws://localhost:8080/ws/logs".to_string()],
            },
            connection: ConnectionConfig::default(),
            pool: PoolConfig {
                workers: 50,
                queue_capacity: 1024,
            },
            server: ServerConfig {
                bind_address: "0.0.0.0:9090".to_string(),
            },
            logging: LoggingConfig {
                level: "info,processor=debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 5,
            ping_interval_secs: 30,
            control_deadline_secs: 1,
            submit_timeout_ms: 10,
        }
    }
}
