use anyhow::{Context, Result};
use config_rs::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ClickHouse schema configuration
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,

    /// Full-text search configuration
    #[serde(default)]
    pub fulltext: FullTextConfig,
}

/// Names of the ClickHouse databases and tables queries are compiled against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// Database holding trace tables (e.g., "signoz_traces")
    #[serde(default = "default_traces_database")]
    pub traces_database: String,

    /// Table of (service, span name) pairs observed at trace entry points
    #[serde(default = "default_top_level_operations_table")]
    pub top_level_operations_table: String,
}

/// Configuration for full-text search terms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextConfig {
    /// Column that bare search terms are matched against (default: "body")
    #[serde(default = "default_fulltext_column")]
    pub column: String,
}

// Default value functions
fn default_traces_database() -> String {
    "signoz_traces".to_string()
}

fn default_top_level_operations_table() -> String {
    "distributed_top_level_operations".to_string()
}

fn default_fulltext_column() -> String {
    "body".to_string()
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            traces_database: default_traces_database(),
            top_level_operations_table: default_top_level_operations_table(),
        }
    }
}

impl Default for FullTextConfig {
    fn default() -> Self {
        Self {
            column: default_fulltext_column(),
        }
    }
}

impl Config {
    /// Load Config with layered configuration priority:
    /// 1. Default values
    /// 2. TOML file (if provided)
    /// 3. Environment variables (CLICKHOUSE_* prefix for ClickHouse config,
    ///    FULLTEXT_* for full-text config)
    ///
    /// This uses the config-rs crate for robust configuration management.
    pub fn load(config_file: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            // ClickHouse defaults
            .set_default("clickhouse.traces_database", "signoz_traces")?
            .set_default(
                "clickhouse.top_level_operations_table",
                "distributed_top_level_operations",
            )?
            // Full-text defaults
            .set_default("fulltext.column", "body")?;

        // Add TOML file if provided
        if let Some(file_path) = config_file {
            let path = Path::new(file_path);
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with CLICKHOUSE_ prefix for ClickHouse config
        builder = builder.add_source(
            Environment::with_prefix("CLICKHOUSE")
                .separator("_")
                .try_parsing(true),
        );

        // Add environment variables with FULLTEXT_ prefix for full-text config
        builder = builder.add_source(
            Environment::with_prefix("FULLTEXT")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let app_config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Load Config from a TOML file
    ///
    /// Environment variables can still override values from the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load(path.as_ref().to_str())
    }

    /// Create a new Config from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.clickhouse.validate()?;
        self.fulltext.validate()?;
        Ok(())
    }
}

impl ClickHouseConfig {
    /// Fully qualified name of the top-level operations table
    pub fn top_level_operations(&self) -> String {
        format!(
            "{}.{}",
            self.traces_database, self.top_level_operations_table
        )
    }

    /// Validate the ClickHouse configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.traces_database.is_empty(),
            "ClickHouse traces database cannot be empty"
        );
        anyhow::ensure!(
            !self.top_level_operations_table.is_empty(),
            "ClickHouse top-level operations table cannot be empty"
        );
        Ok(())
    }
}

impl FullTextConfig {
    /// Validate the full-text configuration
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.column.is_empty(),
            "full-text column cannot be empty"
        );
        Ok(())
    }
}
