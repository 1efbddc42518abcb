//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::criteria::Criteria;
use crate::error::{BackupError, Result};
use std::path::Path;

impl Config {
    /// Load and validate configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file without validating it, so that command line
    /// overrides can be applied first.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl SourceConfig {
    /// Build the ODBC connection string for the Exasol driver.
    pub fn connection_string(&self) -> String {
        if let Some(conn_str) = &self.connection_string {
            return conn_str.clone();
        }
        self.build_connection_string(&self.password)
    }

    /// Connection string with the password masked, for logging.
    pub fn redacted_connection_string(&self) -> String {
        if self.connection_string.is_some() {
            return "[custom connection string]".to_string();
        }
        self.build_connection_string("********")
    }

    /// Short `user@host:port` description of the target.
    pub fn display_target(&self) -> String {
        if self.connection_string.is_some() {
            return "custom connection string".to_string();
        }
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    fn build_connection_string(&self, password: &str) -> String {
        let mut conn_str = format!(
            "DRIVER={{{}}};EXAHOST={}:{};EXAUID={};EXAPWD={};ENCRYPTION={}",
            self.driver,
            self.host,
            self.port,
            self.user,
            password,
            if self.encryption { "Y" } else { "N" }
        );
        if let Some(fingerprint) = &self.fingerprint {
            conn_str.push_str(&format!(";FINGERPRINT={}", fingerprint));
        }
        conn_str
    }
}

impl BackupConfig {
    /// Compile the match/skip patterns.
    pub fn criteria(&self) -> Result<Criteria> {
        Criteria::new(&self.match_patterns, &self.skip_patterns)
    }
}
