use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Object store backend: `s3` or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default = "default_auto_create_bucket")]
    pub auto_create_bucket: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            bucket: default_bucket(),
            region: default_region(),
            endpoint_url: None,
            auto_create_bucket: default_auto_create_bucket(),
        }
    }
}

fn default_backend() -> String {
    "s3".to_string()
}
fn default_bucket() -> String {
    "fulltext-indexes".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_auto_create_bucket() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EncryptionConfig {
    /// Symmetric key size in bits; 128 or 256.
    #[serde(default = "default_key_size")]
    pub key_size: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_size: default_key_size(),
        }
    }
}

fn default_key_size() -> u32 {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Maximum concurrent document-processing operations. Excess uploads
    /// are rejected, not queued.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
        }
    }
}

fn default_max_parallel() -> usize {
    80
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.store.backend.as_str() {
        "s3" | "memory" => {}
        other => anyhow::bail!("Unknown store backend: '{}'. Must be s3 or memory.", other),
    }

    match config.encryption.key_size {
        128 | 256 => {}
        other => anyhow::bail!("encryption.key_size must be 128 or 256, got {}", other),
    }

    if config.upload.max_parallel == 0 {
        anyhow::bail!("upload.max_parallel must be >= 1");
    }

    if config.server.bind.is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_config_gets_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.store.backend, "s3");
        assert_eq!(config.store.bucket, "fulltext-indexes");
        assert!(config.store.auto_create_bucket);
        assert_eq!(config.encryption.key_size, 256);
        assert_eq!(config.upload.max_parallel, 80);
    }

    #[test]
    fn partial_config_overrides_defaults() {
        let file = write_config(
            r#"
[store]
backend = "memory"
bucket = "records"

[upload]
max_parallel = 4
"#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.store.bucket, "records");
        assert_eq!(config.upload.max_parallel, 4);
        assert_eq!(config.encryption.key_size, 256);
    }

    #[test]
    fn invalid_key_size_rejected() {
        let file = write_config("[encryption]\nkey_size = 192\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("key_size"));
    }

    #[test]
    fn unknown_backend_rejected() {
        let file = write_config("[store]\nbackend = \"tape\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn zero_parallelism_rejected() {
        let file = write_config("[upload]\nmax_parallel = 0\n");
        assert!(load_config(file.path()).is_err());
    }
}
