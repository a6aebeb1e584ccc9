//! Configuration module
//!
//! Configuration is read from the environment (optionally seeded from a `.env`
//! file). Every value has a default except the access-grant signing secret.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const MAX_DOCUMENT_SIZE_MB: usize = 50;
const ACCESS_GRANT_TTL_SECS: i64 = 3600;
const REPUTATION_TIMEOUT_SECS: u64 = 30;
const CLAMAV_PORT: u16 = 3310;
const REDACTION_DPI: u32 = 150;
const MIN_REDACTION_DPI: u32 = 72;
const MAX_REDACTION_DPI: u32 = 600;
const PATTERN_REGEX_SIZE_LIMIT: usize = 1 << 20;
const MAX_CUSTOM_RULES: usize = 200;
const MIN_GRANT_SECRET_LEN: usize = 32;

/// Which external reputation service the gate consults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReputationProvider {
    /// ClamAV daemon reachable over TCP
    ClamAv { host: String, port: u16 },
    /// Hash-lookup HTTP API
    Http { base_url: String, api_key: String },
    /// Administratively disabled: documents pass without a verdict.
    Disabled,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_document_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ReputationConfig {
    pub provider: ReputationProvider,
    pub timeout_secs: u64,
    /// JavaScript / launch actions make a document unsafe
    pub block_active_content: bool,
    /// Embedded files make a document unsafe (otherwise only a warning)
    pub block_embedded_files: bool,
    /// Encrypted documents may be stored as safe; they are never processable
    pub allow_encrypted: bool,
}

#[derive(Clone, Debug)]
pub struct RedactionConfig {
    /// Rasterization resolution for permanently redacted pages
    pub dpi: u32,
    pub pdftoppm_path: String,
}

#[derive(Clone, Debug)]
pub struct PatternConfig {
    pub regex_size_limit: usize,
    pub max_custom_rules: usize,
}

#[derive(Clone, Debug)]
pub struct AccessConfig {
    pub grant_secret: String,
    pub grant_ttl_secs: i64,
}

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub reputation: ReputationConfig,
    pub redaction: RedactionConfig,
    pub patterns: PatternConfig,
    pub access: AccessConfig,
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

impl ReputationConfig {
    /// Reputation settings alone, for tools that never touch storage or grants.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let provider = match env::var("REPUTATION_PROVIDER")
            .unwrap_or_else(|_| "clamav".to_string())
            .to_lowercase()
            .as_str()
        {
            "clamav" => ReputationProvider::ClamAv {
                host: env::var("CLAMAV_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("CLAMAV_PORT")
                    .unwrap_or_else(|_| CLAMAV_PORT.to_string())
                    .parse()
                    .map_err(|_| anyhow::anyhow!("CLAMAV_PORT must be a valid port"))?,
            },
            "http" => ReputationProvider::Http {
                base_url: env::var("REPUTATION_API_URL").map_err(|_| {
                    anyhow::anyhow!("REPUTATION_API_URL must be set when REPUTATION_PROVIDER=http")
                })?,
                api_key: env::var("REPUTATION_API_KEY").map_err(|_| {
                    anyhow::anyhow!("REPUTATION_API_KEY must be set when REPUTATION_PROVIDER=http")
                })?,
            },
            "disabled" => ReputationProvider::Disabled,
            other => {
                return Err(anyhow::anyhow!(
                    "Invalid REPUTATION_PROVIDER '{}': expected clamav, http or disabled",
                    other
                ))
            }
        };

        Ok(ReputationConfig {
            provider,
            timeout_secs: env::var("REPUTATION_TIMEOUT_SECS")
                .unwrap_or_else(|_| REPUTATION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(REPUTATION_TIMEOUT_SECS),
            block_active_content: env_bool("BLOCK_ACTIVE_CONTENT", true),
            block_embedded_files: env_bool("BLOCK_EMBEDDED_FILES", false),
            allow_encrypted: env_bool("ALLOW_ENCRYPTED_DOCUMENTS", false),
        })
    }
}

impl RedactionConfig {
    pub fn from_env() -> Self {
        RedactionConfig {
            dpi: env::var("REDACTION_DPI")
                .unwrap_or_else(|_| REDACTION_DPI.to_string())
                .parse()
                .unwrap_or(REDACTION_DPI),
            pdftoppm_path: env::var("PDFTOPPM_PATH").unwrap_or_else(|_| "pdftoppm".to_string()),
        }
    }
}

impl PatternConfig {
    pub fn from_env() -> Self {
        PatternConfig {
            regex_size_limit: env::var("PATTERN_REGEX_SIZE_LIMIT")
                .unwrap_or_else(|_| PATTERN_REGEX_SIZE_LIMIT.to_string())
                .parse()
                .unwrap_or(PATTERN_REGEX_SIZE_LIMIT),
            max_custom_rules: env::var("MAX_CUSTOM_RULES")
                .unwrap_or_else(|_| MAX_CUSTOM_RULES.to_string())
                .parse()
                .unwrap_or(MAX_CUSTOM_RULES),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .parse::<StorageBackend>()?;

        let max_document_size_mb = env::var("MAX_DOCUMENT_SIZE_MB")
            .unwrap_or_else(|_| MAX_DOCUMENT_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_DOCUMENT_SIZE_MB);

        let config = Config {
            environment,
            database_url: env::var("DATABASE_URL").ok(),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            storage: StorageConfig {
                backend,
                local_path: env::var("LOCAL_STORAGE_PATH").ok(),
                s3_bucket: env::var("S3_BUCKET").ok(),
                s3_region: env::var("S3_REGION")
                    .or_else(|_| env::var("AWS_REGION"))
                    .ok(),
                s3_endpoint: env::var("S3_ENDPOINT").ok(),
            },
            upload: UploadConfig {
                max_document_size_bytes: max_document_size_mb * 1024 * 1024,
                allowed_extensions: env_list("DOCUMENT_ALLOWED_EXTENSIONS", "pdf,png,jpg,jpeg"),
                allowed_content_types: env_list(
                    "DOCUMENT_ALLOWED_CONTENT_TYPES",
                    "application/pdf,image/png,image/jpeg",
                ),
            },
            reputation: ReputationConfig::from_env()?,
            redaction: RedactionConfig::from_env(),
            patterns: PatternConfig::from_env(),
            access: AccessConfig {
                grant_secret: env::var("ACCESS_GRANT_SECRET").map_err(|_| {
                    anyhow::anyhow!("ACCESS_GRANT_SECRET must be set for access grants")
                })?,
                grant_ttl_secs: env::var("ACCESS_GRANT_TTL_SECS")
                    .unwrap_or_else(|_| ACCESS_GRANT_TTL_SECS.to_string())
                    .parse()
                    .unwrap_or(ACCESS_GRANT_TTL_SECS),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the pipeline is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.access.grant_secret.len() < MIN_GRANT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "ACCESS_GRANT_SECRET must be at least {} bytes",
                MIN_GRANT_SECRET_LEN
            ));
        }
        if self.access.grant_ttl_secs <= 0 {
            return Err(anyhow::anyhow!("ACCESS_GRANT_TTL_SECS must be positive"));
        }
        if !(MIN_REDACTION_DPI..=MAX_REDACTION_DPI).contains(&self.redaction.dpi) {
            return Err(anyhow::anyhow!(
                "REDACTION_DPI must be between {} and {}",
                MIN_REDACTION_DPI,
                MAX_REDACTION_DPI
            ));
        }
        if self.reputation.timeout_secs == 0 {
            return Err(anyhow::anyhow!("REPUTATION_TIMEOUT_SECS must be positive"));
        }
        match self.storage.backend {
            StorageBackend::Local if self.storage.local_path.is_none() => {
                return Err(anyhow::anyhow!(
                    "LOCAL_STORAGE_PATH must be set for the local storage backend"
                ));
            }
            StorageBackend::S3 if self.storage.s3_bucket.is_none() => {
                return Err(anyhow::anyhow!("S3_BUCKET must be set for the s3 storage backend"));
            }
            StorageBackend::Memory if self.is_production() => {
                return Err(anyhow::anyhow!(
                    "The memory storage backend cannot be used in production"
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        environment: "test".to_string(),
        database_url: None,
        db_max_connections: MAX_CONNECTIONS,
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            local_path: None,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
        },
        upload: UploadConfig {
            max_document_size_bytes: MAX_DOCUMENT_SIZE_MB * 1024 * 1024,
            allowed_extensions: vec!["pdf".to_string()],
            allowed_content_types: vec!["application/pdf".to_string()],
        },
        reputation: ReputationConfig {
            provider: ReputationProvider::Disabled,
            timeout_secs: REPUTATION_TIMEOUT_SECS,
            block_active_content: true,
            block_embedded_files: false,
            allow_encrypted: false,
        },
        redaction: RedactionConfig {
            dpi: REDACTION_DPI,
            pdftoppm_path: "pdftoppm".to_string(),
        },
        patterns: PatternConfig {
            regex_size_limit: PATTERN_REGEX_SIZE_LIMIT,
            max_custom_rules: MAX_CUSTOM_RULES,
        },
        access: AccessConfig {
            grant_secret: "x".repeat(MIN_GRANT_SECRET_LEN),
            grant_ttl_secs: ACCESS_GRANT_TTL_SECS,
        },
    }
}
