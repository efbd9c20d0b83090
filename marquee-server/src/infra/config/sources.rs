use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    pub env: Option<String>,
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub storage: FileStorageConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
    #[serde(default)]
    pub worker: FileWorkerConfig,
    pub slow_request_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_secret: Option<String>,
    /// Humantime duration, e.g. `1d`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_pepper: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_max_bytes: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileWorkerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub env: Option<String>,
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<String>,
    pub db_type: Option<String>,
    pub database_url: Option<String>,
    pub db_host: Option<String>,
    pub db_port: Option<String>,
    pub db_username: Option<String>,
    pub db_password: Option<String>,
    pub db_database: Option<String>,
    pub db_max_connections: Option<String>,
    pub redis_url: Option<String>,
    pub redis_host: Option<String>,
    pub redis_port: Option<String>,
    pub redis_password: Option<String>,
    pub access_token_secret: Option<String>,
    pub refresh_token_secret: Option<String>,
    pub access_token_ttl: Option<String>,
    pub refresh_token_ttl: Option<String>,
    pub password_pepper: Option<String>,
    pub public_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub upload_max_bytes: Option<String>,
    pub cache_ttl: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub process_type: Option<String>,
    pub ffmpeg_path: Option<String>,
    pub slow_request_ms: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            env: non_empty_var("ENV"),
            config_path: non_empty_var("MARQUEE_CONFIG_PATH").map(PathBuf::from),
            server_host: non_empty_var("SERVER_HOST"),
            server_port: non_empty_var("PORT"),
            db_type: non_empty_var("DB_TYPE"),
            database_url: non_empty_var("DATABASE_URL"),
            db_host: non_empty_var("DB_HOST"),
            db_port: non_empty_var("DB_PORT"),
            db_username: non_empty_var("DB_USERNAME"),
            db_password: non_empty_var("DB_PASSWORD"),
            db_database: non_empty_var("DB_DATABASE"),
            db_max_connections: non_empty_var("DB_MAX_CONNECTIONS"),
            redis_url: non_empty_var("REDIS_URL"),
            redis_host: non_empty_var("REDIS_HOST"),
            redis_port: non_empty_var("REDIS_PORT"),
            redis_password: non_empty_var("REDIS_PASSWORD"),
            access_token_secret: non_empty_var("ACCESS_TOKEN_SECRET"),
            refresh_token_secret: non_empty_var("REFRESH_TOKEN_SECRET"),
            access_token_ttl: non_empty_var("ACCESS_TOKEN_TTL"),
            refresh_token_ttl: non_empty_var("REFRESH_TOKEN_TTL"),
            password_pepper: non_empty_var("PASSWORD_PEPPER"),
            public_dir: non_empty_var("PUBLIC_DIR").map(PathBuf::from),
            log_dir: non_empty_var("LOG_DIR").map(PathBuf::from),
            upload_max_bytes: non_empty_var("UPLOAD_MAX_BYTES"),
            cache_ttl: non_empty_var("CACHE_TTL"),
            cors_allowed_origins: parse_csv_var("CORS_ALLOWED_ORIGINS"),
            process_type: non_empty_var("TYPE"),
            ffmpeg_path: non_empty_var("FFMPEG_PATH"),
            slow_request_ms: non_empty_var("SLOW_REQUEST_MS"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
