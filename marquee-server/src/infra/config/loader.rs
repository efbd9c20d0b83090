use std::{fs, path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

use super::{
    models::{
        AppEnv, AuthConfig, CacheConfig, Config, ConfigMetadata, CorsConfig,
        DatabaseConfig, RedisConfig, ServerConfig, StorageConfig, WorkerConfig,
    },
    sources::{EnvConfig, FileConfig},
};

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["marquee.toml", "config/marquee.toml"];

pub(crate) const DEV_ACCESS_TOKEN_SECRET: &str = "marquee-dev-access-secret";
pub(crate) const DEV_REFRESH_TOKEN_SECRET: &str = "marquee-dev-refresh-secret";
pub(crate) const DEV_PASSWORD_PEPPER: &str = "marquee-dev-password-pepper";

const DEFAULT_UPLOAD_MAX_BYTES: usize = 50_000_000;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env.<NODE_ENV>` (default `.env.dev`), then the environment, then
    /// an optional TOML file. Environment values win over the file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file = self.options.env_file.clone().unwrap_or_else(|| {
            let profile = std::env::var("NODE_ENV")
                .or_else(|_| std::env::var("MARQUEE_ENV"))
                .unwrap_or_else(|_| "dev".to_string());
            PathBuf::from(format!(".env.{profile}"))
        });
        let env_file_loaded =
            dotenvy::from_path(&env_file).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?;

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let metadata = ConfigMetadata {
            config_path,
            env_file: env_file_loaded.then_some(env_file),
        };
        let (config, warnings) = compose_config(file_config, env_config, metadata)?;

        config
            .storage
            .ensure_directories()
            .map_err(|source| ConfigLoadError::Filesystem { source })?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env_config.config_path) {
            (Some(path), _) | (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| candidate.exists()),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

/// Merge file and environment sources into a validated [`Config`].
pub fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<(Config, Vec<String>), ConfigLoadError> {
    let mut warnings = Vec::new();
    let file = file_config.unwrap_or_default();

    let app_env_raw = env
        .env
        .clone()
        .or(file.env.clone())
        .ok_or(ConfigLoadError::MissingValue { key: "ENV" })?;
    let app_env: AppEnv = app_env_raw
        .parse()
        .map_err(|reason| invalid("ENV", &app_env_raw, reason))?;

    let server = ServerConfig {
        host: env
            .server_host
            .clone()
            .or(file.server.host.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: match &env.server_port {
            Some(raw) => parse_number("PORT", raw)?,
            None => file.server.port.unwrap_or(3000),
        },
    };

    if let Some(db_type) = &env.db_type
        && !db_type.eq_ignore_ascii_case("postgres")
    {
        return Err(invalid("DB_TYPE", db_type, "only postgres is supported".into()));
    }

    let database = DatabaseConfig {
        url: resolve_database_url(&env, &file)?,
        max_connections: match &env.db_max_connections {
            Some(raw) => parse_number("DB_MAX_CONNECTIONS", raw)?,
            None => file.database.max_connections.unwrap_or(10),
        },
    };

    let redis = resolve_redis(&env, &file)?;
    if redis.is_none() {
        warnings.push(
            "No Redis configured; using the in-memory cache and job queue".to_string(),
        );
    }

    let auth = resolve_auth(app_env, &env, &file, &mut warnings)?;

    let storage = StorageConfig {
        public_dir: env
            .public_dir
            .clone()
            .or(file.storage.public_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./public")),
        log_dir: env
            .log_dir
            .clone()
            .or(file.storage.log_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./logs")),
        upload_max_bytes: match &env.upload_max_bytes {
            Some(raw) => parse_number("UPLOAD_MAX_BYTES", raw)?,
            None => file.storage.upload_max_bytes.unwrap_or(DEFAULT_UPLOAD_MAX_BYTES),
        },
    };

    let cache = CacheConfig {
        default_ttl: duration_setting(
            "CACHE_TTL",
            env.cache_ttl.as_deref().or(file.cache.default_ttl.as_deref()),
            Duration::from_secs(10),
        )?,
    };

    let cors = CorsConfig {
        allowed_origins: env
            .cors_allowed_origins
            .clone()
            .or(file.cors.allowed_origins.clone())
            .unwrap_or_default(),
    };

    let worker = WorkerConfig {
        enabled: env
            .process_type
            .as_deref()
            .map(|kind| kind.eq_ignore_ascii_case("worker"))
            .or(file.worker.enabled)
            .unwrap_or(false),
        ffmpeg_path: env
            .ffmpeg_path
            .clone()
            .or(file.worker.ffmpeg_path.clone())
            .unwrap_or_else(|| "ffmpeg".to_string()),
    };

    let slow_request_ms = match &env.slow_request_ms {
        Some(raw) => parse_number("SLOW_REQUEST_MS", raw)?,
        None => file.slow_request_ms.unwrap_or(1000),
    };

    let config = Config {
        env: app_env,
        server,
        database,
        redis,
        auth,
        storage,
        cache,
        cors,
        worker,
        slow_request_threshold: Duration::from_millis(slow_request_ms),
        metadata,
    };

    Ok((config, warnings))
}

fn resolve_database_url(env: &EnvConfig, file: &FileConfig) -> Result<String, ConfigLoadError> {
    if let Some(url) = env.database_url.clone().or(file.database.url.clone()) {
        Url::parse(&url).map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
        return Ok(url);
    }

    let host = env
        .db_host
        .clone()
        .ok_or(ConfigLoadError::MissingValue { key: "DB_HOST" })?;
    let user = env
        .db_username
        .clone()
        .ok_or(ConfigLoadError::MissingValue { key: "DB_USERNAME" })?;
    let name = env
        .db_database
        .clone()
        .ok_or(ConfigLoadError::MissingValue { key: "DB_DATABASE" })?;
    let port: u16 = match &env.db_port {
        Some(raw) => parse_number("DB_PORT", raw)?,
        None => 5432,
    };

    let mut url = Url::parse(&format!("postgresql://{host}:{port}/{name}"))
        .map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    url.set_username(&user)
        .map_err(|_| invalid("DB_USERNAME", &user, "cannot be encoded into a URL".into()))?;
    if let Some(password) = &env.db_password {
        url.set_password(Some(password))
            .map_err(|_| invalid("DB_PASSWORD", "***", "cannot be encoded into a URL".into()))?;
    }
    Ok(url.to_string())
}

fn resolve_redis(env: &EnvConfig, file: &FileConfig) -> Result<Option<RedisConfig>, ConfigLoadError> {
    if let Some(url) = &env.redis_url {
        return Ok(Some(RedisConfig { url: url.clone() }));
    }

    if let Some(host) = &env.redis_host {
        let port: u16 = match &env.redis_port {
            Some(raw) => parse_number("REDIS_PORT", raw)?,
            None => 6379,
        };
        let url = match &env.redis_password {
            Some(password) => format!("redis://:{password}@{host}:{port}"),
            None => format!("redis://{host}:{port}"),
        };
        return Ok(Some(RedisConfig { url }));
    }

    Ok(file.redis.as_ref().map(|redis| RedisConfig {
        url: redis.url.clone(),
    }))
}

fn resolve_auth(
    app_env: AppEnv,
    env: &EnvConfig,
    file: &FileConfig,
    warnings: &mut Vec<String>,
) -> Result<AuthConfig, ConfigLoadError> {
    let secret = |key: &'static str,
                  env_value: &Option<String>,
                  file_value: &Option<String>,
                  dev_default: &str,
                  warnings: &mut Vec<String>|
     -> Result<String, ConfigLoadError> {
        match env_value.clone().or(file_value.clone()) {
            Some(value) if app_env.is_prod() && value == dev_default => {
                Err(ConfigLoadError::InsecureSecret { key })
            }
            Some(value) => Ok(value),
            None if app_env.is_prod() => Err(ConfigLoadError::MissingValue { key }),
            None => {
                warnings.push(format!("{key} not set; using the development default"));
                Ok(dev_default.to_string())
            }
        }
    };

    Ok(AuthConfig {
        access_token_secret: secret(
            "ACCESS_TOKEN_SECRET",
            &env.access_token_secret,
            &file.auth.access_token_secret,
            DEV_ACCESS_TOKEN_SECRET,
            warnings,
        )?,
        refresh_token_secret: secret(
            "REFRESH_TOKEN_SECRET",
            &env.refresh_token_secret,
            &file.auth.refresh_token_secret,
            DEV_REFRESH_TOKEN_SECRET,
            warnings,
        )?,
        password_pepper: secret(
            "PASSWORD_PEPPER",
            &env.password_pepper,
            &file.auth.password_pepper,
            DEV_PASSWORD_PEPPER,
            warnings,
        )?,
        access_token_ttl: duration_setting(
            "ACCESS_TOKEN_TTL",
            env.access_token_ttl
                .as_deref()
                .or(file.auth.access_token_ttl.as_deref()),
            Duration::from_secs(24 * 60 * 60),
        )?,
        refresh_token_ttl: duration_setting(
            "REFRESH_TOKEN_TTL",
            env.refresh_token_ttl
                .as_deref()
                .or(file.auth.refresh_token_ttl.as_deref()),
            Duration::from_secs(7 * 24 * 60 * 60),
        )?,
    })
}

fn duration_setting(
    key: &'static str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(raw) => humantime::parse_duration(raw).map_err(|err| invalid(key, raw, err.to_string())),
        None => Ok(default),
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigLoadError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|err| invalid(key, raw, err.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: String) -> ConfigLoadError {
    ConfigLoadError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("required setting {key} is missing")]
    MissingValue { key: &'static str },
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{key} uses the development default and cannot be used in prod")]
    InsecureSecret { key: &'static str },
    #[error("invalid database URL")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },
    #[error("filesystem initialization failed")]
    Filesystem {
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    pub fn is_missing(&self, key: &str) -> bool {
        matches!(self, ConfigLoadError::MissingValue { key: missing } if *missing == key)
    }
}
