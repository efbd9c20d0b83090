use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Deployment profile selected with `ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Test,
    Dev,
    Prod,
}

impl AppEnv {
    pub fn is_prod(self) -> bool {
        matches!(self, AppEnv::Prod)
    }
}

impl FromStr for AppEnv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(AppEnv::Test),
            "dev" => Ok(AppEnv::Dev),
            "prod" => Ok(AppEnv::Prod),
            other => Err(format!("expected one of test, dev, prod; got '{other}'")),
        }
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppEnv::Test => "test",
            AppEnv::Dev => "dev",
            AppEnv::Prod => "prod",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

/// Token signing secrets, lifetimes and the Argon2 pepper.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password_pepper: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

/// Filesystem layout for uploads, thumbnails and logs.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub public_dir: PathBuf,
    pub log_dir: PathBuf,
    pub upload_max_bytes: usize,
}

impl StorageConfig {
    pub fn temp_dir(&self) -> PathBuf {
        self.public_dir.join("temp")
    }

    pub fn movie_dir(&self) -> PathBuf {
        self.public_dir.join("movie")
    }

    pub fn thumbnail_dir(&self) -> PathBuf {
        self.public_dir.join("thumbnail")
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            self.temp_dir(),
            self.movie_dir(),
            self.thumbnail_dir(),
            self.log_dir.clone(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Relative path stored on a movie row, e.g. `public/movie/abc.mp4`.
    pub fn movie_file_path(file_name: &str) -> String {
        Path::new("public")
            .join("movie")
            .join(file_name)
            .to_string_lossy()
            .into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub default_ttl: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Run the thumbnail worker inside this process.
    pub enabled: bool,
    pub ffmpeg_path: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: AppEnv,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub cors: CorsConfig,
    pub worker: WorkerConfig,
    /// Requests slower than this are logged as warnings.
    pub slow_request_threshold: Duration,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
