pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{
    AppEnv, AuthConfig, CacheConfig, Config, ConfigMetadata, CorsConfig,
    DatabaseConfig, RedisConfig, ServerConfig, StorageConfig, WorkerConfig,
};
pub use sources::{EnvConfig, FileConfig};
