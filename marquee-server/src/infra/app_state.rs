use std::{fmt, sync::Arc};

use sqlx::PgPool;

use crate::{
    catalog::{DirectorService, GenreService, MovieService},
    chat::ChatService,
    db::repositories::{
        PostgresDirectorRepository, PostgresGenreRepository, PostgresUserRepository,
    },
    infra::{
        cache::CacheStore,
        config::{AppEnv, Config},
        websocket::ConnectionManager,
    },
    users::{
        UserService,
        auth::{AuthService, JwtKeys, PasswordCrypto},
    },
    worker::JobQueue,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub cache: Arc<dyn CacheStore>,
    pub jobs: Arc<dyn JobQueue>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub directors: Arc<DirectorService>,
    pub genres: Arc<GenreService>,
    pub movies: Arc<MovieService>,
    pub chat: Arc<ChatService>,
    pub websocket_manager: Arc<ConnectionManager>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire every service over an existing pool, cache and job queue.
    pub fn new(
        config: Arc<Config>,
        pool: PgPool,
        cache: Arc<dyn CacheStore>,
        jobs: Arc<dyn JobQueue>,
    ) -> anyhow::Result<Self> {
        let pepper = config.auth.password_pepper.as_bytes();
        let crypto = Arc::new(if config.env == AppEnv::Test {
            PasswordCrypto::for_tests(pepper)?
        } else {
            PasswordCrypto::new(pepper)?
        });

        let users_repo = PostgresUserRepository::new(pool.clone());
        let websocket_manager = Arc::new(ConnectionManager::new());

        let auth = Arc::new(AuthService::new(
            users_repo.clone(),
            crypto.clone(),
            JwtKeys::new(&config.auth),
            cache.clone(),
        ));
        let users = Arc::new(UserService::new(users_repo, crypto));
        let directors = Arc::new(DirectorService::new(PostgresDirectorRepository::new(
            pool.clone(),
        )));
        let genres = Arc::new(GenreService::new(PostgresGenreRepository::new(pool.clone())));
        let movies = Arc::new(MovieService::new(
            pool.clone(),
            cache.clone(),
            config.cache.default_ttl,
            config.storage.clone(),
        ));
        let chat = Arc::new(ChatService::new(pool.clone(), websocket_manager.clone()));

        Ok(Self {
            config,
            pool,
            cache,
            jobs,
            auth,
            users,
            directors,
            genres,
            movies,
            chat,
            websocket_manager,
        })
    }
}
