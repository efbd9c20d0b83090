//! Postgres repositories. Methods ending in `_in` run on a caller-supplied
//! connection so they can take part in a [`TxScope`](crate::db::TxScope);
//! the plain variants check a connection out of the pool.

pub mod chats;
pub mod directors;
pub mod genres;
pub mod movies;
pub mod users;

pub use chats::PostgresChatRepository;
pub use directors::PostgresDirectorRepository;
pub use genres::PostgresGenreRepository;
pub use movies::{MovieListFilter, PostgresMovieRepository};
pub use users::PostgresUserRepository;
