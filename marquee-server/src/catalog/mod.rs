//! Movies, directors and genres.

pub mod director_handlers;
pub mod director_service;
pub mod genre_handlers;
pub mod genre_service;
pub mod movie_handlers;
pub mod movie_service;

pub use director_service::DirectorService;
pub use genre_service::GenreService;
pub use movie_service::MovieService;
