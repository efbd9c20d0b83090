pub mod crypto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod service;
pub mod tokens;

pub use crypto::PasswordCrypto;
pub use jwt::JwtKeys;
pub use middleware::{CurrentUser, MaybeUser};
pub use service::AuthService;
