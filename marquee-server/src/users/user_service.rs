//! User management for administrators.

use std::sync::Arc;

use tracing::info;

use marquee_model::{CreateUser, DeletedId, Role, UpdateUser, User};

use crate::{
    db::repositories::PostgresUserRepository,
    infra::errors::{AppError, AppResult},
    users::auth::PasswordCrypto,
};

#[derive(Debug, Clone)]
pub struct UserService {
    users: PostgresUserRepository,
    crypto: Arc<PasswordCrypto>,
}

impl UserService {
    pub fn new(users: PostgresUserRepository, crypto: Arc<PasswordCrypto>) -> Self {
        Self { users, crypto }
    }

    pub async fn create(&self, dto: CreateUser) -> AppResult<User> {
        validate_email(&dto.email)?;
        if dto.password.is_empty() {
            return Err(AppError::bad_request("password must not be empty"));
        }

        if self.users.find_by_email(&dto.email).await?.is_some() {
            return Err(AppError::conflict("email is already in use"));
        }

        let hash = self.crypto.hash_password(&dto.password)?;
        let user = self.users.create(&dto.email, &hash, Role::User).await?;
        info!(user_id = user.id, "created user");
        Ok(user)
    }

    pub async fn find_all(&self) -> AppResult<Vec<User>> {
        self.users.find_all().await
    }

    pub async fn find_one(&self, id: i64) -> AppResult<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    pub async fn update(&self, id: i64, dto: UpdateUser) -> AppResult<User> {
        if let Some(email) = dto.email.as_deref() {
            validate_email(email)?;
        }

        let hash = match dto.password.as_deref() {
            Some("") => return Err(AppError::bad_request("password must not be empty")),
            Some(password) => Some(self.crypto.hash_password(password)?),
            None => None,
        };

        self.users
            .update(id, dto.email.as_deref(), hash.as_deref())
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    pub async fn remove(&self, id: i64) -> AppResult<DeletedId> {
        if !self.users.delete(id).await? {
            return Err(user_not_found(id));
        }
        info!(user_id = id, "deleted user");
        Ok(DeletedId { id })
    }
}

fn user_not_found(id: i64) -> AppError {
    AppError::not_found(format!("user {id} does not exist"))
}

fn validate_email(email: &str) -> AppResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::bad_request("email must be a valid address")),
    }
}
