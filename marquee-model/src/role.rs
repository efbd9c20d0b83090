use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Access level of an account. Lower numbers are more privileged; a route
/// that requires `PaidUser` also admits `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i16)]
pub enum Role {
    Admin = 0,
    PaidUser = 1,
    #[default]
    User = 2,
}

impl Role {
    pub fn as_i16(self) -> i16 {
        self as i16
    }

    /// Whether this role satisfies a route requirement of `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self.as_i16() <= required.as_i16()
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<Role> for i16 {
    fn from(role: Role) -> Self {
        role.as_i16()
    }
}

impl TryFrom<i16> for Role {
    type Error = ModelError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Admin),
            1 => Ok(Role::PaidUser),
            2 => Ok(Role::User),
            other => Err(ModelError::UnknownRole(other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "admin",
            Role::PaidUser => "paidUser",
            Role::User => "user",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_satisfies_every_requirement() {
        for required in [Role::Admin, Role::PaidUser, Role::User] {
            assert!(Role::Admin.satisfies(required));
        }
    }

    #[test]
    fn user_only_satisfies_user_requirement() {
        assert!(Role::User.satisfies(Role::User));
        assert!(!Role::User.satisfies(Role::PaidUser));
        assert!(!Role::User.satisfies(Role::Admin));
        assert!(Role::PaidUser.satisfies(Role::User));
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&Role::PaidUser).unwrap(), "1");
        let parsed: Role = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, Role::Admin);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }
}
