use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Director {
    pub id: i64,
    pub name: String,
    pub dob: NaiveDate,
    pub nationality: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDirector {
    pub name: String,
    pub dob: NaiveDate,
    pub nationality: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDirector {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ModelError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

impl CreateDirector {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("nationality", &self.nationality)
    }
}

impl UpdateDirector {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_text("name", name)?;
        }
        if let Some(nationality) = &self.nationality {
            require_text("nationality", nationality)?;
        }
        Ok(())
    }
}
