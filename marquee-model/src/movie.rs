use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    director::Director,
    error::{ModelError, Result},
    genre::Genre,
    pagination::{CursorPaginationQuery, default_order, default_take},
    user::User,
};

/// Long-form description stored alongside a movie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MovieDetail {
    pub id: i64,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub detail: MovieDetail,
    pub director: Director,
    pub genres: Vec<Genre>,
    pub creator: Option<User>,
    pub like_count: i32,
    pub dislike_count: i32,
    pub movie_file_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    /// Present only when the listing was requested by a signed-in user:
    /// `true` liked, `false` disliked, `null` no reaction yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like_status: Option<Option<bool>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMovie {
    pub title: String,
    pub detail: String,
    pub director_id: i64,
    pub genre_ids: Vec<i64>,
    pub movie_file_name: String,
}

impl CreateMovie {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ModelError::Validation("title should not be empty".into()));
        }
        if self.detail.trim().is_empty() {
            return Err(ModelError::Validation("detail should not be empty".into()));
        }
        if self.genre_ids.is_empty() {
            return Err(ModelError::Validation("genreIds should not be empty".into()));
        }
        validate_file_name(&self.movie_file_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMovie {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub director_id: Option<i64>,
    #[serde(default)]
    pub genre_ids: Option<Vec<i64>>,
}

impl UpdateMovie {
    pub fn validate(&self) -> Result<()> {
        if matches!(&self.title, Some(title) if title.trim().is_empty()) {
            return Err(ModelError::Validation("title should not be empty".into()));
        }
        if matches!(&self.detail, Some(detail) if detail.trim().is_empty()) {
            return Err(ModelError::Validation("detail should not be empty".into()));
        }
        Ok(())
    }
}

/// Query string of `GET /movie`. Pagination fields are spelled out instead of
/// flattened so that numeric values survive form decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMoviesQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_order")]
    pub order: Vec<String>,
    #[serde(default = "default_take")]
    pub take: i64,
}

impl Default for GetMoviesQuery {
    fn default() -> Self {
        Self {
            title: None,
            cursor: None,
            order: default_order(),
            take: default_take(),
        }
    }
}

impl GetMoviesQuery {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title
            && title.chars().count() < 3
        {
            return Err(ModelError::Validation(
                "title must be longer than or equal to 3 characters".into(),
            ));
        }
        self.pagination().validate()
    }

    pub fn pagination(&self) -> CursorPaginationQuery {
        CursorPaginationQuery {
            cursor: self.cursor.clone(),
            order: self.order.clone(),
            take: self.take,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResult {
    pub is_like: Option<bool>,
}

fn validate_file_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(ModelError::Validation("invalid movieFileName".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_title_filter_is_rejected() {
        let query = GetMoviesQuery {
            title: Some("ab".into()),
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = GetMoviesQuery {
            title: Some("abc".into()),
            ..Default::default()
        };
        assert!(query.validate().is_ok());
    }

    #[test]
    fn create_movie_requires_genres_and_plain_file_name() {
        let mut dto = CreateMovie {
            title: "Heat".into(),
            detail: "LA crime saga".into(),
            director_id: 1,
            genre_ids: vec![1],
            movie_file_name: "abc_1700000000000.mp4".into(),
        };
        assert!(dto.validate().is_ok());

        dto.movie_file_name = "../../etc/passwd".into();
        assert!(dto.validate().is_err());

        dto.movie_file_name = "abc_1.mp4".into();
        dto.genre_ids.clear();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn like_result_serializes_null() {
        let json = serde_json::to_string(&LikeResult { is_like: None }).unwrap();
        assert_eq!(json, r#"{"isLike":null}"#);
    }
}
