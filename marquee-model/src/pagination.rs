use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

pub(crate) fn default_order() -> Vec<String> {
    vec!["id_DESC".to_string()]
}

pub(crate) fn default_take() -> i64 {
    5
}

fn default_page() -> i64 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One `column_DIRECTION` entry of an order list, e.g. `likeCount_DESC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortTerm {
    pub column: String,
    pub direction: SortDirection,
}

impl SortTerm {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (column, direction) = raw
            .rsplit_once('_')
            .ok_or(ModelError::InvalidSortDirection)?;
        if column.is_empty() {
            return Err(ModelError::InvalidSortTerm(raw.to_string()));
        }
        let direction = match direction {
            "ASC" => SortDirection::Asc,
            "DESC" => SortDirection::Desc,
            _ => return Err(ModelError::InvalidSortDirection),
        };
        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }
}

impl fmt::Display for SortTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.column, self.direction.as_sql())
    }
}

/// Cursor pagination parameters. `order` holds `column_DIRECTION` terms,
/// given as repeated `order` keys, comma separated, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPaginationQuery {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default = "default_order")]
    pub order: Vec<String>,
    #[serde(default = "default_take")]
    pub take: i64,
}

impl Default for CursorPaginationQuery {
    fn default() -> Self {
        Self {
            cursor: None,
            order: default_order(),
            take: default_take(),
        }
    }
}

impl CursorPaginationQuery {
    pub fn validate(&self) -> Result<()> {
        if self.take < 1 {
            return Err(ModelError::Validation(
                "take must not be less than 1".into(),
            ));
        }
        Ok(())
    }

    pub fn order_terms(&self) -> Vec<String> {
        split_order(&self.order)
    }
}

/// Flatten order entries, splitting each on commas and dropping blanks.
pub fn split_order<S: AsRef<str>>(entries: &[S]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|entry| entry.as_ref().split(','))
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePaginationQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_take")]
    pub take: i64,
}

impl Default for PagePaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            take: default_take(),
        }
    }
}

impl PagePaginationQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.take
    }
}

/// Decoded form of an opaque cursor: the sort-column values of the last row
/// already seen and the order that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorPayload {
    pub values: Map<String, Value>,
    pub order: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
    pub count: i64,
}
