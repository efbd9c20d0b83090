//! Cursor and page pagination applied to `sqlx::QueryBuilder` queries.
//!
//! A cursor is `base64(JSON {"values": {column: value}, "order": [...]})`.
//! When a cursor is supplied its `order` replaces the requested one, and the
//! query continues after the row whose sort-column values it carries.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

use marquee_model::{
    CursorPaginationQuery, CursorPayload, PagePaginationQuery, SortDirection, SortTerm,
    pagination::split_order,
};

use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Text,
    Timestamp,
}

/// A column clients may sort by: its API name (the camelCase field of the
/// serialized row) and the SQL expression it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub api: &'static str,
    pub sql: &'static str,
    pub kind: ColumnKind,
}

impl SortColumn {
    pub const fn new(api: &'static str, sql: &'static str, kind: ColumnKind) -> Self {
        Self { api, sql, kind }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CursorCodec;

impl CursorCodec {
    pub fn encode(payload: &CursorPayload) -> AppResult<String> {
        let json = serde_json::to_vec(payload)
            .map_err(|err| AppError::internal(format!("failed to encode cursor: {err}")))?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(cursor: &str) -> AppResult<CursorPayload> {
        let bytes = STANDARD
            .decode(cursor.trim())
            .map_err(|_| AppError::bad_request("invalid cursor"))?;
        serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("invalid cursor"))
    }
}

#[derive(Debug, Clone)]
struct OrderKey {
    column: SortColumn,
    direction: SortDirection,
}

/// A resolved pagination request: validated order, optional continuation
/// values and page size.
#[derive(Debug, Clone)]
pub struct CursorPlan {
    order: Vec<OrderKey>,
    after: Option<Vec<(SortColumn, Value)>>,
    take: i64,
}

impl CursorPlan {
    pub fn build(query: &CursorPaginationQuery, columns: &[SortColumn]) -> AppResult<Self> {
        query.validate()?;

        let (order_terms, values) = match &query.cursor {
            Some(cursor) if !cursor.trim().is_empty() => {
                let payload = CursorCodec::decode(cursor)?;
                (payload.order, Some(payload.values))
            }
            _ => (query.order_terms(), None),
        };

        let order_terms = if order_terms.is_empty() {
            split_order(&["id_DESC"])
        } else {
            order_terms
        };

        let order = order_terms
            .iter()
            .map(|raw| {
                let term = SortTerm::parse(raw)?;
                let column = resolve_column(columns, &term.column)?;
                Ok(OrderKey {
                    column,
                    direction: term.direction,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let after = values
            .map(|values| continuation_values(&order, &values))
            .transpose()?;

        Ok(Self {
            order,
            after,
            take: query.take,
        })
    }

    /// `<` when any key sorts descending, otherwise `>`.
    pub fn comparison(&self) -> &'static str {
        if self
            .order
            .iter()
            .any(|key| key.direction == SortDirection::Desc)
        {
            "<"
        } else {
            ">"
        }
    }

    pub fn has_cursor(&self) -> bool {
        self.after.is_some()
    }

    pub fn take(&self) -> i64 {
        self.take
    }

    /// Push `(c1, c2) < ($1, $2)` without a leading `WHERE`/`AND`. No-op
    /// when the request carried no cursor.
    pub fn push_cursor_filter(&self, qb: &mut QueryBuilder<'_, Postgres>) -> AppResult<()> {
        let Some(after) = &self.after else {
            return Ok(());
        };

        qb.push("(");
        for (index, (column, _)) in after.iter().enumerate() {
            if index > 0 {
                qb.push(", ");
            }
            qb.push(column.sql);
        }
        qb.push(") ");
        qb.push(self.comparison());
        qb.push(" (");
        for (index, (column, value)) in after.iter().enumerate() {
            if index > 0 {
                qb.push(", ");
            }
            push_typed_bind(qb, *column, value)?;
        }
        qb.push(")");
        Ok(())
    }

    pub fn push_order_and_limit(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        qb.push(" ORDER BY ");
        for (index, key) in self.order.iter().enumerate() {
            if index > 0 {
                qb.push(", ");
            }
            qb.push(key.column.sql);
            qb.push(" ");
            qb.push(key.direction.as_sql());
        }
        qb.push(" LIMIT ");
        qb.push_bind(self.take);
    }

    /// Cursor pointing after the last row of `rows`, or `None` for an empty
    /// page.
    pub fn next_cursor<T: Serialize>(&self, rows: &[T]) -> AppResult<Option<String>> {
        let Some(last) = rows.last() else {
            return Ok(None);
        };

        let row = serde_json::to_value(last)
            .map_err(|err| AppError::internal(format!("failed to serialize row: {err}")))?;

        let mut values = Map::new();
        for key in &self.order {
            let value = row.get(key.column.api).cloned().unwrap_or(Value::Null);
            values.insert(key.column.api.to_string(), value);
        }

        let payload = CursorPayload {
            values,
            order: self
                .order
                .iter()
                .map(|key| format!("{}_{}", key.column.api, key.direction.as_sql()))
                .collect(),
        };
        CursorCodec::encode(&payload).map(Some)
    }
}

fn resolve_column(columns: &[SortColumn], api: &str) -> AppResult<SortColumn> {
    columns
        .iter()
        .find(|column| column.api == api)
        .copied()
        .ok_or_else(|| AppError::bad_request(format!("cannot order by '{api}'")))
}

fn continuation_values(
    order: &[OrderKey],
    values: &Map<String, Value>,
) -> AppResult<Vec<(SortColumn, Value)>> {
    order
        .iter()
        .map(|key| {
            values
                .get(key.column.api)
                .cloned()
                .map(|value| (key.column, value))
                .ok_or_else(|| AppError::bad_request("invalid cursor"))
        })
        .collect()
}

fn push_typed_bind(
    qb: &mut QueryBuilder<'_, Postgres>,
    column: SortColumn,
    value: &Value,
) -> AppResult<()> {
    let invalid = || AppError::bad_request(format!("invalid cursor value for {}", column.api));
    match column.kind {
        ColumnKind::Int => {
            qb.push_bind(value.as_i64().ok_or_else(invalid)?);
        }
        ColumnKind::Text => {
            qb.push_bind(value.as_str().ok_or_else(invalid)?.to_string());
        }
        ColumnKind::Timestamp => {
            let raw = value.as_str().ok_or_else(invalid)?;
            let parsed = DateTime::parse_from_rfc3339(raw)
                .map_err(|_| invalid())?
                .with_timezone(&Utc);
            qb.push_bind(parsed);
        }
    }
    Ok(())
}

/// `LIMIT take OFFSET (page - 1) * take`.
pub fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: &PagePaginationQuery) {
    qb.push(" LIMIT ");
    qb.push_bind(page.take);
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());
}
