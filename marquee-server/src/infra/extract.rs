//! Request extractors whose rejections render as [`AppError`] JSON.
//!
//! `AppQuery` decodes with `serde_html_form`, so repeated keys such as
//! `?order=id_DESC&order=title_ASC` collect into a `Vec`.

use axum::extract::{
    FromRequest, FromRequestParts,
    rejection::{JsonRejection, PathRejection},
};
use axum_extra::extract::QueryRejection;

use super::errors::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum_extra::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.to_string())
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Request, StatusCode};

    use marquee_model::GetMoviesQuery;

    use super::*;

    async fn movies_query(uri: &str) -> Result<GetMoviesQuery, AppError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        AppQuery::<GetMoviesQuery>::from_request_parts(&mut parts, &())
            .await
            .map(|AppQuery(query)| query)
    }

    #[tokio::test]
    async fn repeated_order_keys_are_collected() {
        let query = movies_query("/movie?order=likeCount_DESC&order=id_DESC&take=2")
            .await
            .unwrap();
        assert_eq!(query.order, vec!["likeCount_DESC", "id_DESC"]);
        assert_eq!(query.take, 2);
        assert_eq!(
            query.pagination().order_terms(),
            vec!["likeCount_DESC", "id_DESC"]
        );
    }

    #[tokio::test]
    async fn comma_separated_order_is_split() {
        let query = movies_query("/movie?order=likeCount_DESC%2Cid_DESC")
            .await
            .unwrap();
        assert_eq!(
            query.pagination().order_terms(),
            vec!["likeCount_DESC", "id_DESC"]
        );
    }

    #[tokio::test]
    async fn missing_order_defaults_to_id_desc() {
        let query = movies_query("/movie").await.unwrap();
        assert_eq!(query.order, vec!["id_DESC"]);
        assert_eq!(query.take, 5);
        assert!(query.title.is_none());
    }

    #[tokio::test]
    async fn malformed_query_is_a_bad_request() {
        let err = movies_query("/movie?take=many").await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
